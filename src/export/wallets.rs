use crate::rpc::{RpcGateway, UnspentOutput, WalletTransaction};
use crate::utils::{format_coins, round_to_8};
use crate::wallet::Wallet;

use serde::Serialize;
use tracing::{info, warn};

/// History entries requested per wallet.
const HISTORY_LIMIT: u32 = 10_000;

/// Final state of one wallet as written to `wallets/<name>.json`.
///
/// Addresses are left out: consumers derive them from the mnemonic.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSnapshot {
	pub wallet_name: String,
	pub mnemonic: String,
	/// Sum of the confirmed UTXOs.
	pub balance: f64,
	pub transaction_count: usize,
	pub utxo_count: usize,
	pub transactions: Vec<WalletTransaction>,
	pub utxos: Vec<UnspentOutput>,
}

/// Query history and confirmed UTXOs of `wallet`. A failed query leaves its part empty.
pub async fn collect_snapshot(rpc: &dyn RpcGateway, wallet: &Wallet) -> WalletSnapshot {
	let transactions = rpc
		.list_transactions(&wallet.name, HISTORY_LIMIT)
		.await
		.unwrap_or_else(|e| {
			warn!("{}: error getting transactions: {}", wallet.name, e);
			Vec::new()
		});

	let utxos = rpc.list_unspent(&wallet.name, 1).await.unwrap_or_else(|e| {
		warn!("{}: error getting UTXOs: {}", wallet.name, e);
		Vec::new()
	});
	let balance = round_to_8(utxos.iter().map(|u| u.amount).sum());

	info!(
		"{}: {} txs, {} UTXOs, balance: {}",
		wallet.name,
		transactions.len(),
		utxos.len(),
		format_coins(balance)
	);

	WalletSnapshot {
		wallet_name: wallet.name.clone(),
		mnemonic: wallet.mnemonic.clone(),
		balance,
		transaction_count: transactions.len(),
		utxo_count: utxos.len(),
		transactions,
		utxos,
	}
}
