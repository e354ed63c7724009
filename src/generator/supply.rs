//! UTXO supply engine.
//!
//! Keeps every wallet able to pay: mines the faucet's initial coinbase rewards, splits them
//! into many small outputs so that many payments can be built per block, funds the tier
//! wallets, and replenishes a wallet from the faucet when its balance runs low.
//!
//! None of the operations here mine to confirm a replenishment. Refunds land in the mempool
//! and are confirmed by the block driver's next block, which lets many payments share a block.

use super::GenerationContext;
use crate::rpc::{DaemonErrorKind, RpcError, RpcGateway};
use crate::utils::{format_coins, round_to_8};

use rand::Rng;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SupplyError {
	#[error(transparent)]
	Rpc(#[from] RpcError),

	#[error("Faucet wallet {wallet} has no spendable balance after mining {blocks} blocks")]
	SeedingInsufficientFunds { wallet: String, blocks: u64 },

	#[error("Unknown wallet: {0}")]
	UnknownWallet(String),
}

impl SupplyError {
	pub fn kind(&self) -> DaemonErrorKind {
		match self {
			SupplyError::Rpc(e) => e.kind(),
			SupplyError::SeedingInsufficientFunds { .. } => DaemonErrorKind::InsufficientFunds,
			SupplyError::UnknownWallet(_) => DaemonErrorKind::WalletNotFound,
		}
	}
}

/// Outcome of [`UtxoSupplyEngine::ensure_funded`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FundingStatus {
	/// At or above the tier minimum; nothing was sent.
	Sufficient { balance: f64 },
	/// A refund was attempted; the confirmed balance still covers the spend floor.
	Replenished { balance: f64 },
	/// Too little to spend even after the refund attempt.
	Insufficient { balance: f64 },
}

impl FundingStatus {
	pub fn is_ready(&self) -> bool {
		!matches!(self, FundingStatus::Insufficient { .. })
	}

	/// Confirmed balance observed by the check.
	pub fn balance(&self) -> f64 {
		match *self {
			FundingStatus::Sufficient { balance }
			| FundingStatus::Replenished { balance }
			| FundingStatus::Insufficient { balance } => balance,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitReport {
	pub iterations: u32,
	pub utxo_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingReport {
	pub transfers_sent: usize,
	pub transfers_failed: usize,
	pub balance: f64,
}

pub struct UtxoSupplyEngine<'a> {
	rpc: &'a dyn RpcGateway,
	/// Faucet address receiving seed and confirmation block rewards.
	mining_address: OnceCell<String>,
}

impl<'a> UtxoSupplyEngine<'a> {
	pub fn new(rpc: &'a dyn RpcGateway) -> Self {
		Self {
			rpc,
			mining_address: OnceCell::new(),
		}
	}

	async fn mining_address(&self, faucet: &str) -> Result<&str, RpcError> {
		let address = self
			.mining_address
			.get_or_try_init(|| self.rpc.get_new_address(faucet, None))
			.await?;
		Ok(address.as_str())
	}

	/// Mine `blocks` blocks to the faucet's mining address.
	async fn mine_to_faucet(&self, faucet: &str, blocks: u64) -> Result<(), RpcError> {
		let address = self.mining_address(faucet).await?;
		self.rpc.generate_to_address(blocks, address).await?;
		Ok(())
	}

	/// Mine the faucet's coinbase rewards to maturity and split them into the target number of
	/// outputs. Returns the faucet's confirmed UTXO count.
	pub async fn seed_initial_pool(
		&self,
		ctx: &mut GenerationContext,
	) -> Result<usize, SupplyError> {
		let faucet = ctx.config.faucet_wallet.clone();
		let policy = ctx.config.supply.clone();

		info!(
			"Mining {} initial blocks to {}",
			policy.initial_blocks, faucet
		);
		self.mine_to_faucet(&faucet, policy.initial_blocks).await?;

		info!("Waiting for maturity ({} blocks)", policy.maturity_blocks);
		self.mine_to_faucet(&faucet, policy.maturity_blocks).await?;

		info!("Mining {} additional blocks for funding", policy.buffer_blocks);
		self.mine_to_faucet(&faucet, policy.buffer_blocks).await?;

		let balance = self.rpc.get_balance(&faucet).await?;
		if balance <= 0.0 {
			return Err(SupplyError::SeedingInsufficientFunds {
				wallet: faucet,
				blocks: policy.initial_blocks + policy.maturity_blocks + policy.buffer_blocks,
			});
		}
		info!("Faucet balance after seeding: {}", format_coins(balance));

		let target = ctx.config.target_utxo_count;
		info!("Splitting {} into {} UTXOs", faucet, target);
		self.split_pool(ctx, target).await?;

		let utxo_count = self.rpc.list_unspent(&faucet, 1).await?.len();
		info!("Faucet UTXO pool: {} UTXOs", utxo_count);
		if utxo_count < ctx.config.min_utxo_threshold {
			warn!(
				"Faucet UTXO pool ({}) is below the minimum threshold ({})",
				utxo_count, ctx.config.min_utxo_threshold
			);
		}
		Ok(utxo_count)
	}

	/// Pay the faucet to itself in batches until it holds `target_count` confirmed outputs.
	///
	/// Stops early, without failing, when the balance drops below the safety floor, when a
	/// payment is refused, or after the iteration cap.
	pub async fn split_pool(
		&self,
		ctx: &mut GenerationContext,
		target_count: usize,
	) -> Result<SplitReport, SupplyError> {
		let faucet = ctx.config.faucet_wallet.clone();
		let policy = ctx.config.supply.clone();

		let mut utxo_count = self.rpc.list_unspent(&faucet, 1).await?.len();
		let mut iterations = 0;

		while iterations < policy.split_max_iterations {
			if iterations % 2 == 0 {
				debug!("Current UTXOs: {}/{}", utxo_count, target_count);
			}
			if utxo_count >= target_count {
				break;
			}

			let balance = self.rpc.get_balance(&faucet).await?;
			if balance < policy.split_balance_floor {
				info!(
					"Faucet balance {} below split floor, stopping",
					format_coins(balance)
				);
				break;
			}

			let batch = policy.split_batch_size.min(target_count - utxo_count);
			let mut recipients = BTreeMap::new();
			for _ in 0..batch {
				let address = self.rpc.get_new_address(&faucet, None).await?;
				recipients.insert(address, policy.split_output_amount);
			}

			match self.rpc.send_many(&faucet, &recipients).await {
				Ok(txid) => debug!("Split payment {} with {} outputs", txid, batch),
				Err(e) if e.is_connection_failure() => return Err(e.into()),
				Err(e) => {
					warn!("UTXO splitting stopped early: {}", e);
					break;
				}
			}

			self.mine_to_faucet(&faucet, 1).await?;
			iterations += 1;
			utxo_count = self.rpc.list_unspent(&faucet, 1).await?.len();
		}

		info!("UTXO creation complete: {} UTXOs", utxo_count);
		Ok(SplitReport {
			iterations,
			utxo_count,
		})
	}

	/// Make `num_transfers` faucet payments to the wallet's addresses in round-robin order, then
	/// mine one confirming block.
	pub async fn fund_wallet(
		&self,
		ctx: &mut GenerationContext,
		wallet_name: &str,
		num_transfers: usize,
	) -> Result<FundingReport, SupplyError> {
		let faucet = ctx.config.faucet_wallet.clone();
		let (low, high) = ctx.config.supply.funding_amount_range;

		let rng = &mut ctx.rng;
		let wallet = ctx
			.registry
			.wallets()
			.iter()
			.find(|w| w.name == wallet_name)
			.ok_or_else(|| SupplyError::UnknownWallet(wallet_name.to_string()))?;
		let payments: Vec<(String, f64)> = (0..num_transfers)
			.filter_map(|i| wallet.round_robin_address(i).map(str::to_string))
			.map(|address| (address, round_to_8(rng.random_range(low..=high))))
			.collect();

		info!(
			"Funding {} with {} transfers",
			wallet_name,
			payments.len()
		);

		let mut report = FundingReport {
			transfers_sent: 0,
			transfers_failed: 0,
			balance: 0.0,
		};
		for (address, amount) in &payments {
			match self.rpc.send_to_address(&faucet, address, *amount).await {
				Ok(_) => report.transfers_sent += 1,
				Err(e) if e.is_connection_failure() => return Err(e.into()),
				Err(e) => {
					warn!("Failed to fund {}: {}", address, e);
					report.transfers_failed += 1;
				}
			}
		}

		self.mine_to_faucet(&faucet, 1).await?;

		report.balance = self.rpc.get_balance(wallet_name).await?;
		info!("{} funded: {}", wallet_name, format_coins(report.balance));
		Ok(report)
	}

	/// Replenish the wallet from the faucet if it is below its tier minimum.
	///
	/// A well-funded wallet is left untouched. The refund is not mined here; it becomes
	/// spendable with the next block.
	pub async fn ensure_funded(
		&self,
		ctx: &mut GenerationContext,
		wallet_name: &str,
	) -> Result<FundingStatus, SupplyError> {
		let wallet = ctx
			.registry
			.wallets()
			.iter()
			.find(|w| w.name == wallet_name)
			.ok_or_else(|| SupplyError::UnknownWallet(wallet_name.to_string()))?;
		let policy = ctx.config.tier_policy(wallet.tier);

		let balance = self.rpc.get_balance(wallet_name).await?;
		if balance >= policy.min_balance {
			return Ok(FundingStatus::Sufficient { balance });
		}

		let address = wallet
			.random_address(&mut ctx.rng)
			.map(str::to_string)
			.ok_or_else(|| SupplyError::UnknownWallet(wallet_name.to_string()))?;

		match self
			.rpc
			.send_to_address(&ctx.config.faucet_wallet, &address, policy.refund_amount)
			.await
		{
			Ok(txid) => {
				ctx.stats.utxo_replenishments += 1;
				debug!(
					"Refunded {} with {} ({})",
					wallet_name,
					format_coins(policy.refund_amount),
					txid
				);
			}
			Err(e) if e.is_connection_failure() => return Err(e.into()),
			Err(e) => warn!("Failed to refund {}: {}", wallet_name, e),
		}

		let balance = self.rpc.get_balance(wallet_name).await?;
		if balance >= ctx.config.supply.spend_floor {
			Ok(FundingStatus::Replenished { balance })
		} else {
			Ok(FundingStatus::Insufficient { balance })
		}
	}
}
