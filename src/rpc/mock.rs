//! In-process regtest daemon for tests.
//!
//! Keeps per-wallet UTXO sets, an implicit mempool (outputs without a confirmation height),
//! coinbase maturity and a flat fee, which is enough to exercise funding, refunds and
//! transaction injection without a real `dashd`.

use super::{DaemonErrorKind, RpcError, RpcGateway};

use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

pub const BLOCK_REWARD: f64 = 500.0;
pub const COINBASE_MATURITY: u64 = 100;
pub const FLAT_FEE: f64 = 0.0001;

fn round8(value: f64) -> f64 {
	(value * 1e8).round() / 1e8
}

#[derive(Debug, Clone)]
struct SimUtxo {
	txid: String,
	vout: u32,
	address: String,
	amount: f64,
	/// Height of the confirming block; `None` while in the mempool.
	height: Option<u64>,
	coinbase: bool,
	/// Change paid back to the sending wallet, spendable before it confirms.
	trusted: bool,
}

impl SimUtxo {
	fn confirmations(&self, tip: u64) -> u64 {
		self.height.map(|h| tip + 1 - h).unwrap_or(0)
	}

	fn mature(&self, tip: u64) -> bool {
		!self.coinbase || self.confirmations(tip) >= COINBASE_MATURITY
	}

	fn spendable(&self, tip: u64) -> bool {
		self.mature(tip) && (self.confirmations(tip) >= 1 || self.trusted)
	}
}

#[derive(Debug, Default)]
struct SimWallet {
	utxos: Vec<SimUtxo>,
	addresses: Vec<String>,
	history: Vec<Value>,
}

/// A recorded gateway invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
	pub method: String,
	pub wallet: Option<String>,
	pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct SimState {
	height: u64,
	wallets: BTreeMap<String, SimWallet>,
	/// address -> (wallet, index)
	owners: HashMap<String, (String, usize)>,
	next_tx: u64,
	calls: Vec<RecordedCall>,
	scripted_failures: VecDeque<(String, DaemonErrorKind)>,
}

impl SimState {
	fn wallet_name(&self, method: &str, wallet: Option<&str>) -> Result<String, RpcError> {
		let name = wallet.unwrap_or("default");
		if self.wallets.contains_key(name) {
			Ok(name.to_string())
		} else {
			Err(RpcError::daemon(
				method,
				DaemonErrorKind::WalletNotFound,
				"Requested wallet does not exist or is not loaded",
			))
		}
	}

	fn new_address(&mut self, wallet: &str) -> String {
		let entry = self.wallets.entry(wallet.to_string()).or_default();
		let index = entry.addresses.len();
		let address = format!("y{}{:04}", wallet, index);
		entry.addresses.push(address.clone());
		self.owners
			.insert(address.clone(), (wallet.to_string(), index));
		address
	}

	fn next_txid(&mut self) -> String {
		self.next_tx += 1;
		format!("{:064x}", self.next_tx)
	}

	fn balance(&self, wallet: &str) -> f64 {
		self.wallets
			.get(wallet)
			.map(|w| {
				round8(
					w.utxos
						.iter()
						.filter(|u| u.spendable(self.height))
						.map(|u| u.amount)
						.sum(),
				)
			})
			.unwrap_or(0.0)
	}

	#[allow(clippy::too_many_arguments)]
	fn credit(
		&mut self,
		wallet: &str,
		address: String,
		amount: f64,
		txid: String,
		vout: u32,
		height: Option<u64>,
		coinbase: bool,
		trusted: bool,
	) {
		let entry = self.wallets.entry(wallet.to_string()).or_default();
		entry.utxos.push(SimUtxo {
			txid: txid.clone(),
			vout,
			address: address.clone(),
			amount: round8(amount),
			height,
			coinbase,
			trusted,
		});
		entry.history.push(json!({
			"txid": txid,
			"address": address,
			"amount": round8(amount),
			"confirmations": 0,
			"category": if coinbase { "immature" } else { "receive" },
		}));
	}

	fn spend(
		&mut self,
		method: &str,
		wallet: &str,
		outputs: Vec<(String, f64)>,
	) -> Result<String, RpcError> {
		if outputs.iter().any(|(_, amount)| *amount <= 0.0) {
			return Err(RpcError::daemon(
				method,
				DaemonErrorKind::InvalidArguments,
				"Amount out of range",
			));
		}
		let total: f64 = outputs.iter().map(|(_, amount)| amount).sum();
		let needed = round8(total + FLAT_FEE);
		let tip = self.height;

		let sender = self
			.wallets
			.get_mut(wallet)
			.ok_or_else(|| RpcError::daemon(method, DaemonErrorKind::WalletNotFound, wallet))?;

		// Largest first, so earlier small outputs survive.
		let mut candidates: Vec<usize> = (0..sender.utxos.len())
			.filter(|&i| sender.utxos[i].spendable(tip))
			.collect();
		candidates.sort_by(|&a, &b| sender.utxos[b].amount.total_cmp(&sender.utxos[a].amount));

		let mut selected = 0.0;
		let mut chosen = Vec::new();
		for i in candidates {
			if selected >= needed {
				break;
			}
			chosen.push(i);
			selected += sender.utxos[i].amount;
		}
		if selected < needed {
			return Err(RpcError::daemon(
				method,
				DaemonErrorKind::InsufficientFunds,
				"Insufficient funds",
			));
		}
		chosen.sort_unstable();
		for i in chosen.into_iter().rev() {
			sender.utxos.remove(i);
		}
		let change_address = sender.addresses.first().cloned();

		let txid = self.next_txid();
		let mut vout = 0;
		for (address, amount) in outputs {
			if let Some((owner, _)) = self.owners.get(&address).cloned() {
				self.credit(&owner, address.clone(), amount, txid.clone(), vout, None, false, false);
			}
			if let Some(sender) = self.wallets.get_mut(wallet) {
				sender.history.push(json!({
					"txid": txid,
					"address": address,
					"amount": -round8(amount),
					"confirmations": 0,
					"category": "send",
				}));
			}
			vout += 1;
		}

		let change = round8(selected - needed);
		if change > 0.0 {
			let change_address = match change_address {
				Some(address) => address,
				None => self.new_address(wallet),
			};
			self.credit(wallet, change_address, change, txid.clone(), vout, None, false, true);
		}

		Ok(txid)
	}

	fn mine(&mut self, blocks: u64, address: &str) -> Vec<String> {
		let owner = self.owners.get(address).map(|(w, _)| w.clone());
		let mut hashes = Vec::new();
		for _ in 0..blocks {
			self.height += 1;
			let height = self.height;
			for wallet in self.wallets.values_mut() {
				for utxo in wallet.utxos.iter_mut().filter(|u| u.height.is_none()) {
					utxo.height = Some(height);
				}
			}
			if let Some(owner) = &owner {
				let txid = self.next_txid();
				self.credit(owner, address.to_string(), BLOCK_REWARD, txid, 0, Some(height), true, false);
			}
			hashes.push(block_hash(height));
		}
		hashes
	}
}

fn block_hash(height: u64) -> String {
	format!("{:064x}", height + 0xb10c)
}

fn amount_param(method: &str, value: Option<&Value>) -> Result<f64, RpcError> {
	value
		.and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
		.ok_or_else(|| RpcError::daemon(method, DaemonErrorKind::InvalidArguments, "Invalid amount"))
}

fn str_param<'a>(method: &str, value: Option<&'a Value>) -> Result<&'a str, RpcError> {
	value
		.and_then(Value::as_str)
		.ok_or_else(|| RpcError::daemon(method, DaemonErrorKind::InvalidArguments, "Expected string"))
}

/// Simulated regtest daemon implementing [`RpcGateway`].
#[derive(Debug, Default)]
pub struct SimulatedDaemon {
	state: Mutex<SimState>,
}

impl SimulatedDaemon {
	pub fn new() -> Self {
		Self::default()
	}

	/// Create (or reuse) `wallet` and give it `amount` in one mature, confirmed output.
	pub fn fund(&self, wallet: &str, amount: f64) -> String {
		let mut state = self.state.lock().unwrap();
		let address = state.new_address(wallet);
		let txid = state.next_txid();
		let height = state.height;
		state.credit(wallet, address.clone(), amount, txid, 0, Some(height), false, false);
		address
	}

	/// Create an empty wallet with `addresses` fresh addresses and return them.
	pub fn add_wallet(&self, wallet: &str, addresses: usize) -> Vec<String> {
		let mut state = self.state.lock().unwrap();
		state.wallets.entry(wallet.to_string()).or_default();
		(0..addresses).map(|_| state.new_address(wallet)).collect()
	}

	pub fn set_height(&self, height: u64) {
		self.state.lock().unwrap().height = height;
	}

	pub fn height(&self) -> u64 {
		self.state.lock().unwrap().height
	}

	pub fn balance(&self, wallet: &str) -> f64 {
		self.state.lock().unwrap().balance(wallet)
	}

	pub fn utxo_count(&self, wallet: &str) -> usize {
		let state = self.state.lock().unwrap();
		let tip = state.height;
		state
			.wallets
			.get(wallet)
			.map(|w| {
				w.utxos
					.iter()
					.filter(|u| u.mature(tip) && u.confirmations(tip) >= 1)
					.count()
			})
			.unwrap_or(0)
	}

	/// Make the next call of `method` fail with `kind`.
	pub fn fail_next(&self, method: &str, kind: DaemonErrorKind) {
		self.state
			.lock()
			.unwrap()
			.scripted_failures
			.push_back((method.to_string(), kind));
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.state.lock().unwrap().calls.clone()
	}

	pub fn count_calls(&self, method: &str) -> usize {
		self.state
			.lock()
			.unwrap()
			.calls
			.iter()
			.filter(|c| c.method == method)
			.count()
	}

	fn handle(
		&self,
		method: &str,
		params: &[Value],
		wallet: Option<&str>,
	) -> Result<Value, RpcError> {
		let mut state = self.state.lock().unwrap();
		state.calls.push(RecordedCall {
			method: method.to_string(),
			wallet: wallet.map(str::to_string),
			params: params.to_vec(),
		});

		if let Some(pos) = state
			.scripted_failures
			.iter()
			.position(|(m, _)| m == method)
		{
			if let Some((_, kind)) = state.scripted_failures.remove(pos) {
				return Err(RpcError::daemon(method, kind, "scripted failure"));
			}
		}

		match method {
			"getblockcount" => Ok(json!(state.height)),
			"getblockhash" => {
				let height = params.first().and_then(Value::as_u64).unwrap_or(0);
				Ok(json!(block_hash(height)))
			}
			"getblock" => {
				let hash = str_param(method, params.first())?;
				Ok(json!(hex::encode(format!("block:{}", hash))))
			}
			"createwallet" => {
				let name = str_param(method, params.first())?.to_string();
				if state.wallets.contains_key(&name) {
					return Err(RpcError::daemon(
						method,
						DaemonErrorKind::WalletAlreadyExists,
						"Database already exists.",
					));
				}
				state.wallets.insert(name.clone(), SimWallet::default());
				Ok(json!({ "name": name, "warning": "" }))
			}
			"loadwallet" => {
				let name = str_param(method, params.first())?;
				if state.wallets.contains_key(name) {
					Err(RpcError::daemon(
						method,
						DaemonErrorKind::WalletAlreadyLoaded,
						"Data file is already loaded",
					))
				} else {
					Err(RpcError::daemon(
						method,
						DaemonErrorKind::WalletNotFound,
						"Path does not exist.",
					))
				}
			}
			"dumphdinfo" => {
				let name = state.wallet_name(method, wallet)?;
				Ok(json!({ "mnemonic": format!("simulated seed words for {}", name) }))
			}
			"getnewaddress" => {
				let name = state.wallet_name(method, wallet)?;
				Ok(json!(state.new_address(&name)))
			}
			"dumpprivkey" => {
				let address = str_param(method, params.first())?;
				Ok(json!(format!("cSim{}", address)))
			}
			"getaddressinfo" => {
				let address = str_param(method, params.first())?;
				match state.owners.get(address) {
					Some((_, index)) => Ok(json!({ "hdkeypath": format!("m/44'/1'/0'/0/{}", index) })),
					None => Ok(json!({})),
				}
			}
			"getbalance" => {
				let name = state.wallet_name(method, wallet)?;
				Ok(json!(state.balance(&name)))
			}
			"listunspent" => {
				let name = state.wallet_name(method, wallet)?;
				let min_conf = params.first().and_then(Value::as_u64).unwrap_or(1);
				let tip = state.height;
				let entries: Vec<Value> = state.wallets[&name]
					.utxos
					.iter()
					.filter(|u| u.mature(tip) && u.confirmations(tip) >= min_conf)
					.map(|u| {
						json!({
							"txid": u.txid,
							"vout": u.vout,
							"address": u.address,
							"amount": u.amount,
							"confirmations": u.confirmations(tip),
						})
					})
					.collect();
				Ok(Value::Array(entries))
			}
			"listtransactions" => {
				let name = state.wallet_name(method, wallet)?;
				Ok(Value::Array(state.wallets[&name].history.clone()))
			}
			"sendtoaddress" => {
				let name = state.wallet_name(method, wallet)?;
				let address = str_param(method, params.first())?.to_string();
				let amount = amount_param(method, params.get(1))?;
				state.spend(method, &name, vec![(address, amount)]).map(Value::String)
			}
			"sendmany" => {
				let name = state.wallet_name(method, wallet)?;
				let outputs = params
					.get(1)
					.and_then(Value::as_object)
					.ok_or_else(|| RpcError::daemon(method, DaemonErrorKind::InvalidArguments, "Expected object"))?
					.iter()
					.map(|(address, amount)| Ok((address.clone(), amount_param(method, Some(amount))?)))
					.collect::<Result<Vec<_>, RpcError>>()?;
				state.spend(method, &name, outputs).map(Value::String)
			}
			"generatetoaddress" => {
				let blocks = params.first().and_then(Value::as_u64).unwrap_or(0);
				let address = str_param(method, params.get(1))?.to_string();
				Ok(json!(state.mine(blocks, &address)))
			}
			"stop" => Ok(json!("Dash Core server stopping")),
			_ => Err(RpcError::daemon(method, DaemonErrorKind::Other, "Method not found")),
		}
	}
}

#[async_trait::async_trait]
impl RpcGateway for SimulatedDaemon {
	async fn call(
		&self,
		method: &str,
		params: &[Value],
		wallet: Option<&str>,
	) -> Result<Value, RpcError> {
		self.handle(method, params, wallet)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn coinbase_rewards_mature_after_window() {
		let daemon = SimulatedDaemon::new();
		let address = daemon.add_wallet("default", 1).remove(0);
		let rpc: &dyn RpcGateway = &daemon;

		rpc.generate_to_address(COINBASE_MATURITY - 1, &address)
			.await
			.unwrap();
		assert_eq!(rpc.get_balance("default").await.unwrap(), 0.0);

		rpc.generate_to_address(1, &address).await.unwrap();
		assert_eq!(rpc.get_balance("default").await.unwrap(), BLOCK_REWARD);
	}

	#[tokio::test]
	async fn payments_confirm_on_next_block() {
		let daemon = SimulatedDaemon::new();
		daemon.fund("default", 100.0);
		let dest = daemon.add_wallet("light", 1).remove(0);
		let rpc: &dyn RpcGateway = &daemon;

		rpc.send_to_address("default", &dest, 10.0).await.unwrap();
		assert_eq!(rpc.get_balance("light").await.unwrap(), 0.0);

		rpc.generate_to_address(1, &dest).await.unwrap();
		assert_eq!(rpc.get_balance("light").await.unwrap(), 10.0);
		assert!((rpc.get_balance("default").await.unwrap() - (90.0 - FLAT_FEE)).abs() < 1e-8);
	}

	#[tokio::test]
	async fn overspending_reports_insufficient_funds() {
		let daemon = SimulatedDaemon::new();
		daemon.fund("default", 1.0);
		let rpc: &dyn RpcGateway = &daemon;

		let err = rpc
			.send_to_address("default", "ynowhere", 5.0)
			.await
			.unwrap_err();
		assert!(err.is_insufficient_funds());
	}
}
