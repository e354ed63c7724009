//! Response types for the daemon methods the generator decodes.

use serde::{Deserialize, Serialize};

/// One entry of `listunspent`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnspentOutput {
	pub txid: String,
	pub vout: u32,
	#[serde(default)]
	pub address: String,
	pub amount: f64,
	pub confirmations: u64,
}

/// One entry of `listtransactions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletTransaction {
	pub txid: String,
	#[serde(default)]
	pub address: String,
	pub amount: f64,
	/// Negative for conflicted transactions.
	#[serde(default)]
	pub confirmations: i64,
	#[serde(default)]
	pub blockhash: String,
	#[serde(default)]
	pub time: u64,
}

/// Subset of `dumphdinfo`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HdInfo {
	#[serde(default)]
	pub mnemonic: String,
}

/// Subset of `getaddressinfo`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressInfo {
	#[serde(default)]
	pub hdkeypath: Option<String>,
}
