//! Typed wrappers over [`RpcGateway::call`] for the daemon methods the generator uses.

use super::{AddressInfo, HdInfo, RpcError, RpcGateway, UnspentOutput, WalletTransaction};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Upper confirmation bound used when listing every unspent output.
const MAX_CONFIRMATIONS: u64 = 9_999_999;

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, RpcError> {
	serde_json::from_value(value).map_err(|source| RpcError::Decode {
		method: method.to_string(),
		source,
	})
}

impl dyn RpcGateway + '_ {
	pub async fn get_block_count(&self) -> Result<u64, RpcError> {
		let value = self.call("getblockcount", &[], None).await?;
		decode("getblockcount", value)
	}

	pub async fn get_balance(&self, wallet: &str) -> Result<f64, RpcError> {
		let value = self.call("getbalance", &[], Some(wallet)).await?;
		decode("getbalance", value)
	}

	/// Unspent outputs with at least `min_conf` confirmations.
	pub async fn list_unspent(
		&self,
		wallet: &str,
		min_conf: u64,
	) -> Result<Vec<UnspentOutput>, RpcError> {
		let value = self
			.call(
				"listunspent",
				&[json!(min_conf), json!(MAX_CONFIRMATIONS), json!([])],
				Some(wallet),
			)
			.await?;
		decode("listunspent", value)
	}

	pub async fn list_transactions(
		&self,
		wallet: &str,
		count: u32,
	) -> Result<Vec<WalletTransaction>, RpcError> {
		let value = self
			.call(
				"listtransactions",
				&[json!("*"), json!(count), json!(0), json!(true)],
				Some(wallet),
			)
			.await?;
		decode("listtransactions", value)
	}

	pub async fn get_new_address(
		&self,
		wallet: &str,
		label: Option<&str>,
	) -> Result<String, RpcError> {
		let params = match label {
			Some(label) => vec![json!(label)],
			None => Vec::new(),
		};
		let value = self.call("getnewaddress", &params, Some(wallet)).await?;
		decode("getnewaddress", value)
	}

	/// Pay `amount` to `address`; the daemon picks inputs and computes the fee.
	pub async fn send_to_address(
		&self,
		wallet: &str,
		address: &str,
		amount: f64,
	) -> Result<String, RpcError> {
		let value = self
			.call(
				"sendtoaddress",
				&[json!(address), json!(amount)],
				Some(wallet),
			)
			.await?;
		decode("sendtoaddress", value)
	}

	/// Pay several addresses in one transaction.
	pub async fn send_many(
		&self,
		wallet: &str,
		outputs: &BTreeMap<String, f64>,
	) -> Result<String, RpcError> {
		let value = self
			.call("sendmany", &[json!(""), json!(outputs)], Some(wallet))
			.await?;
		decode("sendmany", value)
	}

	/// Mine `blocks` blocks paying the coinbase to `address`; returns the block hashes.
	pub async fn generate_to_address(
		&self,
		blocks: u64,
		address: &str,
	) -> Result<Vec<String>, RpcError> {
		let value = self
			.call("generatetoaddress", &[json!(blocks), json!(address)], None)
			.await?;
		decode("generatetoaddress", value)
	}

	pub async fn create_wallet(&self, name: &str) -> Result<(), RpcError> {
		self.call("createwallet", &[json!(name)], None).await?;
		Ok(())
	}

	pub async fn load_wallet(&self, name: &str) -> Result<(), RpcError> {
		self.call("loadwallet", &[json!(name)], None).await?;
		Ok(())
	}

	pub async fn dump_hd_info(&self, wallet: &str) -> Result<HdInfo, RpcError> {
		let value = self.call("dumphdinfo", &[], Some(wallet)).await?;
		decode("dumphdinfo", value)
	}

	pub async fn dump_priv_key(&self, wallet: &str, address: &str) -> Result<String, RpcError> {
		let value = self
			.call("dumpprivkey", &[json!(address)], Some(wallet))
			.await?;
		decode("dumpprivkey", value)
	}

	pub async fn get_address_info(
		&self,
		wallet: &str,
		address: &str,
	) -> Result<AddressInfo, RpcError> {
		let value = self
			.call("getaddressinfo", &[json!(address)], Some(wallet))
			.await?;
		decode("getaddressinfo", value)
	}

	pub async fn get_block_hash(&self, height: u64) -> Result<String, RpcError> {
		let value = self.call("getblockhash", &[json!(height)], None).await?;
		decode("getblockhash", value)
	}

	/// Serialized block as hex (`getblock <hash> 0`).
	pub async fn get_raw_block(&self, hash: &str) -> Result<String, RpcError> {
		let value = self.call("getblock", &[json!(hash), json!(0)], None).await?;
		decode("getblock", value)
	}

	/// Ask the daemon to shut down.
	pub async fn stop(&self) -> Result<(), RpcError> {
		self.call("stop", &[], None).await?;
		Ok(())
	}
}
