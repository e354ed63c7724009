use crate::rpc::RpcError;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Usage-intensity class of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
	/// Mines the seed blocks and funds everyone else.
	Faucet,
	Light,
	Normal,
	Heavy,
}

impl Tier {
	/// Tiers that take part in transaction injection, in provisioning order.
	pub const GENERATION: [Tier; 3] = [Tier::Light, Tier::Normal, Tier::Heavy];

	pub fn as_str(self) -> &'static str {
		match self {
			Tier::Faucet => "faucet",
			Tier::Light => "light",
			Tier::Normal => "normal",
			Tier::Heavy => "heavy",
		}
	}
}

impl fmt::Display for Tier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One HD address of a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
	pub address: String,
	pub label: String,
	pub private_key: String,
	pub hd_path: String,
	pub tier: Tier,
	pub wallet_name: String,
}

/// A named wallet at the daemon together with the addresses generated for it.
///
/// Balance is deliberately absent: it changes with every block and is always queried live.
#[derive(Debug, Clone)]
pub struct Wallet {
	pub name: String,
	pub tier: Tier,
	pub mnemonic: String,
	pub addresses: Vec<AddressRecord>,
}

impl Wallet {
	pub fn new(name: impl Into<String>, tier: Tier, mnemonic: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			tier,
			mnemonic: mnemonic.into(),
			addresses: Vec::new(),
		}
	}

	/// Address for the `i`-th transfer in round-robin order.
	pub fn round_robin_address(&self, i: usize) -> Option<&str> {
		if self.addresses.is_empty() {
			return None;
		}
		Some(&self.addresses[i % self.addresses.len()].address)
	}

	pub fn random_address<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		self.addresses.choose(rng).map(|record| record.address.as_str())
	}
}

/// The faucet plus the tier wallets used as transaction sources and sinks.
#[derive(Debug, Clone)]
pub struct WalletRegistry {
	faucet: Wallet,
	wallets: Vec<Wallet>,
	/// Every tier wallet address, in provisioning order.
	address_pool: Vec<String>,
}

impl WalletRegistry {
	pub fn new(faucet: Wallet, wallets: Vec<Wallet>) -> Self {
		let address_pool = wallets
			.iter()
			.flat_map(|w| w.addresses.iter().map(|a| a.address.clone()))
			.collect();
		Self {
			faucet,
			wallets,
			address_pool,
		}
	}

	pub fn faucet(&self) -> &Wallet {
		&self.faucet
	}

	/// Tier wallets, excluding the faucet.
	pub fn wallets(&self) -> &[Wallet] {
		&self.wallets
	}

	/// Faucet first, then the tier wallets.
	pub fn all(&self) -> impl Iterator<Item = &Wallet> {
		std::iter::once(&self.faucet).chain(self.wallets.iter())
	}

	pub fn address_pool(&self) -> &[String] {
		&self.address_pool
	}

	pub fn random_wallet<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Wallet> {
		self.wallets.choose(rng)
	}

	pub fn random_pool_address<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		self.address_pool.choose(rng).map(String::as_str)
	}
}

/// Failures while setting up wallets at the daemon.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
	#[error("Wallet {wallet}: {source}")]
	Rpc {
		wallet: String,
		#[source]
		source: RpcError,
	},

	#[error("Wallet {0} has no addresses")]
	NoAddresses(String),
}

impl ProvisionError {
	pub fn rpc(wallet: &str, source: RpcError) -> Self {
		ProvisionError::Rpc {
			wallet: wallet.to_string(),
			source,
		}
	}

	pub fn is_connection_failure(&self) -> bool {
		matches!(self, ProvisionError::Rpc { source, .. } if source.is_connection_failure())
	}
}
