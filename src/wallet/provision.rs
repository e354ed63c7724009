//! Wallet setup at the daemon.
//!
//! The faucet is the daemon's default wallet and is loaded (or created on a fresh data dir).
//! Every tier wallet is a separate HD wallet at the daemon holding a fixed number of labelled
//! addresses together with their private keys and derivation paths.

use super::{AddressRecord, ProvisionError, Tier, Wallet, WalletRegistry};
use crate::rpc::{DaemonErrorKind, RpcGateway};

use tracing::{debug, info};

/// Creates the wallets a generation run uses.
pub struct WalletProvisioner<'a> {
	rpc: &'a dyn RpcGateway,
	faucet_name: String,
}

impl<'a> WalletProvisioner<'a> {
	pub fn new(rpc: &'a dyn RpcGateway, faucet_name: impl Into<String>) -> Self {
		Self {
			rpc,
			faucet_name: faucet_name.into(),
		}
	}

	/// Load the faucet wallet, creating it if the daemon has never seen it.
	pub async fn ensure_faucet(&self) -> Result<Wallet, ProvisionError> {
		let name = self.faucet_name.as_str();
		match self.rpc.load_wallet(name).await {
			Ok(()) => info!("Loaded wallet: {}", name),
			Err(e) => match e.kind() {
				DaemonErrorKind::WalletAlreadyLoaded => info!("Wallet already loaded: {}", name),
				DaemonErrorKind::WalletNotFound => {
					info!("Creating new wallet: {}", name);
					self.rpc
						.create_wallet(name)
						.await
						.map_err(|e| ProvisionError::rpc(name, e))?;
				}
				_ => return Err(ProvisionError::rpc(name, e)),
			},
		}

		// Legacy wallets have no HD seed to report.
		let mnemonic = self
			.rpc
			.dump_hd_info(name)
			.await
			.map(|info| info.mnemonic)
			.unwrap_or_default();

		Ok(Wallet::new(name, Tier::Faucet, mnemonic))
	}

	/// Create the tier wallet `tier` with `address_count` addresses.
	pub async fn create_tier_wallet(
		&self,
		tier: Tier,
		address_count: usize,
	) -> Result<Wallet, ProvisionError> {
		let name = tier.as_str();
		info!(
			"Creating {} wallet ({} addresses)",
			name, address_count
		);

		match self.rpc.create_wallet(name).await {
			Ok(()) => debug!("Created wallet {}", name),
			Err(e)
				if matches!(
					e.kind(),
					DaemonErrorKind::WalletAlreadyExists | DaemonErrorKind::WalletAlreadyLoaded
				) =>
			{
				info!("Wallet already exists: {}", name)
			}
			Err(e) => return Err(ProvisionError::rpc(name, e)),
		}

		let rpc_err = |e| ProvisionError::rpc(name, e);
		let mnemonic = self.rpc.dump_hd_info(name).await.map_err(rpc_err)?.mnemonic;

		let mut wallet = Wallet::new(name, tier, mnemonic);
		for i in 0..address_count {
			let label = format!("{}_{:03}", name, i);
			let address = self
				.rpc
				.get_new_address(name, Some(&label))
				.await
				.map_err(rpc_err)?;
			let private_key = self
				.rpc
				.dump_priv_key(name, &address)
				.await
				.map_err(rpc_err)?;
			let hd_path = self
				.rpc
				.get_address_info(name, &address)
				.await
				.map_err(rpc_err)?
				.hdkeypath
				.unwrap_or_else(|| format!("m/44'/1'/0'/0/{}", i));

			wallet.addresses.push(AddressRecord {
				address,
				label,
				private_key,
				hd_path,
				tier,
				wallet_name: name.to_string(),
			});

			if (i + 1) % 10 == 0 {
				debug!("Generated {}/{} addresses for {}", i + 1, address_count, name);
			}
		}

		if wallet.addresses.is_empty() {
			return Err(ProvisionError::NoAddresses(name.to_string()));
		}

		info!("{} complete: {} addresses", name, wallet.addresses.len());
		Ok(wallet)
	}

	/// Faucet plus one wallet per `(tier, address_count)` entry.
	pub async fn provision(
		&self,
		tiers: &[(Tier, usize)],
	) -> Result<WalletRegistry, ProvisionError> {
		let faucet = self.ensure_faucet().await?;

		let mut wallets = Vec::with_capacity(tiers.len());
		for &(tier, address_count) in tiers {
			wallets.push(self.create_tier_wallet(tier, address_count).await?);
		}

		let registry = WalletRegistry::new(faucet, wallets);
		info!(
			"Provisioned {} wallets with {} total addresses",
			registry.wallets().len(),
			registry.address_pool().len()
		);
		Ok(registry)
	}
}
