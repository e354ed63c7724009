//! Fixture export.
//!
//! Writes the `regtest-<height>/` fixture directory: one JSON file per wallet with its final
//! transactions and UTXOs, run metadata, a copy of the daemon's chain data and optionally the
//! legacy `blocks.dat` dump.

mod chain_data;
mod wallets;

pub use chain_data::{ChainDataCopy, copy_chain_data, write_blocks_dat};
pub use wallets::{WalletSnapshot, collect_snapshot};

use crate::generator::{DensityPreset, GenerationConfig, GenerationStats, TxDensity};
use crate::rpc::{RpcError, RpcGateway};
use crate::utils::format_coins;
use crate::wallet::WalletRegistry;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
	#[error("I/O error on {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to serialize {what}: {source}")]
	Json {
		what: String,
		#[source]
		source: serde_json::Error,
	},

	#[error(transparent)]
	Rpc(#[from] RpcError),

	#[error("Block {height} is not valid hex: {source}")]
	BlockDecode {
		height: u64,
		#[source]
		source: hex::FromHexError,
	},
}

impl ExportError {
	pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
		ExportError::Io {
			path: path.to_path_buf(),
			source,
		}
	}
}

/// Run metadata written to `generation.json`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetadata<'a> {
	pub target_height: u64,
	pub final_height: u64,
	pub stats: &'a GenerationStats,
	pub density: &'a TxDensity,
	pub density_preset: Option<DensityPreset>,
	pub seed: Option<u64>,
	pub wallets: Vec<&'a str>,
	pub created_at: String,
}

/// Writes one fixture directory under `output_base`.
pub struct Exporter {
	output_dir: PathBuf,
}

impl Exporter {
	pub fn new(output_base: &Path, target_height: u64) -> Self {
		Self {
			output_dir: output_base.join(format!("regtest-{}", target_height)),
		}
	}

	pub fn output_dir(&self) -> &Path {
		&self.output_dir
	}

	/// Create an empty output directory, removing whatever a previous run left there.
	pub fn prepare(&self) -> Result<(), ExportError> {
		if self.output_dir.exists() {
			info!(
				"Removing existing output directory: {}",
				self.output_dir.display()
			);
			std::fs::remove_dir_all(&self.output_dir)
				.map_err(|e| ExportError::io(&self.output_dir, e))?;
		}
		std::fs::create_dir_all(&self.output_dir).map_err(|e| ExportError::io(&self.output_dir, e))
	}

	/// Snapshot the faucet and every tier wallet; the daemon must still be running.
	pub async fn collect_wallets(
		&self,
		rpc: &dyn RpcGateway,
		registry: &WalletRegistry,
	) -> Vec<WalletSnapshot> {
		info!("Collecting wallet statistics...");
		let mut snapshots = Vec::with_capacity(registry.wallets().len() + 1);
		for wallet in registry.all() {
			snapshots.push(collect_snapshot(rpc, wallet).await);
		}
		snapshots
	}

	/// Write `wallets/<name>.json` for each snapshot.
	pub fn write_wallets(&self, snapshots: &[WalletSnapshot]) -> Result<(), ExportError> {
		let wallets_dir = self.output_dir.join("wallets");
		std::fs::create_dir_all(&wallets_dir).map_err(|e| ExportError::io(&wallets_dir, e))?;

		for snapshot in snapshots {
			let path = wallets_dir.join(format!("{}.json", snapshot.wallet_name));
			write_json(&path, snapshot, &snapshot.wallet_name)?;
			info!(
				"{}.json: {} txs, {} UTXOs, balance: {}",
				snapshot.wallet_name,
				snapshot.transaction_count,
				snapshot.utxo_count,
				format_coins(snapshot.balance)
			);
		}
		Ok(())
	}

	pub fn write_metadata(
		&self,
		config: &GenerationConfig,
		stats: &GenerationStats,
		final_height: u64,
		snapshots: &[WalletSnapshot],
	) -> Result<(), ExportError> {
		let metadata = GenerationMetadata {
			target_height: config.target_height,
			final_height,
			stats,
			density: &config.density,
			density_preset: config.density_preset,
			seed: config.seed,
			wallets: snapshots.iter().map(|s| s.wallet_name.as_str()).collect(),
			created_at: chrono::Utc::now().to_rfc3339(),
		};
		write_json(
			&self.output_dir.join("generation.json"),
			&metadata,
			"generation metadata",
		)
	}

	/// Write `blocks.dat`; the daemon must still be running.
	pub async fn export_blocks(&self, rpc: &dyn RpcGateway) -> Result<u64, ExportError> {
		write_blocks_dat(rpc, &self.output_dir.join("blocks.dat")).await
	}

	/// Copy `<data_dir>/regtest` into the fixture; the daemon must be stopped.
	pub fn copy_chain_data(&self, data_dir: &Path) -> Result<Option<ChainDataCopy>, ExportError> {
		copy_chain_data(data_dir, &self.output_dir)
	}
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<(), ExportError> {
	let content = serde_json::to_string_pretty(value).map_err(|source| ExportError::Json {
		what: what.to_string(),
		source,
	})?;
	std::fs::write(path, content).map_err(|e| ExportError::io(path, e))
}
