//! End-to-end generation run.
//!
//! `Generator` owns the daemon for the duration of a run: it validates the configuration,
//! starts (or attaches to) the daemon, provisions wallets, drives block generation and exports
//! the fixture. The daemon handle lives on the generator rather than inside `run`, so an
//! interrupted run can still be shut down cleanly with [`Generator::shutdown`].

use super::driver::BlockDriver;
use super::supply::UtxoSupplyEngine;
use super::{GenerationConfig, GenerationContext, GenerationStats, Phase};
use crate::daemon::{DaemonConfig, DaemonHandle, DaemonSupervisor};
use crate::error::GeneratorError;
use crate::export::Exporter;
use crate::rpc::RpcGateway;
use crate::utils::format_duration;
use crate::wallet::WalletProvisioner;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Where the daemon comes from.
pub enum DaemonMode {
	/// Start a throwaway daemon in a temporary directory.
	Managed(DaemonConfig),
	/// Use an already running daemon.
	External {
		gateway: Arc<dyn RpcGateway>,
		/// Its data dir, copied into the fixture when known.
		datadir: Option<PathBuf>,
	},
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
	pub stats: GenerationStats,
	pub final_height: u64,
	pub duration: Duration,
	pub output_dir: PathBuf,
}

impl RunSummary {
	pub fn log(&self) {
		info!("Generation complete");
		info!("Blocks generated: {}", self.stats.blocks_generated);
		info!("Transactions created: {}", self.stats.transactions_created);
		info!("UTXO replenishments: {}", self.stats.utxo_replenishments);
		info!(
			"Transaction success rate: {}/{} ({:.1}%)",
			self.stats.tx_successes,
			self.stats.tx_attempts,
			self.stats.success_rate()
		);
		info!("Final height: {}", self.final_height);
		info!("Duration: {}", format_duration(self.duration));
		info!("Output: {}", self.output_dir.display());
	}
}

pub struct Generator {
	config: GenerationConfig,
	mode: DaemonMode,
	output_base: PathBuf,
	export_blocks_dat: bool,
	daemon: Option<DaemonHandle>,
}

impl Generator {
	pub fn new(config: GenerationConfig, mode: DaemonMode, output_base: PathBuf) -> Self {
		Self {
			config,
			mode,
			output_base,
			export_blocks_dat: false,
			daemon: None,
		}
	}

	pub fn with_blocks_dat(mut self, enabled: bool) -> Self {
		self.export_blocks_dat = enabled;
		self
	}

	pub async fn run(&mut self) -> Result<RunSummary, GeneratorError> {
		let started = Instant::now();
		self.config.validate()?;

		info!(
			"Generating regtest fixture: target height {}, {} target UTXOs",
			self.config.target_height, self.config.target_utxo_count
		);

		let rpc = self.connect().await?;
		let height = rpc
			.get_block_count()
			.await
			.map_err(GeneratorError::Unreachable)?;
		info!("Connected to dashd (height {})", height);

		let registry = WalletProvisioner::new(rpc.as_ref(), &self.config.faucet_wallet)
			.provision(&self.config.provisioning_plan())
			.await?;
		info!(
			"Wallets ready: faucet {} and {} tier wallets ({} pool addresses)",
			registry.faucet().name,
			registry.wallets().len(),
			registry.address_pool().len()
		);
		let mut ctx = GenerationContext::new(self.config.clone(), registry);

		let supply = UtxoSupplyEngine::new(rpc.as_ref());
		BlockDriver::new(rpc.as_ref(), &supply).run(&mut ctx).await?;

		ctx.advance_to(Phase::Exporting);
		let (final_height, output_dir) = self.export(rpc.as_ref(), &ctx).await?;
		ctx.advance_to(Phase::Done);

		let summary = RunSummary {
			stats: ctx.stats.clone(),
			final_height,
			duration: started.elapsed(),
			output_dir,
		};
		summary.log();
		Ok(summary)
	}

	/// Stop a managed daemon and release its directory. Safe to call more than once.
	pub async fn shutdown(&mut self) {
		if let Some(mut handle) = self.daemon.take() {
			if let Err(e) = handle.shutdown().await {
				warn!("Error stopping dashd: {}", e);
			}
		}
	}

	async fn connect(&mut self) -> Result<Arc<dyn RpcGateway>, GeneratorError> {
		match &self.mode {
			DaemonMode::Managed(config) => {
				let handle = DaemonSupervisor::new(config.clone()).start().await?;
				let gateway: Arc<dyn RpcGateway> = Arc::new(handle.gateway().clone());
				self.daemon = Some(handle);
				Ok(gateway)
			}
			DaemonMode::External { gateway, .. } => {
				info!("Using existing dashd");
				Ok(Arc::clone(gateway))
			}
		}
	}

	/// Write the fixture. A managed daemon is stopped before its chain data is copied.
	async fn export(
		&mut self,
		rpc: &dyn RpcGateway,
		ctx: &GenerationContext,
	) -> Result<(u64, PathBuf), GeneratorError> {
		let final_height = rpc.get_block_count().await?;

		let exporter = Exporter::new(&self.output_base, ctx.config.target_height);
		exporter.prepare()?;

		let snapshots = exporter.collect_wallets(rpc, &ctx.registry).await;
		exporter.write_wallets(&snapshots)?;
		exporter.write_metadata(&ctx.config, &ctx.stats, final_height, &snapshots)?;
		if self.export_blocks_dat {
			exporter.export_blocks(rpc).await?;
		}

		let data_dir = match (&mut self.daemon, &self.mode) {
			(Some(handle), _) => {
				info!("Stopping dashd to copy blockchain data");
				handle.shutdown().await?;
				Some(handle.data_dir().to_path_buf())
			}
			(None, DaemonMode::External { datadir, .. }) => datadir.clone(),
			(None, DaemonMode::Managed(_)) => None,
		};
		match data_dir {
			Some(dir) => {
				exporter.copy_chain_data(&dir)?;
			}
			None => warn!("No dashd datadir to copy (not using auto-start)"),
		}

		info!("Exported to {}", exporter.output_dir().display());
		Ok((final_height, exporter.output_dir().to_path_buf()))
	}
}
