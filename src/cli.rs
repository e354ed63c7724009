use crate::daemon::DaemonConfig;
use crate::generator::{DaemonMode, DensityPreset, GenerationConfig, TxDensity};
use crate::rpc::DashCliGateway;

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Generate a Dash regtest chain with realistic wallet activity and export it as a test fixture.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
	/// Target chain height.
	#[clap(long, default_value = "100")]
	pub blocks: u64,

	/// Path to the dashd executable. dash-cli is expected next to it.
	#[clap(long, default_value = "dashd")]
	pub dashd_path: PathBuf,

	/// Connect to an already running daemon instead of starting one.
	#[clap(long)]
	pub no_auto_start: bool,

	/// RPC port. Defaults to the first free port from 19998 when starting a daemon.
	#[clap(long)]
	pub rpc_port: Option<u16>,

	/// Data directory of an externally started daemon.
	#[clap(long)]
	pub datadir: Option<PathBuf>,

	/// Keep the daemon's temporary directory after the run.
	#[clap(long)]
	pub keep_temp: bool,

	/// How many transactions blocks carry.
	#[clap(long, value_enum, default_value = "normal")]
	pub tx_density: DensityPreset,

	/// Number of faucet UTXOs to split into before funding wallets.
	#[clap(long, default_value = "200")]
	pub target_utxos: usize,

	/// Base directory for the regtest-<N>/ output.
	#[clap(long, default_value = ".")]
	pub output_dir: PathBuf,

	/// Also write the legacy blocks.dat file.
	#[clap(long)]
	pub export_blocks_dat: bool,

	/// Seed for reproducible transaction shapes.
	#[clap(long)]
	pub seed: Option<u64>,

	/// Timeout of a single RPC call, in seconds.
	#[clap(long, default_value = "30")]
	pub rpc_timeout: u64,
}

impl Args {
	pub fn generation_config(&self) -> GenerationConfig {
		GenerationConfig {
			target_height: self.blocks,
			target_utxo_count: self.target_utxos,
			density_preset: Some(self.tx_density),
			density: TxDensity::preset(self.tx_density),
			seed: self.seed,
			..Default::default()
		}
	}

	/// `dash-cli` beside an explicitly located dashd, otherwise from `PATH`.
	pub fn dashcli_path(&self) -> PathBuf {
		match self.dashd_path.parent() {
			Some(dir) if self.dashd_path.is_absolute() => dir.join("dash-cli"),
			_ => PathBuf::from("dash-cli"),
		}
	}

	pub fn daemon_mode(&self) -> DaemonMode {
		let rpc_timeout = Duration::from_secs(self.rpc_timeout);
		if self.no_auto_start {
			let gateway = DashCliGateway::new(self.dashcli_path())
				.with_datadir(self.datadir.clone())
				.with_rpc_port(self.rpc_port)
				.with_timeout(rpc_timeout);
			DaemonMode::External {
				gateway: Arc::new(gateway),
				datadir: self.datadir.clone(),
			}
		} else {
			DaemonMode::Managed(DaemonConfig {
				dashd_path: self.dashd_path.clone(),
				dashcli_path: self.dashcli_path(),
				rpc_port: self.rpc_port,
				keep_temp: self.keep_temp,
				rpc_timeout,
				..Default::default()
			})
		}
	}

	pub fn output_base(&self) -> &Path {
		&self.output_dir
	}
}

impl Default for Args {
	fn default() -> Self {
		let empty: Vec<String> = vec![];
		Self::parse_from(empty)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let args = Args::default();
		assert_eq!(args.blocks, 100);
		assert_eq!(args.tx_density, DensityPreset::Normal);
		assert_eq!(args.target_utxos, 200);
		assert_eq!(args.rpc_timeout, 30);
		assert!(!args.no_auto_start);
		assert_eq!(args.dashcli_path(), PathBuf::from("dash-cli"));

		let config = args.generation_config();
		assert_eq!(config.target_height, 100);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn dash_cli_is_found_next_to_an_absolute_dashd() {
		let args = Args::parse_from([
			"regtest-fixture-gen",
			"--dashd-path",
			"/opt/dash/bin/dashd",
			"--blocks",
			"500",
			"--tx-density",
			"heavy",
			"--seed",
			"7",
		]);
		assert_eq!(args.dashcli_path(), PathBuf::from("/opt/dash/bin/dash-cli"));

		let config = args.generation_config();
		assert_eq!(config.target_height, 500);
		assert_eq!(config.density, TxDensity::preset(DensityPreset::Heavy));
		assert_eq!(config.seed, Some(7));
	}

	#[test]
	fn no_auto_start_attaches_to_an_existing_daemon() {
		let args = Args::parse_from([
			"regtest-fixture-gen",
			"--no-auto-start",
			"--datadir",
			"/var/lib/dash",
			"--rpc-port",
			"20001",
		]);
		match args.daemon_mode() {
			DaemonMode::External { datadir, .. } => {
				assert_eq!(datadir, Some(PathBuf::from("/var/lib/dash")))
			}
			DaemonMode::Managed(_) => panic!("expected an external daemon"),
		}
	}
}
