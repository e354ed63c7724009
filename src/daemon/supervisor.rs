use crate::rpc::{DashCliGateway, RetryPolicy, RpcGateway};

use std::net::{Ipv4Addr, TcpListener};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// First RPC port tried when none is requested.
pub const DEFAULT_RPC_PORT: u16 = 19998;
const PORT_SEARCH_ATTEMPTS: u16 = 20;

#[derive(Debug, Error)]
pub enum DaemonError {
	#[error("dashd executable not found or not runnable: {path} ({reason})")]
	ExecutableNotUsable { path: String, reason: String },

	#[error("Requested RPC port {0} is not available")]
	PortUnavailable(u16),

	#[error("No free port found in range {start}-{end}")]
	NoFreePort { start: u16, end: u16 },

	#[error("Failed to create temporary directory: {0}")]
	TempDir(#[source] std::io::Error),

	#[error("Failed to execute dashd: {0}")]
	Spawn(#[source] std::io::Error),

	#[error("dashd exited during startup ({0})")]
	ExitedEarly(String),

	#[error("dashd failed to start within {}s; last error: {last_error}", .timeout.as_secs())]
	StartupTimeout {
		timeout: Duration,
		last_error: String,
	},

	#[error("Failed to stop dashd: {0}")]
	Stop(#[source] std::io::Error),
}

impl DaemonError {
	/// The executable itself is unusable, as opposed to a runtime startup problem.
	pub fn is_configuration(&self) -> bool {
		matches!(self, DaemonError::ExecutableNotUsable { .. })
	}
}

/// How to launch and talk to a local regtest daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
	pub dashd_path: PathBuf,
	pub dashcli_path: PathBuf,
	/// Fixed RPC port; the first free port from [`DEFAULT_RPC_PORT`] otherwise.
	pub rpc_port: Option<u16>,
	/// Leave the data directory on disk after the run.
	pub keep_temp: bool,
	/// Per-call timeout of the RPC gateway.
	pub rpc_timeout: Duration,
	pub startup_timeout: Duration,
	pub poll_interval: Duration,
	pub stop_timeout: Duration,
}

impl Default for DaemonConfig {
	fn default() -> Self {
		Self {
			dashd_path: PathBuf::from("dashd"),
			dashcli_path: PathBuf::from("dash-cli"),
			rpc_port: None,
			keep_temp: false,
			rpc_timeout: Duration::from_secs(30),
			startup_timeout: Duration::from_secs(30),
			poll_interval: Duration::from_millis(500),
			stop_timeout: Duration::from_secs(10),
		}
	}
}

/// Run `<dashd> --version` and return its first output line.
pub async fn verify_executable(path: &Path) -> Result<String, DaemonError> {
	let not_usable = |reason: String| DaemonError::ExecutableNotUsable {
		path: path.display().to_string(),
		reason,
	};

	let mut command = Command::new(path);
	command
		.arg("--version")
		.stdin(Stdio::null())
		.kill_on_drop(true);

	let output = tokio::time::timeout(Duration::from_secs(5), command.output())
		.await
		.map_err(|_| not_usable("--version timed out".to_string()))?
		.map_err(|e| not_usable(e.to_string()))?;

	if !output.status.success() {
		return Err(not_usable(format!("--version exited with {}", output.status)));
	}

	let stdout = String::from_utf8_lossy(&output.stdout);
	Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

pub fn is_port_available(port: u16) -> bool {
	TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// First bindable port in `start..start + attempts`.
pub fn find_free_port(start: u16, attempts: u16) -> Result<u16, DaemonError> {
	let end = start.saturating_add(attempts.saturating_sub(1));
	(start..=end)
		.find(|&port| is_port_available(port))
		.ok_or(DaemonError::NoFreePort { start, end })
}

/// Command line of a foreground regtest daemon bound to localhost.
fn daemon_args(data_dir: &Path, p2p_port: u16, rpc_port: u16) -> Vec<String> {
	vec![
		"-regtest".to_string(),
		format!("-datadir={}", data_dir.display()),
		format!("-port={}", p2p_port),
		format!("-rpcport={}", rpc_port),
		"-server=1".to_string(),
		"-daemon=0".to_string(),
		"-fallbackfee=0.00001".to_string(),
		"-rpcbind=127.0.0.1".to_string(),
		"-rpcallowip=127.0.0.1".to_string(),
		"-listen=1".to_string(),
		"-txindex=0".to_string(),
		"-addressindex=0".to_string(),
		"-spentindex=0".to_string(),
		"-timestampindex=0".to_string(),
	]
}

pub struct DaemonSupervisor {
	config: DaemonConfig,
}

impl DaemonSupervisor {
	pub fn new(config: DaemonConfig) -> Self {
		Self { config }
	}

	/// Launch dashd in a fresh temporary directory and wait until it answers RPC calls.
	pub async fn start(&self) -> Result<DaemonHandle, DaemonError> {
		let version = verify_executable(&self.config.dashd_path).await?;
		info!("Starting dashd ({})", version);

		let rpc_port = match self.config.rpc_port {
			Some(port) if is_port_available(port) => port,
			Some(port) => return Err(DaemonError::PortUnavailable(port)),
			None => find_free_port(DEFAULT_RPC_PORT, PORT_SEARCH_ATTEMPTS)?,
		};
		let p2p_port = find_free_port(rpc_port.saturating_add(1), PORT_SEARCH_ATTEMPTS)?;

		let temp_dir = tempfile::Builder::new()
			.prefix("dash-testdata-")
			.tempdir()
			.map_err(DaemonError::TempDir)?;
		std::fs::create_dir_all(temp_dir.path().join("regtest")).map_err(DaemonError::TempDir)?;

		info!("Using temporary directory: {}", temp_dir.path().display());
		info!("RPC port: {}, P2P port: {}", rpc_port, p2p_port);

		let child = Command::new(&self.config.dashd_path)
			.args(daemon_args(temp_dir.path(), p2p_port, rpc_port))
			.current_dir(temp_dir.path())
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(DaemonError::Spawn)?;

		let gateway = DashCliGateway::new(&self.config.dashcli_path)
			.with_datadir(Some(temp_dir.path().to_path_buf()))
			.with_rpc_port(Some(rpc_port))
			.with_timeout(self.config.rpc_timeout);

		let data_dir = if self.config.keep_temp {
			DataDir::Kept(temp_dir.keep())
		} else {
			DataDir::Temporary(temp_dir)
		};

		let mut handle = DaemonHandle {
			child: Some(child),
			gateway,
			rpc_port,
			p2p_port,
			data_dir,
			stop_timeout: self.config.stop_timeout,
		};

		info!(
			"Waiting for dashd to be ready (PID: {})",
			handle.pid().unwrap_or_default()
		);
		let height = handle
			.wait_until_ready(self.config.startup_timeout, self.config.poll_interval)
			.await?;
		info!(
			"dashd started successfully (height {}, RPC port {}, P2P port {})",
			height,
			handle.rpc_port(),
			handle.p2p_port()
		);

		Ok(handle)
	}
}

enum DataDir {
	/// Removed when dropped.
	Temporary(TempDir),
	Kept(PathBuf),
}

impl DataDir {
	fn path(&self) -> &Path {
		match self {
			DataDir::Temporary(dir) => dir.path(),
			DataDir::Kept(path) => path,
		}
	}
}

/// A running daemon and its working directory.
///
/// Dropping the handle kills a still-running process and removes the directory unless it was
/// created with `keep_temp`.
pub struct DaemonHandle {
	child: Option<Child>,
	gateway: DashCliGateway,
	rpc_port: u16,
	p2p_port: u16,
	data_dir: DataDir,
	stop_timeout: Duration,
}

impl DaemonHandle {
	/// Gateway bound to this daemon's data dir and RPC port.
	pub fn gateway(&self) -> &DashCliGateway {
		&self.gateway
	}

	pub fn rpc_port(&self) -> u16 {
		self.rpc_port
	}

	pub fn p2p_port(&self) -> u16 {
		self.p2p_port
	}

	pub fn data_dir(&self) -> &Path {
		self.data_dir.path()
	}

	fn pid(&self) -> Option<u32> {
		self.child.as_ref().and_then(Child::id)
	}

	async fn wait_until_ready(
		&mut self,
		timeout: Duration,
		poll_interval: Duration,
	) -> Result<u64, DaemonError> {
		let readiness = self
			.gateway
			.clone()
			.with_retry_policy(RetryPolicy::single_attempt());
		let rpc: &dyn RpcGateway = &readiness;
		let deadline = Instant::now() + timeout;

		loop {
			if let Some(child) = self.child.as_mut() {
				if let Some(status) = child.try_wait().map_err(DaemonError::Spawn)? {
					self.child = None;
					return Err(DaemonError::ExitedEarly(status.to_string()));
				}
			}

			let last_error = match rpc.get_block_count().await {
				Ok(height) => return Ok(height),
				Err(e) => {
					debug!("dashd not ready yet: {}", e);
					e.to_string()
				}
			};

			if Instant::now() >= deadline {
				self.shutdown().await?;
				return Err(DaemonError::StartupTimeout {
					timeout,
					last_error,
				});
			}
			tokio::time::sleep(poll_interval).await;
		}
	}

	/// Ask the daemon to stop, then kill it if it has not exited within the stop timeout.
	/// The data directory stays in place until the handle is dropped.
	pub async fn shutdown(&mut self) -> Result<(), DaemonError> {
		let Some(mut child) = self.child.take() else {
			return Ok(());
		};
		info!("Stopping dashd");

		let stopper = self
			.gateway
			.clone()
			.with_retry_policy(RetryPolicy::single_attempt());
		let rpc: &dyn RpcGateway = &stopper;
		if let Err(e) = rpc.stop().await {
			debug!("stop RPC failed: {}", e);
		}

		match tokio::time::timeout(self.stop_timeout, child.wait()).await {
			Ok(Ok(status)) => debug!("dashd exited with {}", status),
			Ok(Err(e)) => warn!("Error waiting for dashd: {}", e),
			Err(_) => {
				warn!("dashd didn't stop gracefully, forcing");
				child.kill().await.map_err(DaemonError::Stop)?;
			}
		}
		Ok(())
	}
}

impl Drop for DaemonHandle {
	fn drop(&mut self) {
		if let Some(child) = self.child.as_mut() {
			if let Err(e) = child.start_kill() {
				warn!("Failed to kill dashd: {}", e);
			}
		}
		match &self.data_dir {
			DataDir::Temporary(dir) => {
				info!("Cleaning up temporary directory: {}", dir.path().display())
			}
			DataDir::Kept(path) => info!("Keeping temporary directory: {}", path.display()),
		}
	}
}
