//! `dash-cli` backed RPC gateway.
//!
//! Every call spawns the CLI with the network, data dir, port and wallet flags, waits for it
//! under a timeout, classifies a non-zero exit through [`classify_daemon_error`], and decodes
//! stdout as JSON (falling back to a plain string for methods that print bare values such as
//! addresses and txids).

use super::retry::call_with_retry;
use super::{RetryPolicy, RpcError, RpcGateway, classify_daemon_error};

use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Gateway that shells out to `dash-cli` for every call.
#[derive(Debug, Clone)]
pub struct DashCliGateway {
	/// Path to the `dash-cli` executable.
	cli_path: PathBuf,
	/// Network flag passed as `-<network>`.
	network: String,
	/// Daemon data directory, if not the CLI default.
	datadir: Option<PathBuf>,
	/// RPC port, if not the network default.
	rpc_port: Option<u16>,
	/// Upper bound for one CLI round-trip.
	timeout: Duration,
	retry: RetryPolicy,
}

impl DashCliGateway {
	/// Create a regtest gateway using the CLI at `cli_path` with default timeout and retries.
	pub fn new(cli_path: impl Into<PathBuf>) -> Self {
		Self {
			cli_path: cli_path.into(),
			network: "regtest".to_string(),
			datadir: None,
			rpc_port: None,
			timeout: Duration::from_secs(30),
			retry: RetryPolicy::default(),
		}
	}

	pub fn with_datadir(mut self, datadir: Option<PathBuf>) -> Self {
		self.datadir = datadir;
		self
	}

	pub fn with_rpc_port(mut self, rpc_port: Option<u16>) -> Self {
		self.rpc_port = rpc_port;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	/// Full argument list for one invocation, excluding the program itself.
	fn command_args(&self, method: &str, params: &[Value], wallet: Option<&str>) -> Vec<String> {
		let mut args = vec![format!("-{}", self.network)];
		if let Some(datadir) = &self.datadir {
			args.push(format!("-datadir={}", datadir.display()));
		}
		if let Some(port) = self.rpc_port {
			args.push(format!("-rpcport={}", port));
		}
		if let Some(wallet) = wallet {
			args.push(format!("-rpcwallet={}", wallet));
		}
		args.push(method.to_string());
		args.extend(params.iter().map(render_param));
		args
	}

	/// Single attempt, no retries.
	async fn execute(
		&self,
		method: &str,
		params: &[Value],
		wallet: Option<&str>,
	) -> Result<Value, RpcError> {
		let args = self.command_args(method, params, wallet);
		debug!("dash-cli {}", args.join(" "));

		let mut command = Command::new(&self.cli_path);
		command.args(&args).stdin(Stdio::null()).kill_on_drop(true);

		let output = match tokio::time::timeout(self.timeout, command.output()).await {
			Ok(result) => result.map_err(|source| RpcError::Spawn {
				program: self.cli_path.display().to_string(),
				source,
			})?,
			Err(_) => {
				return Err(RpcError::Timeout {
					method: method.to_string(),
					timeout: self.timeout,
				});
			}
		};

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(RpcError::daemon(
				method,
				classify_daemon_error(&stderr),
				stderr.trim(),
			));
		}

		Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
	}
}

#[async_trait::async_trait]
impl RpcGateway for DashCliGateway {
	async fn call(
		&self,
		method: &str,
		params: &[Value],
		wallet: Option<&str>,
	) -> Result<Value, RpcError> {
		call_with_retry(&self.retry, method, || self.execute(method, params, wallet)).await
	}
}

/// Render one positional parameter the way `dash-cli` expects it on the command line.
fn render_param(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Bool(b) => b.to_string(),
		other => other.to_string(),
	}
}

/// Decode CLI stdout: JSON when it parses, otherwise the trimmed text.
fn parse_output(stdout: &str) -> Value {
	let trimmed = stdout.trim();
	if trimmed.is_empty() {
		return Value::Null;
	}
	serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
