use std::time::Duration;
use thiserror::Error;

// JSON-RPC error codes shared by the bitcoind family of daemons.
const RPC_TYPE_ERROR: i64 = -3;
const RPC_WALLET_ERROR: i64 = -4;
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;
const RPC_WALLET_INSUFFICIENT_FUNDS: i64 = -6;
const RPC_INVALID_PARAMETER: i64 = -8;
const RPC_WALLET_NOT_FOUND: i64 = -18;
const RPC_VERIFY_REJECTED: i64 = -26;
const RPC_IN_WARMUP: i64 = -28;
const RPC_WALLET_ALREADY_LOADED: i64 = -35;

/// Closed classification of the failures the daemon reports on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonErrorKind {
	/// The CLI could not open a connection to the daemon.
	ConnectionRefused,
	/// The daemon is up but still loading its block index or wallets.
	WarmingUp,
	/// No answer within the configured timeout.
	Timeout,
	/// The wallet cannot cover the requested amount plus fee.
	InsufficientFunds,
	WalletAlreadyExists,
	WalletAlreadyLoaded,
	WalletNotFound,
	/// Malformed address, amount or parameter.
	InvalidArguments,
	/// The transaction was built but refused by mempool policy.
	TransactionRejected,
	Other,
}

impl DaemonErrorKind {
	/// Failures worth retrying with backoff.
	pub fn is_transient(self) -> bool {
		matches!(
			self,
			DaemonErrorKind::ConnectionRefused
				| DaemonErrorKind::WarmingUp
				| DaemonErrorKind::Timeout
		)
	}

	/// Failures expected while building payments: not enough funds, fee or dust policy,
	/// amounts the daemon refuses.
	pub fn is_spend_failure(self) -> bool {
		matches!(
			self,
			DaemonErrorKind::InsufficientFunds
				| DaemonErrorKind::TransactionRejected
				| DaemonErrorKind::InvalidArguments
		)
	}
}

/// Map the stderr text of a failed CLI invocation onto a [`DaemonErrorKind`].
///
/// This is the only place that inspects daemon error text. The numeric error code is
/// preferred; message fragments are used when the code is ambiguous (`-4` covers most wallet
/// failures) or absent (connection errors are reported by the CLI itself).
pub fn classify_daemon_error(stderr: &str) -> DaemonErrorKind {
	let lower = stderr.to_lowercase();

	if lower.contains("could not connect") || lower.contains("connection refused") {
		return DaemonErrorKind::ConnectionRefused;
	}

	match parse_error_code(&lower) {
		Some(RPC_WALLET_INSUFFICIENT_FUNDS) => return DaemonErrorKind::InsufficientFunds,
		Some(RPC_IN_WARMUP) => return DaemonErrorKind::WarmingUp,
		Some(RPC_WALLET_ALREADY_LOADED) => return DaemonErrorKind::WalletAlreadyLoaded,
		Some(RPC_WALLET_NOT_FOUND) => return DaemonErrorKind::WalletNotFound,
		Some(RPC_VERIFY_REJECTED) => return DaemonErrorKind::TransactionRejected,
		Some(RPC_TYPE_ERROR | RPC_INVALID_ADDRESS_OR_KEY | RPC_INVALID_PARAMETER) => {
			return DaemonErrorKind::InvalidArguments;
		}
		Some(RPC_WALLET_ERROR) | Some(_) | None => {}
	}

	if lower.contains("insufficient funds") {
		DaemonErrorKind::InsufficientFunds
	} else if lower.contains("already loaded") {
		DaemonErrorKind::WalletAlreadyLoaded
	} else if lower.contains("already exists") {
		DaemonErrorKind::WalletAlreadyExists
	} else if lower.contains("wallet")
		&& (lower.contains("not found") || lower.contains("does not exist"))
	{
		DaemonErrorKind::WalletNotFound
	} else if lower.contains("loading") || lower.contains("verifying blocks") {
		DaemonErrorKind::WarmingUp
	} else {
		DaemonErrorKind::Other
	}
}

/// Extract `N` from the `error code: N` line `dash-cli` prints.
fn parse_error_code(lower: &str) -> Option<i64> {
	let rest = lower.split("error code:").nth(1)?;
	let token = rest.split_whitespace().next()?;
	token.parse().ok()
}

/// Failures returned by an [`RpcGateway`](super::RpcGateway).
#[derive(Debug, Error)]
pub enum RpcError {
	#[error("{method} failed ({kind:?}): {message}")]
	Daemon {
		method: String,
		kind: DaemonErrorKind,
		message: String,
	},

	#[error("{method} timed out after {}s", .timeout.as_secs())]
	Timeout { method: String, timeout: Duration },

	#[error("cannot reach daemon for {method} after {attempts} attempt(s): {reason}")]
	Unreachable {
		method: String,
		attempts: u32,
		reason: String,
	},

	#[error("failed to launch {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("unexpected response to {method}: {source}")]
	Decode {
		method: String,
		#[source]
		source: serde_json::Error,
	},
}

impl RpcError {
	pub fn daemon(method: &str, kind: DaemonErrorKind, message: impl Into<String>) -> Self {
		RpcError::Daemon {
			method: method.to_string(),
			kind,
			message: message.into(),
		}
	}

	pub fn kind(&self) -> DaemonErrorKind {
		match self {
			RpcError::Daemon { kind, .. } => *kind,
			RpcError::Timeout { .. } => DaemonErrorKind::Timeout,
			RpcError::Unreachable { .. } => DaemonErrorKind::ConnectionRefused,
			RpcError::Spawn { .. } | RpcError::Decode { .. } => DaemonErrorKind::Other,
		}
	}

	/// True while the failure may still clear up on retry. An [`RpcError::Unreachable`] has
	/// already exhausted its retries and is final.
	pub fn is_transient(&self) -> bool {
		!matches!(self, RpcError::Unreachable { .. }) && self.kind().is_transient()
	}

	/// True when the daemon could not be reached at all.
	pub fn is_connection_failure(&self) -> bool {
		matches!(self, RpcError::Unreachable { .. }) || self.kind().is_transient()
	}

	pub fn is_insufficient_funds(&self) -> bool {
		self.kind() == DaemonErrorKind::InsufficientFunds
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_insufficient_funds_by_code() {
		let stderr = "error code: -6\nerror message:\nInsufficient funds";
		assert_eq!(
			classify_daemon_error(stderr),
			DaemonErrorKind::InsufficientFunds
		);
	}

	#[test]
	fn classifies_insufficient_funds_reported_as_wallet_error() {
		let stderr = "error code: -4\nerror message:\nInsufficient funds";
		assert_eq!(
			classify_daemon_error(stderr),
			DaemonErrorKind::InsufficientFunds
		);
	}

	#[test]
	fn classifies_warmup() {
		let stderr = "error code: -28\nerror message:\nLoading block index...";
		assert_eq!(classify_daemon_error(stderr), DaemonErrorKind::WarmingUp);
		assert!(DaemonErrorKind::WarmingUp.is_transient());
	}

	#[test]
	fn classifies_connection_refused() {
		let stderr = "error: Could not connect to the server 127.0.0.1:19998\n\nMake sure the dashd server is running";
		assert_eq!(
			classify_daemon_error(stderr),
			DaemonErrorKind::ConnectionRefused
		);
		assert_eq!(
			classify_daemon_error("connect failed: Connection refused"),
			DaemonErrorKind::ConnectionRefused
		);
	}

	#[test]
	fn classifies_wallet_lifecycle_errors() {
		assert_eq!(
			classify_daemon_error(
				"error code: -35\nerror message:\nWallet file verification failed. Refusing to load database. Data file is already loaded"
			),
			DaemonErrorKind::WalletAlreadyLoaded
		);
		assert_eq!(
			classify_daemon_error(
				"error code: -4\nerror message:\nWallet file verification failed. Failed to create database path '/tmp/x/regtest/light'. Database already exists."
			),
			DaemonErrorKind::WalletAlreadyExists
		);
		assert_eq!(
			classify_daemon_error(
				"error code: -18\nerror message:\nWallet file verification failed. Failed to load database path '/tmp/x/regtest/default'. Path does not exist."
			),
			DaemonErrorKind::WalletNotFound
		);
		assert_eq!(
			classify_daemon_error("error message:\nRequested wallet does not exist or is not loaded"),
			DaemonErrorKind::WalletNotFound
		);
	}

	#[test]
	fn classifies_argument_and_policy_errors() {
		assert_eq!(
			classify_daemon_error("error code: -5\nerror message:\nInvalid Dash address: xyz"),
			DaemonErrorKind::InvalidArguments
		);
		assert_eq!(
			classify_daemon_error("error code: -3\nerror message:\nAmount out of range"),
			DaemonErrorKind::InvalidArguments
		);
		assert_eq!(
			classify_daemon_error("error code: -8\nerror message:\nInvalid parameter, duplicated address"),
			DaemonErrorKind::InvalidArguments
		);
		assert_eq!(
			classify_daemon_error("error code: -26\nerror message:\nmin relay fee not met"),
			DaemonErrorKind::TransactionRejected
		);
	}

	#[test]
	fn unknown_failures_are_other() {
		assert_eq!(
			classify_daemon_error("error code: -32601\nerror message:\nMethod not found"),
			DaemonErrorKind::Other
		);
		assert_eq!(classify_daemon_error(""), DaemonErrorKind::Other);
	}

	#[test]
	fn unreachable_is_final_but_counts_as_connection_failure() {
		let err = RpcError::Unreachable {
			method: "getblockcount".to_string(),
			attempts: 3,
			reason: "refused".to_string(),
		};
		assert!(!err.is_transient());
		assert!(err.is_connection_failure());

		let timeout = RpcError::Timeout {
			method: "getblockcount".to_string(),
			timeout: Duration::from_secs(30),
		};
		assert!(timeout.is_transient());
	}
}
