//! RPC gateway to the regtest daemon.
//!
//! The gateway sends one named method with JSON arguments to the daemon and returns the
//! decoded JSON result. Everything the generator knows about the daemon goes through the
//! [`RpcGateway`] trait, so the engine can run against `dash-cli` in production and against
//! an in-process simulation in tests.

/// `dash-cli` backed gateway
mod client;
/// Error taxonomy and daemon error classification
mod error;
/// Typed wrappers for the daemon methods the generator uses
mod methods;
/// Bounded exponential retry for transient failures
mod retry;
/// Response types shared with the exporter
mod types;

#[cfg(test)]
pub mod mock;

pub use client::DashCliGateway;
pub use error::{DaemonErrorKind, RpcError, classify_daemon_error};
pub use retry::RetryPolicy;
pub use types::*;

use serde_json::Value;

/// Transport-level access to the daemon.
///
/// Implementations must not retry permanent failures; transient ones (connection refused,
/// timeout, daemon still loading) may be retried internally before being escalated to
/// [`RpcError::Unreachable`].
#[async_trait::async_trait]
pub trait RpcGateway: Send + Sync {
	/// Invoke `method` with positional `params`, optionally scoped to `wallet`.
	async fn call(
		&self,
		method: &str,
		params: &[Value],
		wallet: Option<&str>,
	) -> Result<Value, RpcError>;
}
