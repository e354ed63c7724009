use crate::daemon::DaemonError;
use crate::export::ExportError;
use crate::generator::{ConfigError, DriverError, SupplyError};
use crate::rpc::RpcError;
use crate::wallet::ProvisionError;

use thiserror::Error;

/// Fatal failure of a generation run.
#[derive(Debug, Error)]
pub enum GeneratorError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Daemon(#[from] DaemonError),

	#[error("Cannot connect to dashd: {0}")]
	Unreachable(#[source] RpcError),

	#[error("Wallet provisioning failed: {0}")]
	Provision(#[from] ProvisionError),

	#[error(transparent)]
	Driver(#[from] DriverError),

	#[error("Export failed: {0}")]
	Export(#[from] ExportError),

	#[error(transparent)]
	Rpc(#[from] RpcError),

	#[error("Interrupted")]
	Interrupted,
}

impl GeneratorError {
	/// Process exit status for this failure category.
	pub fn exit_code(&self) -> i32 {
		if matches!(self, GeneratorError::Interrupted) {
			130
		} else if self.is_configuration() {
			1
		} else if self.is_connection_failure() {
			2
		} else if self.is_insufficient_funds() {
			3
		} else {
			4
		}
	}

	fn is_configuration(&self) -> bool {
		match self {
			GeneratorError::Config(_) => true,
			GeneratorError::Daemon(e) => e.is_configuration(),
			_ => false,
		}
	}

	fn is_connection_failure(&self) -> bool {
		match self {
			GeneratorError::Daemon(_) | GeneratorError::Unreachable(_) => true,
			GeneratorError::Provision(e) => e.is_connection_failure(),
			GeneratorError::Driver(DriverError::Rpc(e))
			| GeneratorError::Driver(DriverError::Supply(SupplyError::Rpc(e)))
			| GeneratorError::Export(ExportError::Rpc(e))
			| GeneratorError::Rpc(e) => e.is_connection_failure(),
			_ => false,
		}
	}

	fn is_insufficient_funds(&self) -> bool {
		match self {
			GeneratorError::Driver(DriverError::Supply(e)) => {
				matches!(e, SupplyError::SeedingInsufficientFunds { .. })
					|| matches!(e, SupplyError::Rpc(rpc) if rpc.is_insufficient_funds())
			}
			GeneratorError::Driver(DriverError::Rpc(e)) | GeneratorError::Rpc(e) => {
				e.is_insufficient_funds()
			}
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rpc::DaemonErrorKind;

	fn unreachable() -> RpcError {
		RpcError::Unreachable {
			method: "getblockcount".to_string(),
			attempts: 3,
			reason: "Could not connect to the server".to_string(),
		}
	}

	#[test]
	fn exit_codes_per_category() {
		assert_eq!(GeneratorError::from(ConfigError::ZeroTargetHeight).exit_code(), 1);
		assert_eq!(
			GeneratorError::from(DaemonError::ExecutableNotUsable {
				path: "dashd".to_string(),
				reason: "not found".to_string(),
			})
			.exit_code(),
			1
		);
		assert_eq!(GeneratorError::from(DaemonError::PortUnavailable(19998)).exit_code(), 2);
		assert_eq!(GeneratorError::Unreachable(unreachable()).exit_code(), 2);
		assert_eq!(
			GeneratorError::from(DriverError::Rpc(unreachable())).exit_code(),
			2
		);
		assert_eq!(
			GeneratorError::from(DriverError::Supply(SupplyError::SeedingInsufficientFunds {
				wallet: "default".to_string(),
				blocks: 400,
			}))
			.exit_code(),
			3
		);
		assert_eq!(
			GeneratorError::from(DriverError::Rpc(RpcError::daemon(
				"generatetoaddress",
				DaemonErrorKind::Other,
				"boom"
			)))
			.exit_code(),
			4
		);
		assert_eq!(GeneratorError::Interrupted.exit_code(), 130);
	}
}
