//! Wallet registry: the faucet and tier wallets a run spends from and pays into.
//!
//! Wallets and their addresses are created once at setup through the RPC gateway and are
//! immutable afterwards; balances always come from the daemon.
/// Faucet and tier wallet setup at the daemon
pub mod provision;
pub mod types;

pub use provision::WalletProvisioner;
pub use types::*;
