//! Regtest chain generation.
//!
//! A run seeds the faucet's UTXO pool, funds the tier wallets, then mines block by block to the
//! target height while injecting randomized wallet-to-wallet payments into each block.

/// Run parameters and their validation
pub mod config;
/// Mutable run state and phases
pub mod context;
/// Phase sequencing and the block loop
pub mod driver;
/// Randomized payment creation
pub mod injector;
/// End-to-end run: daemon, provisioning, generation, export
pub mod orchestrator;
/// Throughput and ETA reporting
pub mod progress;
/// Faucet seeding, pool splitting and wallet refunds
pub mod supply;

pub use config::{ConfigError, DensityPreset, GenerationConfig, TxDensity};
pub use context::{GenerationContext, GenerationStats, Phase};
pub use driver::DriverError;
pub use orchestrator::{DaemonMode, Generator};
pub use supply::SupplyError;
