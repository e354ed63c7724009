//! Lifecycle of a throwaway regtest daemon: executable check, port selection, temporary data
//! directory, readiness polling and graceful shutdown.

mod supervisor;

pub use supervisor::{DaemonConfig, DaemonError, DaemonHandle, DaemonSupervisor};
