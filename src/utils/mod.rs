//! Utility module for the fixture generator.
//!
//! Re-exports amount and duration helpers used by the engine, the exporter and the summary.
/// Amount and duration formatting
pub mod format;

pub use format::{format_coins, format_duration, round_to_8};
