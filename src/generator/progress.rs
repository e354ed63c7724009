//! Progress tracking for block generation.
//!
//! `GenerationProgress` counts the blocks mined in the generating phase and turns that count,
//! together with the run's injection counters, into throughput, ETA and success-ratio reports
//! at a fixed block interval.

use super::GenerationStats;
use crate::utils::format_duration;

use std::time::{Duration, Instant};
use tracing::info;

/// Tracks the block loop of one run.
#[derive(Debug, Clone)]
pub struct GenerationProgress {
	started: Instant,
	/// Blocks this loop has to mine.
	blocks_planned: u64,
	blocks_done: u64,
	target_height: u64,
	/// Blocks between reports
	interval: u64,
}

impl GenerationProgress {
	pub fn new(blocks_planned: u64, target_height: u64, interval: u64) -> Self {
		Self {
			started: Instant::now(),
			blocks_planned,
			blocks_done: 0,
			target_height,
			interval: interval.max(1),
		}
	}

	/// Record a mined block; true when a report is due.
	pub fn record_block(&mut self) -> bool {
		self.blocks_done += 1;
		self.blocks_done % self.interval == 0
	}

	pub fn blocks_done(&self) -> u64 {
		self.blocks_done
	}

	/// Snapshot of the loop after `elapsed`; transaction counts come from `stats`.
	pub fn snapshot(
		&self,
		height: u64,
		elapsed: Duration,
		stats: &GenerationStats,
	) -> ProgressSnapshot {
		let secs = elapsed.as_secs_f64();
		let rate = if secs > 0.0 {
			self.blocks_done as f64 / secs
		} else {
			0.0
		};
		let remaining = self.blocks_planned.saturating_sub(self.blocks_done);
		let eta = if rate > 0.0 {
			Duration::from_secs_f64(remaining as f64 / rate)
		} else {
			Duration::ZERO
		};
		ProgressSnapshot {
			height,
			target_height: self.target_height,
			rate,
			eta,
			tx_attempts: stats.tx_attempts,
			tx_successes: stats.tx_successes,
		}
	}

	/// Log a report for the current chain height.
	pub fn log_progress(&self, height: u64, stats: &GenerationStats) {
		info!(
			"{}",
			self.snapshot(height, self.started.elapsed(), stats).summary()
		);
	}

	pub fn elapsed(&self) -> Duration {
		self.started.elapsed()
	}
}

/// Point-in-time view of generation progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
	pub height: u64,
	pub target_height: u64,
	/// Blocks per second since the loop started.
	pub rate: f64,
	pub eta: Duration,
	pub tx_attempts: u64,
	pub tx_successes: u64,
}

impl ProgressSnapshot {
	pub fn summary(&self) -> String {
		format!(
			"Height {}/{} ({:.1} blocks/sec, ETA: {}) [Tx: {}/{} successful]",
			self.height,
			self.target_height,
			self.rate,
			format_duration(self.eta),
			self.tx_successes,
			self.tx_attempts
		)
	}
}
