use super::GenerationConfig;
use crate::wallet::WalletRegistry;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Counters of one generation run. They only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
	pub blocks_generated: u64,
	pub transactions_created: u64,
	pub utxo_replenishments: u64,
	/// Injector invocations during block generation.
	pub tx_attempts: u64,
	/// Injector invocations that produced a transaction.
	pub tx_successes: u64,
}

impl GenerationStats {
	/// Share of injection attempts that produced a transaction, in percent.
	pub fn success_rate(&self) -> f64 {
		if self.tx_attempts == 0 {
			0.0
		} else {
			100.0 * self.tx_successes as f64 / self.tx_attempts as f64
		}
	}
}

/// Run phases, strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
	Init,
	Seeding,
	Funding,
	Generating,
	Exporting,
	Done,
}

impl Phase {
	pub fn next(self) -> Option<Phase> {
		match self {
			Phase::Init => Some(Phase::Seeding),
			Phase::Seeding => Some(Phase::Funding),
			Phase::Funding => Some(Phase::Generating),
			Phase::Generating => Some(Phase::Exporting),
			Phase::Exporting => Some(Phase::Done),
			Phase::Done => None,
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Phase::Init => "INIT",
			Phase::Seeding => "SEEDING",
			Phase::Funding => "FUNDING",
			Phase::Generating => "GENERATING",
			Phase::Exporting => "EXPORTING",
			Phase::Done => "DONE",
		};
		f.write_str(name)
	}
}

/// Everything a run mutates, passed explicitly through each phase.
pub struct GenerationContext {
	pub config: GenerationConfig,
	pub registry: WalletRegistry,
	pub stats: GenerationStats,
	pub rng: StdRng,
	phase: Phase,
}

impl GenerationContext {
	pub fn new(config: GenerationConfig, registry: WalletRegistry) -> Self {
		let rng = match config.seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_os_rng(),
		};
		Self {
			config,
			registry,
			stats: GenerationStats::default(),
			rng,
			phase: Phase::Init,
		}
	}

	#[cfg(test)]
	pub fn phase(&self) -> Phase {
		self.phase
	}

	/// Move forward to `target`. Going backwards or staying put is ignored, so phases stay
	/// linear even if a step is re-entered.
	pub fn advance_to(&mut self, target: Phase) {
		while self.phase < target {
			match self.phase.next() {
				Some(next) => self.phase = next,
				None => break,
			}
		}
		info!("Phase: {}", self.phase);
	}
}
