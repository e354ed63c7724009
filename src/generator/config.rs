use crate::wallet::Tier;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Invalid transaction density: {0}")]
	InvalidDensity(String),

	#[error("Target block height must be greater than zero")]
	ZeroTargetHeight,

	#[error("Target UTXO count must be greater than zero")]
	ZeroUtxoTarget,

	#[error("Invalid policy for {tier} wallets: {reason}")]
	InvalidTier { tier: Tier, reason: String },
}

/// Named transaction density levels selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DensityPreset {
	/// 90% empty blocks
	Minimal,
	/// 60% empty blocks
	Light,
	/// 30% empty blocks
	Normal,
	/// 10% empty blocks
	Heavy,
}

/// Cumulative cut points partitioning per-block transaction counts into the bands
/// {0}, {1-3}, {4-10} and {11-25}.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TxDensity {
	pub none: f64,
	pub low: f64,
	pub medium: f64,
}

impl TxDensity {
	pub fn preset(preset: DensityPreset) -> Self {
		let (none, low, medium) = match preset {
			DensityPreset::Minimal => (0.90, 0.98, 1.0),
			DensityPreset::Light => (0.60, 0.90, 0.98),
			DensityPreset::Normal => (0.30, 0.70, 0.90),
			DensityPreset::Heavy => (0.10, 0.40, 0.70),
		};
		Self { none, low, medium }
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		let in_unit = |p: f64| (0.0..=1.0).contains(&p);
		if !(in_unit(self.none) && in_unit(self.low) && in_unit(self.medium)) {
			return Err(ConfigError::InvalidDensity(format!(
				"cut points must lie in [0, 1], got {:?}",
				self
			)));
		}
		if !(self.none <= self.low && self.low <= self.medium) {
			return Err(ConfigError::InvalidDensity(format!(
				"cut points must be ordered none <= low <= medium, got {:?}",
				self
			)));
		}
		Ok(())
	}

	/// Draw the number of transactions to inject before the next block.
	pub fn sample_count<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
		let roll: f64 = rng.random();
		if roll < self.none {
			0
		} else if roll < self.low {
			rng.random_range(1..=3)
		} else if roll < self.medium {
			rng.random_range(4..=10)
		} else {
			rng.random_range(11..=25)
		}
	}
}

impl Default for TxDensity {
	fn default() -> Self {
		Self::preset(DensityPreset::Normal)
	}
}

/// Funding rules for one wallet tier.
#[derive(Debug, Clone, Serialize)]
pub struct TierPolicy {
	pub tier: Tier,
	pub address_count: usize,
	/// Faucet payments made during the funding phase.
	pub initial_transfers: usize,
	/// Size of a single replenishment payment.
	pub refund_amount: f64,
	/// Balance below which the wallet is replenished.
	pub min_balance: f64,
}

impl TierPolicy {
	pub fn defaults_for(tier: Tier) -> Self {
		let (address_count, initial_transfers, refund_amount) = match tier {
			Tier::Light => (20, 20, 20.0),
			Tier::Normal => (60, 40, 40.0),
			Tier::Heavy | Tier::Faucet => (120, 60, 60.0),
		};
		Self {
			tier,
			address_count,
			initial_transfers,
			refund_amount,
			min_balance: 10.0,
		}
	}
}

/// Parameters of the UTXO supply engine.
#[derive(Debug, Clone, Serialize)]
pub struct SupplyPolicy {
	/// Blocks mined to the faucet before anything else.
	pub initial_blocks: u64,
	/// Coinbase maturity window.
	pub maturity_blocks: u64,
	/// Extra blocks so splitting and funding do not drain the faucet.
	pub buffer_blocks: u64,
	pub split_max_iterations: u32,
	pub split_batch_size: usize,
	pub split_output_amount: f64,
	/// Faucet balance below which splitting stops.
	pub split_balance_floor: f64,
	pub funding_amount_range: (f64, f64),
	/// Balance a wallet needs after replenishment to be usable.
	pub spend_floor: f64,
}

impl Default for SupplyPolicy {
	fn default() -> Self {
		Self {
			initial_blocks: 200,
			maturity_blocks: 100,
			buffer_blocks: 100,
			split_max_iterations: 10,
			split_batch_size: 50,
			split_output_amount: 1.0,
			split_balance_floor: 10.0,
			funding_amount_range: (0.1, 5.0),
			spend_floor: 1.0,
		}
	}
}

/// Shape parameters of injected transactions.
#[derive(Debug, Clone, Serialize)]
pub struct InjectorPolicy {
	/// Source balance below which replenishment is attempted first.
	pub operating_threshold: f64,
	pub multi_output_probability: f64,
	pub multi_output_count: (usize, usize),
	/// Fraction of the source balance a multi-output transaction moves.
	pub multi_output_fraction: (f64, f64),
	/// Absolute cap drawn per multi-output transaction.
	pub multi_output_cap: (f64, f64),
	pub simple_fraction: (f64, f64),
	pub simple_cap: (f64, f64),
	pub dust_threshold: f64,
}

impl Default for InjectorPolicy {
	fn default() -> Self {
		Self {
			operating_threshold: 10.0,
			multi_output_probability: 0.4,
			multi_output_count: (2, 5),
			multi_output_fraction: (0.2, 0.5),
			multi_output_cap: (5.0, 15.0),
			simple_fraction: (0.1, 0.5),
			simple_cap: (1.0, 5.0),
			dust_threshold: 0.01,
		}
	}
}

/// Immutable parameters of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
	pub target_height: u64,
	pub target_utxo_count: usize,
	/// Reported only; splitting is driven by `target_utxo_count`.
	pub min_utxo_threshold: usize,
	pub faucet_wallet: String,
	pub density_preset: Option<DensityPreset>,
	pub density: TxDensity,
	pub tiers: Vec<TierPolicy>,
	pub supply: SupplyPolicy,
	pub injector: InjectorPolicy,
	/// Blocks between progress reports.
	pub report_interval: u64,
	/// RNG seed; random when absent.
	pub seed: Option<u64>,
}

impl Default for GenerationConfig {
	fn default() -> Self {
		Self {
			target_height: 100,
			target_utxo_count: 200,
			min_utxo_threshold: 150,
			faucet_wallet: "default".to_string(),
			density_preset: Some(DensityPreset::Normal),
			density: TxDensity::default(),
			tiers: Tier::GENERATION
				.into_iter()
				.map(TierPolicy::defaults_for)
				.collect(),
			supply: SupplyPolicy::default(),
			injector: InjectorPolicy::default(),
			report_interval: 100,
			seed: None,
		}
	}
}

impl GenerationConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.target_height == 0 {
			return Err(ConfigError::ZeroTargetHeight);
		}
		if self.target_utxo_count == 0 {
			return Err(ConfigError::ZeroUtxoTarget);
		}
		self.density.validate()?;

		for policy in &self.tiers {
			if policy.address_count == 0 {
				return Err(ConfigError::InvalidTier {
					tier: policy.tier,
					reason: "needs at least one address".to_string(),
				});
			}
			if policy.refund_amount <= 0.0 || policy.min_balance < 0.0 {
				return Err(ConfigError::InvalidTier {
					tier: policy.tier,
					reason: "refund amount and minimum balance must be positive".to_string(),
				});
			}
		}
		Ok(())
	}

	/// Policy for `tier`, falling back to the built-in defaults.
	pub fn tier_policy(&self, tier: Tier) -> TierPolicy {
		self.tiers
			.iter()
			.find(|p| p.tier == tier)
			.cloned()
			.unwrap_or_else(|| TierPolicy::defaults_for(tier))
	}

	/// `(tier, address_count)` pairs in provisioning order.
	pub fn provisioning_plan(&self) -> Vec<(Tier, usize)> {
		self.tiers.iter().map(|p| (p.tier, p.address_count)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	#[test]
	fn presets_are_valid() {
		for preset in [
			DensityPreset::Minimal,
			DensityPreset::Light,
			DensityPreset::Normal,
			DensityPreset::Heavy,
		] {
			assert!(TxDensity::preset(preset).validate().is_ok());
		}
		assert!(GenerationConfig::default().validate().is_ok());
	}

	#[test]
	fn rejects_unordered_or_out_of_range_density() {
		let unordered = TxDensity {
			none: 0.5,
			low: 0.4,
			medium: 0.9,
		};
		assert!(matches!(
			unordered.validate(),
			Err(ConfigError::InvalidDensity(_))
		));

		let out_of_range = TxDensity {
			none: 0.1,
			low: 0.4,
			medium: 1.5,
		};
		assert!(out_of_range.validate().is_err());
	}

	#[test]
	fn rejects_zero_targets() {
		let config = GenerationConfig {
			target_height: 0,
			..Default::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::ZeroTargetHeight)));

		let config = GenerationConfig {
			target_utxo_count: 0,
			..Default::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::ZeroUtxoTarget)));
	}

	#[test]
	fn density_sampler_converges_to_cut_points() {
		let density = TxDensity::preset(DensityPreset::Normal);
		let mut rng = StdRng::seed_from_u64(42);
		let trials = 100_000;
		let mut bands = [0usize; 4];

		for _ in 0..trials {
			match density.sample_count(&mut rng) {
				0 => bands[0] += 1,
				1..=3 => bands[1] += 1,
				4..=10 => bands[2] += 1,
				11..=25 => bands[3] += 1,
				other => panic!("count {} outside every band", other),
			}
		}

		let fraction = |n: usize| n as f64 / trials as f64;
		let expected = [
			density.none,
			density.low - density.none,
			density.medium - density.low,
			1.0 - density.medium,
		];
		for (observed, expected) in bands.iter().zip(expected) {
			assert!(
				(fraction(*observed) - expected).abs() < 0.01,
				"observed {} expected {}",
				fraction(*observed),
				expected
			);
		}
	}

	#[test]
	fn minimal_preset_never_reaches_high_band() {
		let density = TxDensity::preset(DensityPreset::Minimal);
		let mut rng = StdRng::seed_from_u64(1);
		assert!((0..10_000).all(|_| density.sample_count(&mut rng) <= 10));
	}

	#[test]
	fn tier_defaults_match_funding_table() {
		let config = GenerationConfig::default();
		assert_eq!(
			config.provisioning_plan(),
			vec![(Tier::Light, 20), (Tier::Normal, 60), (Tier::Heavy, 120)]
		);
		let normal = config.tier_policy(Tier::Normal);
		assert_eq!(normal.initial_transfers, 40);
		assert_eq!(normal.refund_amount, 40.0);
		assert_eq!(normal.min_balance, 10.0);
	}
}
