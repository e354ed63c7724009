//! Block driver.
//!
//! Walks a run through seeding, funding and block generation. The generating loop mines
//! exactly `target_height - current_height` blocks; before each one it injects a sampled number
//! of transactions so they all confirm together.

use super::injector::TransactionInjector;
use super::progress::GenerationProgress;
use super::supply::{SupplyError, UtxoSupplyEngine};
use super::{GenerationContext, Phase};
use crate::rpc::{RpcError, RpcGateway};
use crate::utils::{format_coins, format_duration};

use itertools::Itertools;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DriverError {
	#[error(transparent)]
	Supply(#[from] SupplyError),

	#[error(transparent)]
	Rpc(#[from] RpcError),

	#[error("No addresses to mine blocks to")]
	EmptyAddressPool,
}

pub struct BlockDriver<'a> {
	rpc: &'a dyn RpcGateway,
	supply: &'a UtxoSupplyEngine<'a>,
	injector: TransactionInjector<'a>,
}

impl<'a> BlockDriver<'a> {
	pub fn new(rpc: &'a dyn RpcGateway, supply: &'a UtxoSupplyEngine<'a>) -> Self {
		Self {
			rpc,
			supply,
			injector: TransactionInjector::new(rpc, supply),
		}
	}

	/// Seed, fund and generate up to the target height.
	pub async fn run(&self, ctx: &mut GenerationContext) -> Result<u64, DriverError> {
		self.seed(ctx).await?;
		self.fund(ctx).await?;
		self.generate(ctx).await
	}

	pub async fn seed(&self, ctx: &mut GenerationContext) -> Result<usize, DriverError> {
		ctx.advance_to(Phase::Seeding);
		Ok(self.supply.seed_initial_pool(ctx).await?)
	}

	/// Fund every tier wallet from the faucet with its initial transfers.
	pub async fn fund(&self, ctx: &mut GenerationContext) -> Result<(), DriverError> {
		ctx.advance_to(Phase::Funding);

		let plan: Vec<(String, usize)> = ctx
			.registry
			.wallets()
			.iter()
			.map(|w| (w.name.clone(), ctx.config.tier_policy(w.tier).initial_transfers))
			.collect();

		for (name, transfers) in &plan {
			let report = self.supply.fund_wallet(ctx, name, *transfers).await?;
			if report.transfers_failed > 0 {
				warn!(
					"{}: {} of {} funding transfers failed",
					name,
					report.transfers_failed,
					transfers
				);
			}
		}

		info!(
			"All wallets funded: {}",
			plan.iter().map(|(name, _)| name).join(", ")
		);
		Ok(())
	}

	/// Mine blocks until the chain reaches the target height; returns the blocks mined.
	pub async fn generate(&self, ctx: &mut GenerationContext) -> Result<u64, DriverError> {
		ctx.advance_to(Phase::Generating);

		let current_height = self.rpc.get_block_count().await?;
		let target_height = ctx.config.target_height;
		if current_height >= target_height {
			info!(
				"Already at or past target height ({} >= {})",
				current_height, target_height
			);
			return Ok(0);
		}

		let blocks_to_generate = target_height - current_height;
		info!(
			"Generating {} blocks to reach height {} (current height {})",
			blocks_to_generate, target_height, current_height
		);

		let mut progress =
			GenerationProgress::new(blocks_to_generate, target_height, ctx.config.report_interval);

		for _ in 0..blocks_to_generate {
			let tx_count = ctx.config.density.sample_count(&mut ctx.rng);
			for _ in 0..tx_count {
				let created = self.injector.inject(ctx).await.is_created();
				ctx.stats.tx_attempts += 1;
				if created {
					ctx.stats.tx_successes += 1;
				}
			}

			let address = ctx
				.registry
				.random_pool_address(&mut ctx.rng)
				.ok_or(DriverError::EmptyAddressPool)?
				.to_string();
			self.rpc.generate_to_address(1, &address).await?;
			ctx.stats.blocks_generated += 1;

			if progress.record_block() {
				let height = self.rpc.get_block_count().await?;
				progress.log_progress(height, &ctx.stats);
			}
		}

		info!(
			"Generated {} blocks in {}",
			progress.blocks_done(),
			format_duration(progress.elapsed())
		);
		info!(
			"Transaction success rate: {}/{} ({:.1}%)",
			ctx.stats.tx_successes,
			ctx.stats.tx_attempts,
			ctx.stats.success_rate()
		);

		let final_height = self.rpc.get_block_count().await?;
		if final_height != target_height {
			warn!(
				"Final height ({}) differs from target ({})",
				final_height, target_height
			);
		}

		if let Ok(balance) = self.rpc.get_balance(&ctx.config.faucet_wallet).await {
			info!("Faucet balance: {}", format_coins(balance));
		}

		Ok(progress.blocks_done())
	}
}
