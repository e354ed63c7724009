//! Transaction injector.
//!
//! Each call builds at most one payment from a random tier wallet to random pool addresses.
//! Every outcome, including daemon failures, is returned as an [`InjectionOutcome`] so the
//! block loop is never interrupted by a single payment.

use super::config::InjectorPolicy;
use super::supply::UtxoSupplyEngine;
use super::GenerationContext;
use crate::rpc::{DaemonErrorKind, RpcGateway};
use crate::utils::round_to_8;

use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxShape {
	Simple,
	MultiOutput,
}

/// Why an injection produced no transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
	NoSourceWallet,
	NoDestinations,
	/// The source stayed below the spend floor after replenishment.
	Underfunded { balance: f64 },
	/// The per-output amount fell below the dust threshold.
	Dust { amount: f64 },
	/// The daemon refused the payment for funds or policy reasons.
	Rejected(DaemonErrorKind),
	/// Any other failure; already logged.
	Failed { kind: DaemonErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InjectionOutcome {
	Created {
		txid: String,
		shape: TxShape,
		outputs: usize,
		amount_per_output: f64,
	},
	Skipped(SkipReason),
}

impl InjectionOutcome {
	pub fn is_created(&self) -> bool {
		matches!(self, InjectionOutcome::Created { .. })
	}
}

/// Payment chosen for one injection, before submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPlan {
	pub shape: TxShape,
	pub outputs: Vec<(String, f64)>,
}

/// Amount for a single-destination payment: a share of the balance, capped by a random
/// absolute amount.
pub fn simple_amount<R: Rng + ?Sized>(policy: &InjectorPolicy, balance: f64, rng: &mut R) -> f64 {
	let (fraction_low, fraction_high) = policy.simple_fraction;
	let (cap_low, cap_high) = policy.simple_cap;
	let share = balance * rng.random_range(fraction_low..=fraction_high);
	round_to_8(share.min(rng.random_range(cap_low..=cap_high)))
}

/// Total and per-output amount for a payment split evenly over `num_outputs` destinations.
pub fn multi_output_amounts<R: Rng + ?Sized>(
	policy: &InjectorPolicy,
	balance: f64,
	num_outputs: usize,
	rng: &mut R,
) -> (f64, f64) {
	let (fraction_low, fraction_high) = policy.multi_output_fraction;
	let (cap_low, cap_high) = policy.multi_output_cap;
	let share = balance * rng.random_range(fraction_low..=fraction_high);
	let total = share.min(rng.random_range(cap_low..=cap_high));
	(total, round_to_8(total / num_outputs.max(1) as f64))
}

/// Pick the shape, destinations and amounts of one payment from a wallet holding `balance`.
pub fn plan_payment<R: Rng + ?Sized>(
	policy: &InjectorPolicy,
	balance: f64,
	address_pool: &[String],
	rng: &mut R,
) -> Result<PaymentPlan, SkipReason> {
	if rng.random::<f64>() < policy.multi_output_probability {
		let (min_outputs, max_outputs) = policy.multi_output_count;
		let wanted = rng.random_range(min_outputs..=max_outputs);
		let destinations: Vec<String> = address_pool
			.choose_multiple(rng, wanted)
			.cloned()
			.collect();
		if destinations.is_empty() {
			return Err(SkipReason::NoDestinations);
		}

		let (_, per_output) = multi_output_amounts(policy, balance, destinations.len(), rng);
		if per_output < policy.dust_threshold {
			return Err(SkipReason::Dust { amount: per_output });
		}
		Ok(PaymentPlan {
			shape: TxShape::MultiOutput,
			outputs: destinations
				.into_iter()
				.map(|address| (address, per_output))
				.collect(),
		})
	} else {
		let destination = address_pool
			.choose(rng)
			.cloned()
			.ok_or(SkipReason::NoDestinations)?;
		let amount = simple_amount(policy, balance, rng);
		if amount < policy.dust_threshold {
			return Err(SkipReason::Dust { amount });
		}
		Ok(PaymentPlan {
			shape: TxShape::Simple,
			outputs: vec![(destination, amount)],
		})
	}
}

pub struct TransactionInjector<'a> {
	rpc: &'a dyn RpcGateway,
	supply: &'a UtxoSupplyEngine<'a>,
}

impl<'a> TransactionInjector<'a> {
	pub fn new(rpc: &'a dyn RpcGateway, supply: &'a UtxoSupplyEngine<'a>) -> Self {
		Self { rpc, supply }
	}

	/// Build and submit at most one payment. Never fails; see [`InjectionOutcome`].
	pub async fn inject(&self, ctx: &mut GenerationContext) -> InjectionOutcome {
		let Some(source) = ctx
			.registry
			.random_wallet(&mut ctx.rng)
			.map(|w| w.name.clone())
		else {
			return InjectionOutcome::Skipped(SkipReason::NoSourceWallet);
		};

		let mut balance = match self.rpc.get_balance(&source).await {
			Ok(balance) => balance,
			Err(e) => return failed(&source, e.kind(), e.to_string()),
		};

		if balance < ctx.config.injector.operating_threshold {
			match self.supply.ensure_funded(ctx, &source).await {
				Ok(status) if status.is_ready() => balance = status.balance(),
				Ok(status) => {
					return InjectionOutcome::Skipped(SkipReason::Underfunded {
						balance: status.balance(),
					});
				}
				Err(e) => return failed(&source, e.kind(), e.to_string()),
			}
		}

		let plan = match plan_payment(
			&ctx.config.injector,
			balance,
			ctx.registry.address_pool(),
			&mut ctx.rng,
		) {
			Ok(plan) => plan,
			Err(reason) => return InjectionOutcome::Skipped(reason),
		};

		let submitted = match plan.shape {
			TxShape::Simple => {
				let (address, amount) = &plan.outputs[0];
				self.rpc.send_to_address(&source, address, *amount).await
			}
			TxShape::MultiOutput => {
				let outputs: BTreeMap<String, f64> = plan.outputs.iter().cloned().collect();
				self.rpc.send_many(&source, &outputs).await
			}
		};

		match submitted {
			Ok(txid) => {
				ctx.stats.transactions_created += 1;
				InjectionOutcome::Created {
					txid,
					shape: plan.shape,
					outputs: plan.outputs.len(),
					amount_per_output: plan.outputs[0].1,
				}
			}
			Err(e) if e.kind().is_spend_failure() => {
				debug!("{} payment from {} refused: {}", shape_name(plan.shape), source, e);
				InjectionOutcome::Skipped(SkipReason::Rejected(e.kind()))
			}
			Err(e) => failed(&source, e.kind(), e.to_string()),
		}
	}
}

fn shape_name(shape: TxShape) -> &'static str {
	match shape {
		TxShape::Simple => "simple",
		TxShape::MultiOutput => "multi-output",
	}
}

fn failed(source: &str, kind: DaemonErrorKind, message: String) -> InjectionOutcome {
	warn!(
		"Unexpected error creating transaction from {}: {:?}: {}",
		source, kind, message
	);
	InjectionOutcome::Skipped(SkipReason::Failed { kind, message })
}
