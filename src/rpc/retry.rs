use super::RpcError;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder, backoff::Backoff, future::retry_notify};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently a gateway retries transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	/// Total attempts, including the first one.
	pub max_attempts: u32,
	/// Delay before the second attempt; doubles for every further attempt.
	pub base_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_secs(1),
		}
	}
}

impl RetryPolicy {
	/// One attempt, no retries. Used while polling a daemon that is still starting up.
	pub fn single_attempt() -> Self {
		Self {
			max_attempts: 1,
			base_delay: Duration::ZERO,
		}
	}

	fn backoff(&self) -> AttemptLimitedBackoff {
		let inner = ExponentialBackoffBuilder::new()
			.with_initial_interval(self.base_delay)
			.with_randomization_factor(0.0)
			.with_multiplier(2.0)
			.with_max_interval(Duration::from_secs(60))
			.with_max_elapsed_time(None)
			.build();
		let max_retries = self.max_attempts.saturating_sub(1);
		AttemptLimitedBackoff {
			inner,
			max_retries,
			retries_left: max_retries,
		}
	}
}

/// Exponential backoff that gives up after a fixed number of retries instead of a time budget.
struct AttemptLimitedBackoff {
	inner: ExponentialBackoff,
	max_retries: u32,
	retries_left: u32,
}

impl Backoff for AttemptLimitedBackoff {
	fn reset(&mut self) {
		self.inner.reset();
		self.retries_left = self.max_retries;
	}

	fn next_backoff(&mut self) -> Option<Duration> {
		if self.retries_left == 0 {
			return None;
		}
		self.retries_left -= 1;
		self.inner.next_backoff()
	}
}

/// Run `operation` until it succeeds, fails permanently, or the policy runs out of attempts.
///
/// Transient failures that survive every attempt are escalated to [`RpcError::Unreachable`].
pub(crate) async fn call_with_retry<F, Fut>(
	policy: &RetryPolicy,
	method: &str,
	mut operation: F,
) -> Result<Value, RpcError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<Value, RpcError>>,
{
	let mut attempts = 0u32;

	let result = retry_notify(
		policy.backoff(),
		|| {
			attempts += 1;
			let pending = operation();
			async move {
				pending.await.map_err(|e| {
					if e.is_transient() {
						backoff::Error::transient(e)
					} else {
						backoff::Error::permanent(e)
					}
				})
			}
		},
		|e: RpcError, wait: Duration| {
			warn!("{} failed transiently ({}), retrying in {:?}", method, e, wait);
		},
	)
	.await;

	match result {
		Ok(value) => Ok(value),
		Err(e) if e.is_transient() => Err(RpcError::Unreachable {
			method: method.to_string(),
			attempts,
			reason: e.to_string(),
		}),
		Err(e) => Err(e),
	}
}
