//! Bounded retry with exponential backoff
//!
//! Used at every network call site (committee, ledger, content store). The
//! caller gets the last error once the attempt budget is spent.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

/// Attempt budget and backoff curve for one call site
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after each failed attempt
    pub multiplier: f64,
    /// Upper bound on a single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay_ms: u64, multiplier: f64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            multiplier,
            max_delay_ms,
        }
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, 0, 1.0, 0)
    }

    /// Committee proof submission: 2 attempts, 1s initial delay, 30s cap
    pub fn committee_submit() -> Self {
        Self::new(2, 1_000, 2.0, 30_000)
    }

    /// Supplementary proof submission: one more attempt than a plain submit
    pub fn committee_supplementary() -> Self {
        Self::new(3, 1_000, 2.0, 30_000)
    }

    /// Ledger and content store calls
    pub fn network_default() -> Self {
        Self::new(3, 500, 2.0, 10_000)
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::network_default()
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up
///
/// Backoff sleeps are scheduled (`tokio::time::sleep`), never busy waits.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff_if(operation_name, policy, operation, |_| true).await
}

/// Like `retry_with_backoff`, but errors for which `is_retryable` returns
/// false are returned immediately
pub async fn retry_with_backoff_if<F, Fut, T, E, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let start_time = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Operation failed with permanent error"
                    );
                    return Err(err);
                }
                if attempt >= max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        error = %err,
                        "Operation failed: attempts exhausted"
                    );
                    return Err(err);
                }

                let backoff = policy.delay_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis(),
                    error = %err,
                    "Operation failed, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
