//! Retry with exponential backoff
//!
//! Generic wrapper used by every network-sensitive operation. Attempts run
//! strictly sequentially; the delay starts at `initial_delay`, is multiplied
//! by `backoff_multiplier` after each failed attempt and capped at
//! `max_delay`. After exhausting the attempts the final error is re-raised
//! untouched so callers can still branch on its concrete kind.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::time::sleep;

/// Backoff policy. A parameter of each call site, never a global.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Page navigation: fail fast, the per-question recovery path handles
    /// the rest.
    pub fn navigation() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }

    /// Image download default.
    pub fn download() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Sleep before retrying after the given 1-based failed attempt.
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(ms as u64).min(self.max_delay)
    }
}

/// Run `operation` up to `policy.max_attempts` times.
///
/// `on_failure(error, attempt)` is invoked before each backoff sleep, for
/// observability only.
pub async fn with_retry<T, F, Fut, C>(
    mut operation: F,
    policy: &RetryPolicy,
    mut on_failure: C,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: FnMut(&anyhow::Error, u32),
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                on_failure(&e, attempt);
                last_error = Some(e);
                if attempt < policy.max_attempts {
                    sleep(policy.delay_for_attempt(attempt)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("retry policy allows no attempts")))
}
