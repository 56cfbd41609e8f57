//! Blocking retry with exponential backoff, gated by a circuit breaker

use anyhow::{anyhow, Result};
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Backoff before retry number `attempt` (1-based): base, 2x base, 4x base...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or the retries run out
///
/// The breaker sees one success or one failure per call, not per attempt.
/// An open breaker rejects the call without running `operation`.
pub fn execute_with_retry<T, F>(
    policy: &RetryPolicy,
    breaker: &mut CircuitBreaker,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    if !breaker.can_attempt() {
        return Err(anyhow!(
            "Circuit breaker for {} is open, rejecting request",
            breaker.name()
        ));
    }

    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            debug!(source = breaker.name(), "Retrying after {}ms", delay.as_millis());
            sleep(delay);
        }

        match operation() {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    source = breaker.name(),
                    "Request failed (attempt {}/{}): {:#}",
                    attempt + 1,
                    policy.max_retries + 1,
                    e
                );
                last_error = Some(e);
            }
        }
    }

    breaker.record_failure();
    Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
}
