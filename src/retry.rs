//! Retry with exponential backoff for flaky external calls.
//!
//! The policy is a plain value object so retry behavior is unit-testable
//! without timing a real clock; components receive it by injection instead
//! of wrapping themselves in a decorator.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Backoff multiplier applied per attempt.
    pub multiplier: u32,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    pub fn from_config(cfg: &crate::config::RetryConfig) -> Self {
        Self::new(cfg.max_attempts, cfg.base_delay(), cfg.max_delay())
    }

    /// Delay before retry number `attempt` (1-based: first retry is 1).
    /// Pure so tests can assert the schedule directly.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }

    /// Run an async operation under this policy, sleeping with a small
    /// random jitter between attempts. Returns the last error once the
    /// attempt budget is exhausted.
    pub async fn run<F, Fut, T, E>(&self, operation_name: &str, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    let delay = jittered(self.delay_for_attempt(attempt));
                    debug!(
                        "{} attempt {}/{} failed, retrying in {:?}: {}",
                        operation_name, attempt, self.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        "{} failed after {} attempts: {}",
                        operation_name, attempt, e
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Add up to 20% random jitter so concurrent callers do not retry in lockstep.
fn jittered(delay: Duration) -> Duration {
    let jitter_ms = (delay.as_millis() as u64) / 5;
    if jitter_ms == 0 {
        return delay;
    }
    let extra = rand::thread_rng().gen_range(0..=jitter_ms);
    delay + Duration::from_millis(extra)
}
