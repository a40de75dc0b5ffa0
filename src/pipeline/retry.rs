//! Exponential backoff for timed-out geocoding requests.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::error::GeocodeError;

/// Configuration for the retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_tries: u32,
    /// Give up once this much time has passed since the first attempt.
    pub max_elapsed: Duration,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Caps exponential growth.
    pub max_backoff: Duration,
    /// Pick each delay uniformly from `[0, delay]`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: 10,
            max_elapsed: Duration::from_secs(120),
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter: true,
        }
    }
}

/// Emitted before every sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffEvent {
    /// The attempt that just failed (1-based).
    pub attempt: u32,
    pub delay: Duration,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Un-jittered delay after the `attempt`-th failure.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_backoff)
            .min(self.config.max_backoff)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let capped = self.base_delay_for(attempt);
        if !self.config.jitter || capped.is_zero() {
            return capped;
        }
        let ms = capped.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=ms))
    }

    /// Runs `op` until it succeeds, fails with something other than a timeout, or the
    /// attempt/time budget runs out. `op` receives the 1-based attempt number.
    ///
    /// On exhaustion the last timeout is returned.
    pub async fn run<T, F, Fut, O>(&self, mut op: F, mut on_backoff: O) -> Result<T, GeocodeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GeocodeError>>,
        O: FnMut(&BackoffEvent),
    {
        let start = Instant::now();
        let max_tries = self.config.max_tries.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_timeout() => return Err(err),
                Err(err) => err,
            };

            let elapsed = start.elapsed();
            if attempt >= max_tries || elapsed >= self.config.max_elapsed {
                return Err(err);
            }

            let remaining = self.config.max_elapsed - elapsed;
            let delay = self.delay_for(attempt).min(remaining);
            on_backoff(&BackoffEvent {
                attempt,
                delay,
                elapsed,
            });
            tokio::time::sleep(delay).await;
        }
    }
}
