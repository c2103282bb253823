//! Exponential backoff after failed polls.

use std::time::Duration;

use crate::config::Config;
use crate::error::AdapterError;

/// Backoff parameters for one poller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay after the first failure in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on the delay in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor per additional consecutive failure.
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Create from config values.
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_delay_ms: config.backoff_base_ms,
            max_delay_ms: config.backoff_max_ms,
            ..Default::default()
        }
    }

    /// Delay after `failures` consecutive failures: `initial × multiplier^failures`, clamped.
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.min(63) as i32;
        let delay_ms = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let clamped_ms = delay_ms.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(clamped_ms)
    }

    /// Wait before the next poll.
    ///
    /// Never shorter than the regular `interval`; after a rate limit never
    /// shorter than the server's `retry_after` either.
    pub fn next_wait(&self, interval: Duration, failures: u32, error: Option<&AdapterError>) -> Duration {
        if failures == 0 {
            return interval;
        }

        let mut wait = interval.max(self.delay(failures));
        if let Some(AdapterError::RateLimited {
            retry_after: Some(retry_after),
        }) = error
        {
            wait = wait.max(*retry_after);
        }
        wait
    }
}
