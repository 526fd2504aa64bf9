//! Backoff policy for the connection retry loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of connection attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay between attempts.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(3);

/// Default cap for exponential backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How the wait grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base` after every attempt
    Fixed,
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * 2^(attempt - 1)`, capped at `max_backoff`
    Exponential,
}

/// Maps a 1-based attempt number to the wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub strategy: BackoffStrategy,
    pub base: Duration,
    pub max_backoff: Duration,
    /// Hard cap on connection attempts.
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// Linear policy with the given base and attempt cap.
    pub fn linear(base: Duration, max_retries: u32) -> Self {
        Self {
            strategy: BackoffStrategy::Linear,
            base,
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_retries,
        }
    }

    /// Wait after the `attempt`-th failed attempt (attempts are 1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.strategy {
            BackoffStrategy::Fixed => self.base,
            BackoffStrategy::Linear => self.base.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.base.saturating_mul(factor).min(self.max_backoff)
            }
        }
    }

    /// Whether another attempt may follow the `attempt`-th one.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Sum of all waits when every attempt fails.
    pub fn total_budget(&self) -> Duration {
        (1..=self.max_retries)
            .map(|attempt| self.delay(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for BackoffPolicy {
    /// Default: 5 attempts, linear backoff, 3s base.
    fn default() -> Self {
        Self::linear(DEFAULT_BASE_BACKOFF, DEFAULT_MAX_RETRIES)
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
