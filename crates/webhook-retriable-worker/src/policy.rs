//! Retry timing.

use chathook_config_and_utils::{RelayConfig, RetryStrategy};
use std::time::Duration;

/// Attempt budget and delay formula captured from one config snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per record, first try included.
    pub max_attempts: u32,
    pub strategy: RetryStrategy,
    pub base_delay: Duration,
    /// Cap for exponential delays.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            strategy: config.retry_strategy,
            base_delay: config.retry_delay(),
            max_delay: config.max_retry_delay(),
        }
    }

    /// Delay between failed attempt `failed_attempt` (1-based) and the next one.
    ///
    /// | Failed attempt | Fixed | Exponential      |
    /// |----------------|-------|------------------|
    /// | 1              | base  | base             |
    /// | 2              | base  | base * 2         |
    /// | 3              | base  | base * 4         |
    /// | n              | base  | min(base * 2^(n-1), max) |
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        if failed_attempt == 0 {
            return Duration::ZERO;
        }

        match self.strategy {
            RetryStrategy::Fixed => self.base_delay,
            RetryStrategy::Exponential => {
                let base_ms = self.base_delay.as_millis() as u64;
                let max_ms = self.max_delay.as_millis() as u64;
                let multiplier = 1u64.checked_shl(failed_attempt - 1).unwrap_or(u64::MAX);
                Duration::from_millis(base_ms.saturating_mul(multiplier).min(max_ms))
            }
        }
    }

    /// Whether another attempt may follow `attempted` finished attempts.
    pub fn has_attempts_left(&self, attempted: u32) -> bool {
        attempted < self.max_attempts
    }
}
