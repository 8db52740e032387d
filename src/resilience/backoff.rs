//! # Retry Policy
//!
//! Per-candidate retry budget, hard per-attempt deadline, and jittered
//! exponential backoff: the delay after the attempt at `index` (0-based) is
//! `min(max_delay, base_delay * 2^index)` plus uniform jitter in
//! `[0, jitter_max)`.

use crate::config::{ConfigResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per backend candidate, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_max: Duration,
    /// Deadline for a single attempt
    pub per_call_timeout: Duration,
}

impl RetryPolicy {
    /// Backoff before jitter for the retry following attempt `attempt_index`
    pub fn base_delay_for(&self, attempt_index: u32) -> Duration {
        1u32.checked_shl(attempt_index)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Backoff with jitter for the retry following attempt `attempt_index`
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.base_delay_for(attempt_index) + self.jitter_max.mul_f64(fastrand::f64())
    }

    /// Validate policy parameters
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                self.max_attempts,
                "must be at least 1",
            ));
        }

        if self.per_call_timeout.is_zero() {
            return Err(ConfigurationError::validation(
                "retry.per_call_timeout must be greater than 0",
            ));
        }

        if self.base_delay > self.max_delay {
            return Err(ConfigurationError::validation(
                "retry.base_delay must not exceed retry.max_delay",
            ));
        }

        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(6),
            jitter_max: Duration::from_millis(350),
            per_call_timeout: Duration::from_secs(25),
        }
    }
}
