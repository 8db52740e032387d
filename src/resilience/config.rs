//! # Circuit Breaker Configuration
//!
//! Cooldown settings for the process-wide circuit breaker. The cooldown window
//! grows linearly with the consecutive transient failure count and is capped;
//! it is independent of the per-call retry backoff.

use crate::config::{ConfigResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every backend class tracked by one breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// When false, `allow` always returns true (state is still tracked)
    pub enabled: bool,

    /// Cooldown added per consecutive transient failure
    pub base_cooldown: Duration,

    /// Upper bound of the cooldown window
    pub max_cooldown: Duration,
}

impl CircuitBreakerConfig {
    /// Cooldown window after `consecutive_failures` transient failures
    pub fn cooldown_for(&self, consecutive_failures: u32) -> Duration {
        self.base_cooldown
            .checked_mul(consecutive_failures)
            .map_or(self.max_cooldown, |window| window.min(self.max_cooldown))
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_cooldown.is_zero() {
            return Err(ConfigurationError::validation(
                "circuit_breaker.base_cooldown must be greater than 0",
            ));
        }

        if self.max_cooldown < self.base_cooldown {
            return Err(ConfigurationError::validation(
                "circuit_breaker.max_cooldown must not be smaller than base_cooldown",
            ));
        }

        if self.max_cooldown > Duration::from_secs(300) {
            return Err(ConfigurationError::validation(
                "circuit_breaker.max_cooldown should not exceed 300 seconds",
            ));
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_cooldown: Duration::from_secs(5),
            max_cooldown: Duration::from_secs(30),
        }
    }
}
