//! # HurriAid Configuration System
//!
//! Every timeout, retry count, cooldown, and concurrency bound used by the
//! orchestration core is configuration, never a hard-coded constant, so test
//! suites can shrink them to a few milliseconds.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hurriaid_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Defaults, then config/hurriaid.yaml, then config/hurriaid.<env>.yaml,
//! // then HURRIAID__SECTION__KEY environment overrides
//! let manager = ConfigManager::load()?;
//! let policy = manager.config().retry.to_policy();
//! println!("per-call timeout: {:?}", policy.per_call_timeout);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{env, timing_keys};
use crate::resilience::{BackendId, CircuitBreakerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Semaphore;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring hurriaid.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HurriaidConfig {
    /// Per-call retry, backoff, and timeout settings
    pub retry: RetryConfig,

    /// Process-wide circuit breaker settings
    pub circuit_breaker: CircuitBreakerSettings,

    /// Fan-out concurrency bound
    pub scheduler: SchedulerConfig,

    /// Stage failure policy and timing key names
    pub orchestration: OrchestrationSettings,

    /// Credential and backend candidate order
    pub inference: InferenceConfig,
}

impl HurriaidConfig {
    /// Validate every section, reporting the first violation
    pub fn validate(&self) -> ConfigResult<()> {
        self.retry.validate()?;
        self.circuit_breaker.to_breaker_config().validate()?;
        self.scheduler.validate()?;
        self.orchestration.validate()?;
        self.inference.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per backend candidate, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound of the uniform jitter added to each backoff delay
    pub jitter_max_ms: u64,
    /// Hard deadline for a single attempt
    pub per_call_timeout_ms: u64,
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_max: Duration::from_millis(self.jitter_max_ms),
            per_call_timeout: Duration::from_millis(self.per_call_timeout_ms),
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        self.to_policy().validate()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 800,
            max_delay_ms: 6_000,
            jitter_max_ms: 350,
            per_call_timeout_ms: 25_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub enabled: bool,
    pub base_cooldown_ms: u64,
    pub max_cooldown_ms: u64,
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: self.enabled,
            base_cooldown: Duration::from_millis(self.base_cooldown_ms),
            max_cooldown: Duration::from_millis(self.max_cooldown_ms),
        }
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_cooldown_ms: 5_000,
            max_cooldown_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum jobs in flight; `None` means `max(2, job count)`
    pub max_concurrency: Option<usize>,
}

impl SchedulerConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.max_concurrency {
            Some(0) => Err(ConfigurationError::invalid_value(
                "scheduler.max_concurrency",
                0,
                "must be greater than 0 when set",
            )),
            Some(limit) if limit > Semaphore::MAX_PERMITS => {
                Err(ConfigurationError::invalid_value(
                    "scheduler.max_concurrency",
                    limit,
                    format!("must not exceed {}", Semaphore::MAX_PERMITS),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestrationSettings {
    /// Skip the fan-out stage whenever the context stage fails, not only on
    /// configuration errors
    pub fatal_on_stage_failure: bool,
    pub stage_timing_key: String,
    pub fanout_timing_key: String,
}

impl OrchestrationSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.stage_timing_key.is_empty() || self.fanout_timing_key.is_empty() {
            return Err(ConfigurationError::validation(
                "timing keys must not be empty",
            ));
        }
        if self.stage_timing_key == self.fanout_timing_key
            || self.stage_timing_key == timing_keys::TOTAL
            || self.fanout_timing_key == timing_keys::TOTAL
        {
            return Err(ConfigurationError::validation(
                "stage, fan-out, and total timing keys must be distinct",
            ));
        }
        Ok(())
    }
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            fatal_on_stage_failure: false,
            stage_timing_key: timing_keys::STAGE.to_string(),
            fanout_timing_key: timing_keys::FANOUT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Name of the environment variable that must hold the service credential
    pub api_key_env: String,
    /// Backend candidates in priority order
    pub backends: Vec<BackendId>,
}

impl InferenceConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.api_key_env.trim().is_empty() {
            return Err(ConfigurationError::validation(
                "inference.api_key_env must name an environment variable",
            ));
        }
        if self.backends.is_empty() {
            return Err(ConfigurationError::validation(
                "inference.backends must list at least one candidate",
            ));
        }
        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.id.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "inference.backends",
                    &backend.id,
                    "duplicate backend id",
                ));
            }
        }
        Ok(())
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key_env: env::DEFAULT_API_KEY.to_string(),
            backends: vec![
                BackendId::new("gemini-2.0-flash", "gemini-flash"),
                BackendId::new("gemini-1.5-flash", "gemini-flash-legacy"),
            ],
        }
    }
}
