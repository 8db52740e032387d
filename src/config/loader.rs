//! Configuration Loader
//!
//! Environment-aware layered loading built on the `config` crate:
//! compiled-in defaults, then `hurriaid.yaml`, then `hurriaid.<env>.yaml`, then
//! `HURRIAID__SECTION__KEY` environment variables. Missing files are fine;
//! invalid values are not.

use super::error::{ConfigResult, ConfigurationError};
use super::HurriaidConfig;
use crate::constants::env;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "hurriaid";

/// Loaded, validated configuration plus the environment it was resolved for
#[derive(Debug)]
pub struct ConfigManager {
    config: HurriaidConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for tests that must not touch process-wide variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            max_attempts = config.retry.max_attempts,
            per_call_timeout_ms = config.retry.per_call_timeout_ms,
            breaker_enabled = config.circuit_breaker.enabled,
            backends = config.inference.backends.len(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: HurriaidConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &HurriaidConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Current environment from HURRIAID_ENV, then APP_ENV, default development
    pub fn detect_environment() -> String {
        std::env::var(env::ENVIRONMENT)
            .or_else(|_| std::env::var(env::ENVIRONMENT_FALLBACK))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        std::env::var(env::CONFIG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn build(directory: &Path, environment: &str) -> ConfigResult<HurriaidConfig> {
        let load_error = |error: config::ConfigError| ConfigurationError::LoadError {
            environment: environment.to_string(),
            error: error.to_string(),
        };

        let defaults = Config::try_from(&HurriaidConfig::default()).map_err(load_error)?;
        let base = directory.join(BASE_FILE_STEM);
        let overlay = directory.join(format!("{BASE_FILE_STEM}.{environment}"));

        Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&base.to_string_lossy()).required(false))
            .add_source(File::with_name(&overlay.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(env::OVERRIDE_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(load_error)?
            .try_deserialize::<HurriaidConfig>()
            .map_err(load_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().retry.max_attempts, 3);
        assert_eq!(manager.config().inference.backends.len(), 2);
    }

    #[test]
    fn test_environment_overlay_wins_over_base_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("hurriaid.yaml"),
            "retry:\n  max_attempts: 4\n  per_call_timeout_ms: 1000\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("hurriaid.test.yaml"),
            "retry:\n  per_call_timeout_ms: 5\nscheduler:\n  max_concurrency: 3\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let config = manager.config();

        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.per_call_timeout_ms, 5);
        assert_eq!(config.retry.base_delay_ms, 800);
        assert_eq!(config.scheduler.max_concurrency, Some(3));
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("hurriaid.yaml"),
            "circuit_breaker:\n  base_cooldown_ms: 0\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_prebuilt_config_is_validated() {
        let mut config = HurriaidConfig::default();
        config.scheduler.max_concurrency = Some(2);
        let manager = ConfigManager::from_config(config, "staging").unwrap();
        assert_eq!(manager.environment(), "staging");
        assert_eq!(manager.config().scheduler.max_concurrency, Some(2));

        let mut invalid = HurriaidConfig::default();
        invalid.retry.max_attempts = 0;
        assert!(ConfigManager::from_config(invalid, "staging").is_err());
    }
}
