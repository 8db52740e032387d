//! Configuration Error Types
//!
//! Errors raised while loading, validating, or applying configuration.
//! A missing credential is also a configuration error: it cannot be fixed by
//! retrying, so the orchestrator treats it as fatal for the request.

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Required credential is absent from the environment
    #[error("required credential '{variable}' is not set in the environment")]
    MissingCredential { variable: String },

    /// A configured backend candidate has no registered implementation
    #[error("backend '{id}' is configured but not registered")]
    UnknownBackend { id: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Configuration validation errors
    #[error("Configuration validation failed: {error}")]
    ValidationError { error: String },

    /// Layered source could not be read or deserialized
    #[error("Failed to load configuration for '{environment}': {error}")]
    LoadError { environment: String, error: String },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    pub fn validation(error: impl Into<String>) -> Self {
        Self::ValidationError {
            error: error.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
