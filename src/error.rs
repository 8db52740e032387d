//! # Error Taxonomy
//!
//! Structured errors for every layer of a request:
//!
//! - [`CallError`]: what a single backend invocation reports. This is the
//!   explicit transient / non-transient boundary consumed by the circuit breaker.
//! - [`ResilienceError`]: what one logical resilient call reports after retries
//!   and backend fallback.
//! - [`StageError`]: what the sequential context stage reports. Only
//!   [`StageError::Configuration`] is fatal to the whole request.
//! - [`TaskError`]: what a fan-out job reports. Always recovered locally by the
//!   scheduler.
//!
//! Every variant maps to a short, stable classification string via `kind()`;
//! that string is what callers see in `OrchestrationResult::errors`.

use crate::config::ConfigurationError;
use crate::constants::error_kinds;
use std::time::Duration;
use thiserror::Error;

/// Outcome of one failed backend invocation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// Overload or availability signal from the service
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The invocation exceeded its deadline; remote outcome unknown
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed input or invalid credentials; waiting will not help
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The service answered but the response did not have the expected shape
    #[error("unparseable response: {0}")]
    Parse(String),
}

impl CallError {
    /// Whether retrying later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, CallError::Unavailable(_) | CallError::Timeout(_))
    }
}

/// Failure of one logical resilient call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResilienceError {
    #[error("backend '{backend}' timed out after {timeout:?}")]
    Timeout { backend: String, timeout: Duration },

    #[error("backend '{backend}' unavailable: {reason}")]
    TransientUnavailable { backend: String, reason: String },

    #[error("backend '{backend}' rejected the request: {reason}")]
    NonTransient { backend: String, reason: String },

    #[error("backend '{backend}' returned an unparseable response: {reason}")]
    ParseFailure { backend: String, reason: String },

    #[error("all backends exhausted after {attempts} attempts, last error: {last}")]
    AllBackendsExhausted {
        attempts: usize,
        last: Box<ResilienceError>,
    },

    #[error("no backend candidates supplied")]
    NoCandidates,
}

impl ResilienceError {
    /// Attribute a backend-level failure to the backend that produced it
    pub fn from_call(backend: &str, error: CallError) -> Self {
        let backend = backend.to_string();
        match error {
            CallError::Unavailable(reason) => Self::TransientUnavailable { backend, reason },
            CallError::Timeout(timeout) => Self::Timeout { backend, timeout },
            CallError::Rejected(reason) => Self::NonTransient { backend, reason },
            CallError::Parse(reason) => Self::ParseFailure { backend, reason },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::TransientUnavailable { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => error_kinds::TIMEOUT,
            Self::TransientUnavailable { .. } => error_kinds::TRANSIENT_UNAVAILABLE,
            Self::NonTransient { .. } => error_kinds::NON_TRANSIENT,
            Self::ParseFailure { .. } => error_kinds::PARSE_FAILURE,
            Self::AllBackendsExhausted { .. } => error_kinds::ALL_BACKENDS_EXHAUSTED,
            Self::NoCandidates => error_kinds::NO_CANDIDATES,
        }
    }
}

/// Failure of the sequential context-building stage
#[derive(Debug, Error)]
pub enum StageError {
    /// Missing credential or configuration; aborts the request
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The request input cannot be turned into a context
    #[error("invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Call(#[from] ResilienceError),
}

impl StageError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StageError::Configuration(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Configuration(_) => error_kinds::CONFIGURATION,
            StageError::Input(_) => error_kinds::INPUT,
            StageError::Call(e) => e.kind(),
        }
    }
}

/// Failure of one fan-out job
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Call(#[from] ResilienceError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The shared context lacks something this task needs
    #[error("invalid input: {0}")]
    Input(String),

    #[error("payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("task panicked: {0}")]
    Panic(String),

    #[error("task aborted: {0}")]
    Aborted(String),
}

impl TaskError {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Call(e) => e.kind(),
            TaskError::Configuration(_) => error_kinds::CONFIGURATION,
            TaskError::Input(_) => error_kinds::INPUT,
            TaskError::Payload(_) => error_kinds::PAYLOAD_ENCODING,
            TaskError::Panic(_) => error_kinds::PANIC,
            TaskError::Aborted(_) => error_kinds::ABORTED,
        }
    }
}

/// Crate-wide error for callers who want a single type
#[derive(Debug, Error)]
pub enum HurriaidError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

pub type Result<T> = std::result::Result<T, HurriaidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_transience() {
        assert!(CallError::Unavailable("503".into()).is_transient());
        assert!(CallError::Timeout(Duration::from_millis(5)).is_transient());
        assert!(!CallError::Rejected("bad key".into()).is_transient());
        assert!(!CallError::Parse("not json".into()).is_transient());
    }

    #[test]
    fn test_resilience_error_kinds() {
        let timeout = ResilienceError::from_call("primary", CallError::Timeout(Duration::ZERO));
        assert_eq!(timeout.kind(), "Timeout");
        assert!(timeout.is_transient());

        let rejected = ResilienceError::from_call("primary", CallError::Rejected("401".into()));
        assert_eq!(rejected.kind(), "NonTransient");
        assert!(!rejected.is_transient());

        let exhausted = ResilienceError::AllBackendsExhausted {
            attempts: 6,
            last: Box::new(timeout),
        };
        assert_eq!(exhausted.kind(), "AllBackendsExhausted");
        assert!(exhausted.to_string().contains("6 attempts"));
    }

    #[test]
    fn test_only_configuration_stage_errors_are_fatal() {
        let fatal = StageError::Configuration(ConfigurationError::MissingCredential {
            variable: "GOOGLE_API_KEY".into(),
        });
        assert!(fatal.is_fatal());
        assert_eq!(fatal.kind(), "Configuration");

        let input = StageError::Input("bad zip".into());
        assert!(!input.is_fatal());
        assert_eq!(input.kind(), "Input");
    }

    #[test]
    fn test_task_error_kind_delegates_to_call() {
        let err = TaskError::from(ResilienceError::NonTransient {
            backend: "primary".into(),
            reason: "invalid argument".into(),
        });
        assert_eq!(err.kind(), "NonTransient");
        assert_eq!(TaskError::Panic("boom".into()).kind(), "Panic");
    }
}
