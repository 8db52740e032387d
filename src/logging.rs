//! # Structured Logging Module
//!
//! Environment-aware `tracing` setup. Development and test get human-readable
//! console output; production gets one JSON object per line. `RUST_LOG`
//! overrides the per-environment default level.

use crate::config::ConfigManager;
use crate::orchestration::TaskOutcome;
use crate::resilience::{AttemptOutcome, CallAttempt};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process. Safe to call repeatedly
/// and safe when another subscriber is already installed.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(&environment)));

        let result = if environment == "production" {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(true)
                        .with_ansi(false),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true),
                )
                .try_init()
        };

        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            pid = std::process::id(),
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Default level for an environment when `RUST_LOG` is unset
pub fn log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Structured record of one backend attempt
pub fn log_call_attempt(attempt: &CallAttempt) {
    match attempt.outcome {
        AttemptOutcome::Succeeded => tracing::debug!(
            backend = %attempt.backend_id,
            attempt = attempt.attempt_number,
            started_at = %attempt.started_at.to_rfc3339(),
            "📡 CALL_ATTEMPT succeeded"
        ),
        AttemptOutcome::Failed(kind) => tracing::debug!(
            backend = %attempt.backend_id,
            attempt = attempt.attempt_number,
            started_at = %attempt.started_at.to_rfc3339(),
            error_kind = kind,
            "📡 CALL_ATTEMPT failed"
        ),
    }
}

/// Structured record of one finished fan-out job
pub fn log_task_outcome(request_id: Uuid, outcome: &TaskOutcome) {
    tracing::info!(
        %request_id,
        task = %outcome.name,
        status = ?outcome.status(),
        error_kind = outcome.error_kind(),
        elapsed_ms = outcome.elapsed_ms,
        "📋 TASK_OUTCOME"
    );
}
