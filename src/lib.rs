#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # HurriAid Core
//!
//! Orchestration and resilience core for HurriAid situational risk
//! assessments.
//!
//! ## Overview
//!
//! Each request runs one sequential context-building stage, then fans out
//! several independent jobs concurrently. Every external inference call goes
//! through retry with jittered backoff, a hard per-call timeout, ordered
//! backend fallback, and a process-wide circuit breaker. Per-job outcomes are
//! merged into one result with partial successes, classified errors, and
//! independently measured timings.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Circuit breaker, retry policy, resilient caller, backends
//! - [`orchestration`] - Task scheduler, result aggregator, orchestrator
//! - [`pipeline`] - Advisory context stage and the checklist / planner / verify jobs
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error taxonomy
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hurriaid_core::config::ConfigManager;
//! use hurriaid_core::orchestration::Orchestrator;
//! use hurriaid_core::pipeline::{
//!     AdvisoryContextBuilder, AssessmentPlanner, AssessmentRequest, StaticGeocoder,
//! };
//! use hurriaid_core::resilience::{BackendRegistry, CircuitBreaker, InferenceProvider};
//! use std::sync::Arc;
//!
//! # async fn example(registry: BackendRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! hurriaid_core::logging::init_structured_logging();
//!
//! let manager = ConfigManager::load()?;
//! let config = manager.config().clone();
//! let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.to_breaker_config()));
//! let inference = Arc::new(InferenceProvider::new(config.clone(), Arc::new(registry), breaker));
//!
//! let orchestrator = Orchestrator::from_config(
//!     AdvisoryContextBuilder::new(Arc::new(StaticGeocoder::new()), Arc::clone(&inference)),
//!     AssessmentPlanner::new(inference),
//!     &config,
//! );
//!
//! let request = AssessmentRequest {
//!     zip_code: "33101".to_string(),
//!     ..AssessmentRequest::default()
//! };
//! let result = orchestrator.run_once(&request).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod pipeline;
pub mod resilience;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::{ConfigManager, ConfigurationError, HurriaidConfig};
pub use error::{CallError, HurriaidError, ResilienceError, Result, StageError, TaskError};
pub use orchestration::{
    ContextBuilder, OrchestrationResult, Orchestrator, ResultAggregator, TaskMap, TaskPlanner,
    TaskScheduler,
};
pub use resilience::{
    BackendId, BackendRegistry, CircuitBreaker, InferenceBackend, InferenceClient,
    InferenceProvider, ResilientCaller, RetryPolicy,
};
