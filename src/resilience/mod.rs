//! # Resilience Module
//!
//! Everything that stands between a task and an unreliable inference service:
//!
//! - **Circuit breaker**: process-wide, keyed by backend class, sheds load from
//!   classes that are failing transiently
//! - **Retry policy**: per-candidate attempt budget, hard per-attempt deadline,
//!   jittered exponential backoff
//! - **Resilient caller**: ordered backend fallback that consults and updates
//!   the breaker
//! - **Backends**: the `InferenceBackend` seam, its static registry, and the
//!   `InferenceClient` that ties them to a caller
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hurriaid_core::resilience::{
//!     BackendId, CircuitBreaker, CircuitBreakerConfig, ResilientCaller, RetryPolicy,
//! };
//! use hurriaid_core::error::CallError;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // One breaker per process, shared by every caller
//! let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
//! let caller = ResilientCaller::new(breaker, RetryPolicy::default());
//!
//! let candidates = vec![
//!     BackendId::new("gemini-2.0-flash", "gemini-flash"),
//!     BackendId::new("gemini-1.5-flash", "gemini-flash-legacy"),
//! ];
//! let answer = caller
//!     .call(&candidates, |backend| async move {
//!         Ok::<_, CallError>(format!("served by {}", backend.id))
//!     })
//!     .await?;
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod backoff;
pub mod caller;
pub mod circuit_breaker;
pub mod config;
pub mod metrics;

pub use backend::{BackendId, BackendRegistry, InferenceBackend, InferenceClient, InferenceProvider};
pub use backoff::RetryPolicy;
pub use caller::{AttemptOutcome, CallAttempt, ResilientCaller};
pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use config::CircuitBreakerConfig;
pub use metrics::{CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
