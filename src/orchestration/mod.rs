//! # Orchestration Module
//!
//! One sequential context stage followed by a concurrent fan-out of
//! independent jobs, merged into a single result:
//!
//! - **Orchestrator**: per-request driver and the only public entry point
//! - **TaskScheduler**: bounded fan-out with failure isolation and a full barrier
//! - **ResultAggregator**: namespaced results / errors / timings with an
//!   independently measured total
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hurriaid_core::config::ConfigResult;
//! use hurriaid_core::error::{StageError, TaskError};
//! use hurriaid_core::orchestration::{ContextBuilder, Orchestrator, TaskMap, TaskPlanner};
//! use std::sync::Arc;
//!
//! struct Upper;
//!
//! #[async_trait::async_trait]
//! impl ContextBuilder for Upper {
//!     type Input = String;
//!     type Context = String;
//!
//!     async fn build_context(&self, input: &String) -> Result<String, StageError> {
//!         Ok(input.to_uppercase())
//!     }
//!
//!     fn fallback_context(&self, input: &String) -> String {
//!         input.clone()
//!     }
//! }
//!
//! struct Length;
//!
//! impl TaskPlanner<String> for Length {
//!     fn plan(&self, context: Arc<String>) -> ConfigResult<TaskMap> {
//!         let mut tasks = TaskMap::new();
//!         tasks.insert("length", move || async move { Ok::<_, TaskError>(context.len()) })?;
//!         Ok(tasks)
//!     }
//! }
//!
//! # async fn example() {
//! let result = Orchestrator::new(Upper, Length).run_once(&"storm".to_string()).await;
//! assert_eq!(result.results["length"], 5);
//! # }
//! ```

pub mod aggregator;
pub mod orchestrator;
pub mod scheduler;
pub mod types;

pub use aggregator::{ResultAggregator, StageReport};
pub use orchestrator::{ContextBuilder, Orchestrator, TaskPlanner};
pub use scheduler::TaskScheduler;
pub use types::{
    duration_ms, FanOutReport, Job, OrchestrationResult, TaskMap, TaskOutcome, TaskPayload,
    TaskStatus,
};
