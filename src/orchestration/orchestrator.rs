//! # Orchestrator
//!
//! Single entry point per request: build the context, plan the fan-out over
//! the now-immutable context, run it, and aggregate.
//!
//! The context stage and the task set are supplied through [`ContextBuilder`]
//! and [`TaskPlanner`], so the orchestration core never sees domain logic.

use crate::config::{ConfigResult, HurriaidConfig};
use crate::constants::timing_keys;
use crate::error::StageError;
use crate::logging::log_task_outcome;
use crate::orchestration::aggregator::{ResultAggregator, StageReport};
use crate::orchestration::scheduler::TaskScheduler;
use crate::orchestration::types::{duration_ms, OrchestrationResult, TaskMap};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, field, info, instrument, warn, Span};
use uuid::Uuid;

/// The sequential context-building stage
#[async_trait]
pub trait ContextBuilder: Send + Sync {
    type Input: Send + Sync;
    type Context: Clone + Send + Sync + 'static;

    async fn build_context(&self, input: &Self::Input) -> Result<Self::Context, StageError>;

    /// Best-effort context for the fan-out when the stage fails non-fatally
    fn fallback_context(&self, input: &Self::Input) -> Self::Context;
}

/// Derives the fan-out jobs from a built context. Each job should hold its
/// own clone of the `Arc` and only read from it.
pub trait TaskPlanner<C>: Send + Sync {
    fn plan(&self, context: Arc<C>) -> ConfigResult<TaskMap>;
}

#[derive(Debug)]
pub struct Orchestrator<B, P> {
    builder: B,
    planner: P,
    scheduler: TaskScheduler,
    aggregator: ResultAggregator,
    fatal_on_stage_failure: bool,
}

impl<B, P> Orchestrator<B, P>
where
    B: ContextBuilder,
    P: TaskPlanner<B::Context>,
{
    pub fn new(builder: B, planner: P) -> Self {
        Self {
            builder,
            planner,
            scheduler: TaskScheduler::default(),
            aggregator: ResultAggregator::default(),
            fatal_on_stage_failure: false,
        }
    }

    pub fn from_config(builder: B, planner: P, config: &HurriaidConfig) -> Self {
        Self {
            builder,
            planner,
            scheduler: TaskScheduler::from_config(&config.scheduler),
            aggregator: ResultAggregator::from_config(&config.orchestration),
            fatal_on_stage_failure: config.orchestration.fatal_on_stage_failure,
        }
    }

    pub fn with_scheduler(mut self, scheduler: TaskScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_fatal_on_stage_failure(mut self, fatal: bool) -> Self {
        self.fatal_on_stage_failure = fatal;
        self
    }

    pub fn fatal_on_stage_failure(&self) -> bool {
        self.fatal_on_stage_failure
    }

    /// Run one request end to end. Always returns a well-formed result;
    /// failures show up in `errors`.
    #[instrument(skip(self, input), fields(request_id = field::Empty))]
    pub async fn run_once(&self, input: &B::Input) -> OrchestrationResult<B::Context> {
        let entered = Instant::now();
        let request_id = Uuid::new_v4();
        Span::current().record("request_id", field::display(request_id));

        let stage_start = Instant::now();
        let stage_result = self.builder.build_context(input).await;
        let stage_elapsed_ms = duration_ms(stage_start.elapsed());

        let (context, stage_error) = match stage_result {
            Ok(context) => (context, None),
            Err(e) if e.is_fatal() || self.fatal_on_stage_failure => {
                error!(
                    %request_id,
                    error_kind = e.kind(),
                    error = %e,
                    "❌ Context stage failed, skipping fan-out"
                );
                let stage = StageReport {
                    context: None,
                    error_kind: Some(e.kind().to_string()),
                    elapsed_ms: stage_elapsed_ms,
                };
                return self.aggregator.aggregate(request_id, entered, stage, None);
            }
            Err(e) => {
                warn!(
                    %request_id,
                    error_kind = e.kind(),
                    error = %e,
                    "⚠️ Context stage failed, continuing with fallback context"
                );
                (self.builder.fallback_context(input), Some(e.kind().to_string()))
            }
        };

        let context = Arc::new(context);
        let planned = self
            .planner
            .plan(Arc::clone(&context))
            .and_then(|tasks| self.aggregator.check_task_names(&tasks).map(|()| tasks));

        let tasks = match planned {
            Ok(tasks) => tasks,
            Err(e) => {
                let e = StageError::from(e);
                error!(%request_id, error = %e, "❌ Fan-out could not be planned");
                let stage = StageReport {
                    context: Some(recover(context)),
                    error_kind: Some(e.kind().to_string()),
                    elapsed_ms: stage_elapsed_ms,
                };
                return self.aggregator.aggregate(request_id, entered, stage, None);
            }
        };

        let report = self.scheduler.run(tasks).await;
        for outcome in &report.outcomes {
            log_task_outcome(request_id, outcome);
        }

        let stage = StageReport {
            context: Some(recover(context)),
            error_kind: stage_error,
            elapsed_ms: stage_elapsed_ms,
        };
        let result = self.aggregator.aggregate(request_id, entered, stage, Some(report));

        info!(
            %request_id,
            succeeded = result.results.len(),
            failed = result.errors.len(),
            total_ms = result.timing(timing_keys::TOTAL),
            "✅ Request orchestrated"
        );
        result
    }
}

/// Take the context back once every job has dropped its handle
fn recover<C: Clone>(context: Arc<C>) -> C {
    Arc::try_unwrap(context).unwrap_or_else(|shared| (*shared).clone())
}
