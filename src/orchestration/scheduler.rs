//! # Task Scheduler
//!
//! Fan-out / fan-in over a [`TaskMap`]. Every job runs on its own tokio task,
//! gated by a semaphore so large fan-outs cannot exhaust the runtime. A job
//! that errors or panics is recorded in its own [`TaskOutcome`] and never
//! affects its siblings. `run` returns only after every job has finished.

use crate::config::SchedulerConfig;
use crate::error::TaskError;
use crate::orchestration::types::{duration_ms, FanOutReport, Job, TaskMap, TaskOutcome};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    max_concurrency: Option<usize>,
}

impl TaskScheduler {
    /// `None` runs up to `max(2, job count)` jobs at once
    pub fn new(max_concurrency: Option<usize>) -> Self {
        Self { max_concurrency }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.max_concurrency)
    }

    pub fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }

    /// Number of jobs allowed in flight for a fan-out of `job_count`. A
    /// configured bound never exceeds the job count, and the result always
    /// fits in a semaphore.
    pub fn permits_for(&self, job_count: usize) -> usize {
        match self.max_concurrency {
            Some(limit) => limit.min(job_count),
            None => job_count.max(2),
        }
        .clamp(1, Semaphore::MAX_PERMITS)
    }

    #[instrument(skip(self, tasks), fields(task_count = tasks.len()))]
    pub async fn run(&self, tasks: TaskMap) -> FanOutReport {
        let fanout_start = Instant::now();
        if tasks.is_empty() {
            return FanOutReport {
                outcomes: Vec::new(),
                wall_clock_ms: duration_ms(fanout_start.elapsed()),
            };
        }

        let permits = self.permits_for(tasks.len());
        let semaphore = Arc::new(Semaphore::new(permits));
        debug!(task_count = tasks.len(), permits, "🚀 Starting fan-out");

        let mut handles = Vec::with_capacity(tasks.len());
        for (name, job) in tasks.into_jobs() {
            let semaphore = Arc::clone(&semaphore);
            let task_name = name.clone();
            let handle = tokio::spawn(async move { run_job(task_name, job, semaphore).await });
            handles.push((name, handle));
        }

        // Full barrier: wait for every job regardless of earlier failures
        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(task = %name, error = %e, "Fan-out job was cancelled");
                    outcomes.push(TaskOutcome {
                        name,
                        elapsed_ms: duration_ms(fanout_start.elapsed()),
                        result: Err(TaskError::Aborted(e.to_string())),
                    });
                }
            }
        }

        let report = FanOutReport {
            outcomes,
            wall_clock_ms: duration_ms(fanout_start.elapsed()),
        };

        info!(
            task_count = report.outcomes.len(),
            failed_tasks = report.failure_count(),
            wall_clock_ms = report.wall_clock_ms,
            "✅ Fan-out completed"
        );
        report
    }
}

async fn run_job(name: String, job: Job, semaphore: Arc<Semaphore>) -> TaskOutcome {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            return TaskOutcome {
                name,
                elapsed_ms: 0.0,
                result: Err(TaskError::Aborted(e.to_string())),
            }
        }
    };

    let start = Instant::now();
    let result = match AssertUnwindSafe(async move { job().await })
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(TaskError::Panic(panic_message(panic.as_ref()))),
    };
    let elapsed_ms = duration_ms(start.elapsed());

    if let Err(e) = &result {
        warn!(
            task = %name,
            elapsed_ms,
            error_kind = e.kind(),
            error = %e,
            "⚠️ Fan-out job failed"
        );
    }

    TaskOutcome {
        name,
        elapsed_ms,
        result,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
