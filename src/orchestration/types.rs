//! # Orchestration Types
//!
//! Data shapes that cross the orchestration boundary: the named job map handed
//! to the scheduler, the per-job outcome it returns, and the merged
//! [`OrchestrationResult`] handed back to the presentation layer.

use crate::config::{ConfigResult, ConfigurationError};
use crate::error::TaskError;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Opaque task payload as seen by the orchestration core
pub type TaskPayload = serde_json::Value;

/// A zero-argument job, already closed over whatever context it needs
pub type Job = Box<dyn FnOnce() -> BoxFuture<'static, Result<TaskPayload, TaskError>> + Send>;

/// Named fan-out jobs. Names are unique; insertion rejects duplicates.
#[derive(Default)]
pub struct TaskMap {
    jobs: BTreeMap<String, Job>,
}

impl TaskMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job under `name`. Its typed output is serialized into the
    /// opaque payload once the job finishes.
    pub fn insert<T, F, Fut>(&mut self, name: impl Into<String>, job: F) -> ConfigResult<&mut Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let name = name.into();
        if self.jobs.contains_key(&name) {
            return Err(ConfigurationError::invalid_value(
                "task_name",
                name,
                "duplicate task name",
            ));
        }

        let boxed: Job = Box::new(move || {
            async move {
                let output = job().await?;
                Ok(serde_json::to_value(output)?)
            }
            .boxed()
        });
        self.jobs.insert(name, boxed);
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub(crate) fn into_jobs(self) -> impl Iterator<Item = (String, Job)> {
        self.jobs.into_iter()
    }
}

impl fmt::Debug for TaskMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskMap")
            .field("jobs", &self.jobs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Status of a completed fan-out job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Success,
    Failure,
}

/// What one job produced, recorded once when it completes
#[derive(Debug)]
pub struct TaskOutcome {
    pub name: String,
    pub elapsed_ms: f64,
    pub result: Result<TaskPayload, TaskError>,
}

impl TaskOutcome {
    pub fn status(&self) -> TaskStatus {
        if self.result.is_ok() {
            TaskStatus::Success
        } else {
            TaskStatus::Failure
        }
    }

    pub fn payload(&self) -> Option<&TaskPayload> {
        self.result.as_ref().ok()
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        self.result.as_ref().err().map(TaskError::kind)
    }
}

/// Everything the fan-out barrier collected
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub outcomes: Vec<TaskOutcome>,
    pub wall_clock_ms: f64,
}

impl FanOutReport {
    pub fn outcome(&self, name: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn results(&self) -> BTreeMap<String, TaskPayload> {
        self.outcomes
            .iter()
            .filter_map(|o| o.payload().map(|p| (o.name.clone(), p.clone())))
            .collect()
    }

    pub fn errors(&self) -> BTreeMap<String, String> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error_kind().map(|k| (o.name.clone(), k.to_string())))
            .collect()
    }

    /// Per-task elapsed time keyed by bare task name
    pub fn timings(&self) -> BTreeMap<String, f64> {
        self.outcomes
            .iter()
            .map(|o| (o.name.clone(), o.elapsed_ms))
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status() == TaskStatus::Failure)
            .count()
    }
}

/// Final merged result of one request.
///
/// The context stage's output is flattened into the top level; `results` and
/// `errors` never share a task name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult<C> {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub context: Option<C>,
    pub results: BTreeMap<String, TaskPayload>,
    pub errors: BTreeMap<String, String>,
    pub timings_ms: BTreeMap<String, f64>,
}

impl<C> OrchestrationResult<C> {
    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn timing(&self, key: &str) -> Option<f64> {
        self.timings_ms.get(key).copied()
    }
}

/// Milliseconds as a float, the unit every timing map uses
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResilienceError;

    #[test]
    fn test_duplicate_task_name_is_rejected() {
        let mut tasks = TaskMap::new();
        tasks
            .insert("checklist", || async { Ok::<_, TaskError>(1) })
            .unwrap();

        let error = tasks
            .insert("checklist", || async { Ok::<_, TaskError>(2) })
            .unwrap_err();

        assert!(matches!(error, ConfigurationError::InvalidValue { .. }));
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_job_output_is_serialized() {
        let mut tasks = TaskMap::new();
        tasks
            .insert("items", || async {
                Ok::<_, TaskError>(vec!["water", "batteries"])
            })
            .unwrap();

        let (name, job) = tasks.into_jobs().next().unwrap();
        assert_eq!(name, "items");
        assert_eq!(job().await.unwrap(), serde_json::json!(["water", "batteries"]));
    }

    #[test]
    fn test_report_partitions_results_and_errors() {
        let report = FanOutReport {
            outcomes: vec![
                TaskOutcome {
                    name: "ok".into(),
                    elapsed_ms: 1.0,
                    result: Ok(serde_json::json!(true)),
                },
                TaskOutcome {
                    name: "bad".into(),
                    elapsed_ms: 2.0,
                    result: Err(TaskError::Call(ResilienceError::NoCandidates)),
                },
            ],
            wall_clock_ms: 2.5,
        };

        assert_eq!(report.results().keys().collect::<Vec<_>>(), vec!["ok"]);
        assert_eq!(report.errors().get("bad").map(String::as_str), Some("NoCandidates"));
        assert_eq!(report.timings().len(), 2);
        assert_eq!(report.failure_count(), 1);
    }

    #[test]
    fn test_result_flattens_context() {
        #[derive(Serialize, Deserialize, Clone, Debug)]
        struct Ctx {
            zip: String,
        }

        let result = OrchestrationResult {
            request_id: Uuid::nil(),
            context: Some(Ctx { zip: "33101".into() }),
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            timings_ms: BTreeMap::from([("total_ms".to_string(), 1.5)]),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["zip"], "33101");
        assert_eq!(json["timings_ms"]["total_ms"], 1.5);
        assert!(json.get("context").is_none());
    }
}
