//! # Result Aggregator
//!
//! Merges the context stage and the fan-out report into one
//! [`OrchestrationResult`]. Stage errors are keyed under the context stage
//! name, task errors and timings under the task name, and `total_ms` is read
//! from the request's own clock as the very last step, never summed.

use crate::config::{ConfigResult, ConfigurationError, OrchestrationSettings};
use crate::constants::{timing_keys, CONTEXT_STAGE_NAME};
use crate::orchestration::types::{duration_ms, FanOutReport, OrchestrationResult, TaskMap};
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

/// What the sequential stage left behind
#[derive(Debug, Clone)]
pub struct StageReport<C> {
    pub context: Option<C>,
    /// Classification string of the stage error, if any
    pub error_kind: Option<String>,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone)]
pub struct ResultAggregator {
    stage_key: String,
    fanout_key: String,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(timing_keys::STAGE, timing_keys::FANOUT)
    }
}

impl ResultAggregator {
    pub fn new(stage_key: impl Into<String>, fanout_key: impl Into<String>) -> Self {
        Self {
            stage_key: stage_key.into(),
            fanout_key: fanout_key.into(),
        }
    }

    pub fn from_config(settings: &OrchestrationSettings) -> Self {
        Self::new(&settings.stage_timing_key, &settings.fanout_timing_key)
    }

    pub fn stage_key(&self) -> &str {
        &self.stage_key
    }

    pub fn fanout_key(&self) -> &str {
        &self.fanout_key
    }

    pub fn task_timing_key(name: &str) -> String {
        format!("{name}{}", timing_keys::TASK_SUFFIX)
    }

    /// Reject task names whose error or timing entries would collide with the
    /// stage's own keys
    pub fn check_task_names(&self, tasks: &TaskMap) -> ConfigResult<()> {
        for name in tasks.names() {
            let timing_key = Self::task_timing_key(name);
            let collides = name == CONTEXT_STAGE_NAME
                || timing_key == self.stage_key
                || timing_key == self.fanout_key
                || timing_key == timing_keys::TOTAL;
            if collides {
                return Err(ConfigurationError::invalid_value(
                    "task_name",
                    name,
                    "collides with a reserved result key",
                ));
            }
        }
        Ok(())
    }

    /// Build the final result. `entered` is the instant the request started;
    /// `fanout` is `None` when the fan-out stage was skipped.
    pub fn aggregate<C>(
        &self,
        request_id: Uuid,
        entered: Instant,
        stage: StageReport<C>,
        fanout: Option<FanOutReport>,
    ) -> OrchestrationResult<C> {
        let mut results = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let mut timings_ms = BTreeMap::new();

        timings_ms.insert(self.stage_key.clone(), stage.elapsed_ms);
        if let Some(kind) = stage.error_kind {
            errors.insert(CONTEXT_STAGE_NAME.to_string(), kind);
        }

        if let Some(report) = fanout {
            timings_ms.insert(self.fanout_key.clone(), report.wall_clock_ms);
            for outcome in report.outcomes {
                timings_ms.insert(Self::task_timing_key(&outcome.name), outcome.elapsed_ms);
                match outcome.result {
                    Ok(payload) => {
                        results.insert(outcome.name, payload);
                    }
                    Err(e) => {
                        errors.insert(outcome.name, e.kind().to_string());
                    }
                }
            }
        }

        timings_ms.insert(timing_keys::TOTAL.to_string(), duration_ms(entered.elapsed()));

        OrchestrationResult {
            request_id,
            context: stage.context,
            results,
            errors,
            timings_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResilienceError, TaskError};
    use crate::orchestration::types::TaskOutcome;
    use proptest::prelude::*;

    fn outcome(name: &str, ok: bool, elapsed_ms: f64) -> TaskOutcome {
        TaskOutcome {
            name: name.to_string(),
            elapsed_ms,
            result: if ok {
                Ok(serde_json::json!({ "task": name }))
            } else {
                Err(TaskError::Call(ResilienceError::NonTransient {
                    backend: "primary".into(),
                    reason: "bad key".into(),
                }))
            },
        }
    }

    #[test]
    fn test_merges_stage_and_fanout() {
        let entered = Instant::now();
        let stage = StageReport {
            context: Some("ctx".to_string()),
            error_kind: None,
            elapsed_ms: 3.0,
        };
        let fanout = FanOutReport {
            outcomes: vec![outcome("checklist", true, 1.0), outcome("planner", false, 2.0)],
            wall_clock_ms: 2.5,
        };

        let result = ResultAggregator::default().aggregate(Uuid::new_v4(), entered, stage, Some(fanout));

        assert_eq!(result.context.as_deref(), Some("ctx"));
        assert!(result.results.contains_key("checklist"));
        assert_eq!(result.errors.get("planner").map(String::as_str), Some("NonTransient"));
        assert_eq!(result.timing("stage1_ms"), Some(3.0));
        assert_eq!(result.timing("fanout_ms"), Some(2.5));
        assert_eq!(result.timing("checklist_ms"), Some(1.0));
        assert_eq!(result.timing("planner_ms"), Some(2.0));
        assert!(result.timing("total_ms").is_some());
    }

    #[test]
    fn test_skipped_fanout_leaves_only_stage_entries() {
        let stage: StageReport<String> = StageReport {
            context: None,
            error_kind: Some("Configuration".into()),
            elapsed_ms: 0.5,
        };

        let result = ResultAggregator::default().aggregate(Uuid::new_v4(), Instant::now(), stage, None);

        assert!(result.results.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors.get("context").map(String::as_str), Some("Configuration"));
        assert!(result.timing("fanout_ms").is_none());
        assert_eq!(
            result.timings_ms.keys().collect::<Vec<_>>(),
            vec!["stage1_ms", "total_ms"]
        );
    }

    #[test]
    fn test_total_measured_from_entry() {
        let entered = Instant::now();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let stage: StageReport<()> = StageReport {
            context: Some(()),
            error_kind: None,
            elapsed_ms: 0.0,
        };

        let result = ResultAggregator::default().aggregate(Uuid::new_v4(), entered, stage, None);

        assert!(result.timing("total_ms").unwrap() >= 20.0);
    }

    #[test]
    fn test_configured_timing_keys_are_used() {
        let settings = OrchestrationSettings {
            stage_timing_key: "lookup_ms".to_string(),
            fanout_timing_key: "parallel_ms".to_string(),
            ..OrchestrationSettings::default()
        };
        let aggregator = ResultAggregator::from_config(&settings);
        assert_eq!(aggregator.stage_key(), "lookup_ms");
        assert_eq!(aggregator.fanout_key(), "parallel_ms");

        let stage = StageReport {
            context: Some(()),
            error_kind: None,
            elapsed_ms: 1.5,
        };
        let fanout = FanOutReport {
            outcomes: vec![outcome("checklist", true, 1.0)],
            wall_clock_ms: 1.0,
        };
        let result = aggregator.aggregate(Uuid::new_v4(), Instant::now(), stage, Some(fanout));

        assert_eq!(result.timing("lookup_ms"), Some(1.5));
        assert_eq!(result.timing("parallel_ms"), Some(1.0));
        assert!(result.timing("stage1_ms").is_none());
        assert!(result.timing("fanout_ms").is_none());
    }

    #[test]
    fn test_reserved_task_names_rejected() {
        let aggregator = ResultAggregator::default();

        for reserved in ["context", "stage1", "fanout", "total"] {
            let mut tasks = TaskMap::new();
            tasks
                .insert(reserved, || async { Ok::<_, TaskError>(()) })
                .unwrap();
            assert!(
                aggregator.check_task_names(&tasks).is_err(),
                "{reserved} should be reserved"
            );
        }

        let mut tasks = TaskMap::new();
        tasks
            .insert("checklist", || async { Ok::<_, TaskError>(()) })
            .unwrap();
        assert!(aggregator.check_task_names(&tasks).is_ok());
    }

    proptest! {
        #[test]
        fn prop_every_task_lands_in_exactly_one_map(flags in proptest::collection::vec(any::<bool>(), 0..12)) {
            let outcomes: Vec<TaskOutcome> = flags
                .iter()
                .enumerate()
                .map(|(i, ok)| outcome(&format!("task{i}"), *ok, i as f64))
                .collect();
            let fanout = FanOutReport { outcomes, wall_clock_ms: 1.0 };
            let stage: StageReport<()> = StageReport { context: Some(()), error_kind: None, elapsed_ms: 0.0 };

            let result = ResultAggregator::default().aggregate(Uuid::nil(), Instant::now(), stage, Some(fanout));

            prop_assert_eq!(result.results.len() + result.errors.len(), flags.len());
            for (i, ok) in flags.iter().enumerate() {
                let name = format!("task{i}");
                prop_assert_eq!(result.results.contains_key(&name), *ok);
                prop_assert_eq!(result.errors.contains_key(&name), !*ok);
                let timing_key = format!("task{i}_ms");
                prop_assert!(result.timings_ms.contains_key(&timing_key));
            }
        }
    }
}
