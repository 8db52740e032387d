//! # Circuit Breaker Metrics
//!
//! Counters kept per backend class for observability. They never influence
//! whether a call is allowed; only `BreakerEntry` state does.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counters for a single backend class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Successful logical calls
    pub success_count: u64,

    /// Transient failures that extended the cooldown
    pub transient_failures: u64,

    /// Non-transient failures recorded without a state change
    pub ignored_failures: u64,

    /// Candidates skipped because the breaker was open
    pub rejections: u64,

    /// Times the breaker went from closed to open
    pub times_opened: u64,
}

impl CircuitBreakerMetrics {
    pub fn total_recorded(&self) -> u64 {
        self.success_count + self.transient_failures + self.ignored_failures
    }

    /// Fraction of recorded outcomes that were transient failures
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_recorded();
        if total == 0 {
            return 0.0;
        }
        self.transient_failures as f64 / total as f64
    }
}

/// Snapshot across every backend class the breaker has seen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemCircuitBreakerMetrics {
    pub per_class: HashMap<String, CircuitBreakerMetrics>,
    pub open_classes: Vec<String>,
}

impl SystemCircuitBreakerMetrics {
    pub fn is_healthy(&self) -> bool {
        self.open_classes.is_empty()
    }

    pub fn total_rejections(&self) -> u64 {
        self.per_class.values().map(|m| m.rejections).sum()
    }
}
