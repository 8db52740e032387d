//! # Circuit Breaker Implementation
//!
//! Process-wide failure tracker keyed by backend class. A class is open while
//! `now < open_until`; each qualifying transient failure extends the window to
//! `min(max_cooldown, base_cooldown * consecutive_failures)` and any success
//! resets the class to closed.
//!
//! Construct one breaker per process and hand it to every `ResilientCaller`
//! behind an `Arc`. State persists across requests on purpose: it is a
//! load-shedding signal, not per-request bookkeeping.
//!
//! Mutations for one class go through a `DashMap` entry and are atomic with
//! respect to concurrent callers. `allow` reads without mutating and may
//! observe a slightly stale window.

use crate::resilience::{
    CircuitBreakerConfig, CircuitBreakerMetrics, SystemCircuitBreakerMetrics,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls are allowed
    Closed,
    /// Calls fail fast until the cooldown elapses
    Open,
}

#[derive(Debug, Default, Clone, Copy)]
struct BreakerEntry {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

impl BreakerEntry {
    fn is_open_at(&self, now: Instant) -> bool {
        self.open_until.is_some_and(|until| now < until)
    }
}

/// Point-in-time view of one backend class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub backend_class: String,
    pub consecutive_failures: u32,
    pub state: CircuitState,
    /// Time left before the class is allowed again
    pub remaining_cooldown: Option<Duration>,
}

/// Shared breaker state for every backend class
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    entries: DashMap<String, BreakerEntry>,
    metrics: DashMap<String, CircuitBreakerMetrics>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        info!(
            enabled = config.enabled,
            base_cooldown_ms = config.base_cooldown.as_millis() as u64,
            max_cooldown_ms = config.max_cooldown.as_millis() as u64,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            config,
            entries: DashMap::new(),
            metrics: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a new attempt against `backend_class` is allowed right now
    pub fn allow(&self, backend_class: &str) -> bool {
        if !self.config.enabled {
            return true;
        }
        self.entries
            .get(backend_class)
            .map_or(true, |entry| !entry.is_open_at(Instant::now()))
    }

    /// Current state of `backend_class`, ignoring the `enabled` switch
    pub fn state(&self, backend_class: &str) -> CircuitState {
        let open = self
            .entries
            .get(backend_class)
            .is_some_and(|entry| entry.is_open_at(Instant::now()));
        if open {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Record a failed logical call. Non-transient failures never change state.
    pub fn record_failure(&self, backend_class: &str, transient: bool) {
        if !transient {
            self.metrics
                .entry(backend_class.to_string())
                .or_default()
                .ignored_failures += 1;
            debug!(
                backend_class = backend_class,
                "Non-transient failure recorded without opening the circuit"
            );
            return;
        }

        let now = Instant::now();
        let (failures, cooldown, was_open) = {
            let mut entry = self.entries.entry(backend_class.to_string()).or_default();
            let was_open = entry.is_open_at(now);
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
            let cooldown = self.config.cooldown_for(entry.consecutive_failures);
            entry.open_until = Some(now + cooldown);
            (entry.consecutive_failures, cooldown, was_open)
        };

        {
            let mut metrics = self.metrics.entry(backend_class.to_string()).or_default();
            metrics.transient_failures += 1;
            if !was_open {
                metrics.times_opened += 1;
            }
        }

        warn!(
            backend_class = backend_class,
            consecutive_failures = failures,
            cooldown_ms = cooldown.as_millis() as u64,
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    /// Record a successful logical call, closing the class
    pub fn record_success(&self, backend_class: &str) {
        let previous = self
            .entries
            .insert(backend_class.to_string(), BreakerEntry::default());

        self.metrics
            .entry(backend_class.to_string())
            .or_default()
            .success_count += 1;

        if let Some(previous) = previous.filter(|p| p.consecutive_failures > 0) {
            info!(
                backend_class = backend_class,
                cleared_failures = previous.consecutive_failures,
                "🟢 Circuit breaker closed (recovered)"
            );
        }
    }

    /// Count a candidate skipped because its class was open
    pub fn record_rejection(&self, backend_class: &str) {
        self.metrics
            .entry(backend_class.to_string())
            .or_default()
            .rejections += 1;
    }

    pub fn snapshot(&self, backend_class: &str) -> BreakerSnapshot {
        let now = Instant::now();
        let entry = self
            .entries
            .get(backend_class)
            .map(|e| *e)
            .unwrap_or_default();

        let remaining_cooldown = entry
            .open_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|remaining| !remaining.is_zero());

        BreakerSnapshot {
            backend_class: backend_class.to_string(),
            consecutive_failures: entry.consecutive_failures,
            state: if entry.is_open_at(now) {
                CircuitState::Open
            } else {
                CircuitState::Closed
            },
            remaining_cooldown,
        }
    }

    pub fn metrics(&self) -> SystemCircuitBreakerMetrics {
        let now = Instant::now();
        let per_class = self
            .metrics
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect();
        let mut open_classes: Vec<String> = self
            .entries
            .iter()
            .filter(|item| item.value().is_open_at(now))
            .map(|item| item.key().clone())
            .collect();
        open_classes.sort();

        SystemCircuitBreakerMetrics {
            per_class,
            open_classes,
        }
    }

    /// Forget every class; intended for tests and operator resets
    pub fn reset_all(&self) {
        warn!("🚨 Circuit breaker state reset");
        self.entries.clear();
        self.metrics.clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
