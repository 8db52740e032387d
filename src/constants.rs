//! # System Constants
//!
//! Fixed names that define the shape of an orchestration result: timing keys,
//! the reserved error slot for the context stage, the reference pipeline's task
//! names, and the short error classification strings surfaced to callers.

/// Timing keys written into `OrchestrationResult::timings_ms`
pub mod timing_keys {
    /// Default key for the sequential context stage
    pub const STAGE: &str = "stage1_ms";
    /// Default key for the fan-out stage wall clock
    pub const FANOUT: &str = "fanout_ms";
    /// Full request wall clock, always measured independently
    pub const TOTAL: &str = "total_ms";
    /// Suffix appended to a task name for its own timing entry
    pub const TASK_SUFFIX: &str = "_ms";
}

/// Error slot used for a failed context stage
pub const CONTEXT_STAGE_NAME: &str = "context";

/// Task names used by the reference assessment pipeline
pub mod tasks {
    pub const CHECKLIST: &str = "checklist";
    pub const PLANNER: &str = "planner";
    pub const VERIFY: &str = "verify";
}

/// Short classification strings that land in `OrchestrationResult::errors`
pub mod error_kinds {
    pub const TIMEOUT: &str = "Timeout";
    pub const TRANSIENT_UNAVAILABLE: &str = "TransientUnavailable";
    pub const NON_TRANSIENT: &str = "NonTransient";
    pub const PARSE_FAILURE: &str = "ParseFailure";
    pub const ALL_BACKENDS_EXHAUSTED: &str = "AllBackendsExhausted";
    pub const NO_CANDIDATES: &str = "NoCandidates";
    pub const CONFIGURATION: &str = "Configuration";
    pub const INPUT: &str = "Input";
    pub const PAYLOAD_ENCODING: &str = "PayloadEncoding";
    pub const PANIC: &str = "Panic";
    pub const ABORTED: &str = "Aborted";
}

/// Environment variables consulted at startup
pub mod env {
    pub const ENVIRONMENT: &str = "HURRIAID_ENV";
    pub const ENVIRONMENT_FALLBACK: &str = "APP_ENV";
    pub const CONFIG_DIR: &str = "HURRIAID_CONFIG_DIR";
    pub const OVERRIDE_PREFIX: &str = "HURRIAID";
    pub const DEFAULT_API_KEY: &str = "GOOGLE_API_KEY";
}
