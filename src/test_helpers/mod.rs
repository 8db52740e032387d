//! # Test Helpers
//!
//! Shared fixtures for unit and integration tests: scripted inference backends
//! that replay a fixed sequence of outcomes, fast retry / breaker settings, and
//! sample advisory data.
//!
//! Built only for unit tests or with the `test-helpers` feature, which the
//! integration tests require: `cargo test --features test-helpers`.

pub mod fixtures;
pub mod scripted_backend;

pub use fixtures::{
    fast_config, fast_policy, sample_advisory, sample_geocoder, sample_request,
    sample_shelters, set_test_credential, TEST_CREDENTIAL_ENV,
};
pub use scripted_backend::{ScriptStep, ScriptedBackend};
