//! Fast settings and sample advisory data.

use crate::config::{CircuitBreakerSettings, HurriaidConfig, RetryConfig};
use crate::pipeline::{Advisory, AssessmentRequest, GeoPoint, Shelter, StaticGeocoder};
use crate::resilience::{BackendId, RetryPolicy};
use std::time::Duration;

/// Credential variable used by test configurations; never a real key
pub const TEST_CREDENTIAL_ENV: &str = "HURRIAID_TEST_API_KEY";

pub fn set_test_credential() {
    std::env::set_var(TEST_CREDENTIAL_ENV, "test-key");
}

/// Millisecond-scale retry policy without jitter
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter_max: Duration::ZERO,
        per_call_timeout: Duration::from_millis(200),
    }
}

/// Configuration with millisecond timings, the test credential variable, and
/// the given candidates
pub fn fast_config(backends: Vec<BackendId>) -> HurriaidConfig {
    let mut config = HurriaidConfig {
        retry: RetryConfig {
            max_attempts: 2,
            base_delay_ms: 5,
            max_delay_ms: 20,
            jitter_max_ms: 0,
            per_call_timeout_ms: 200,
        },
        circuit_breaker: CircuitBreakerSettings {
            enabled: true,
            base_cooldown_ms: 100,
            max_cooldown_ms: 500,
        },
        ..HurriaidConfig::default()
    };
    config.inference.api_key_env = TEST_CREDENTIAL_ENV.to_string();
    config.inference.backends = backends;
    config
}

/// Active category 1 advisory centred on downtown Miami
pub fn sample_advisory() -> Advisory {
    Advisory {
        center: GeoPoint::new(25.77, -80.19),
        radius_km: 100.0,
        category: "CAT1".to_string(),
        issued_at: "2026-09-01T12:00:00Z".to_string(),
        active: true,
    }
}

pub fn sample_shelters() -> Vec<Shelter> {
    vec![
        Shelter {
            name: "North Arena".to_string(),
            lat: 25.81,
            lon: -80.21,
            open: Some(true),
            status: None,
        },
        Shelter {
            name: "Bayside School".to_string(),
            lat: 25.76,
            lon: -80.18,
            open: None,
            status: Some("closed".to_string()),
        },
    ]
}

pub fn sample_geocoder() -> StaticGeocoder {
    StaticGeocoder::new()
        .with_zip("33101", GeoPoint::new(25.7743, -80.1937))
        .with_zip("32226", GeoPoint::new(30.4766, -81.5434))
}

pub fn sample_request() -> AssessmentRequest {
    AssessmentRequest {
        zip_code: "33101".to_string(),
        advisory: sample_advisory(),
        shelters: sample_shelters(),
        statements: vec![
            "Taping windows prevents them from breaking".to_string(),
            "Fill bathtubs with water before landfall".to_string(),
        ],
    }
}
