//! # Advisory Assessment Pipeline
//!
//! The concrete request flow built on the orchestration core:
//!
//! 1. [`AdvisoryContextBuilder`] validates the ZIP, resolves it to
//!    coordinates, measures the distance to the storm centre, and asks the
//!    inference service for a risk classification.
//! 2. [`AssessmentPlanner`] fans out three jobs over that context:
//!    a preparedness checklist, a nearest-open-shelter plan, and a rumor
//!    verification verdict.
//!
//! Prompts are plain fact blocks; generated wording is not interpreted beyond
//! the JSON shapes below.

pub mod context;
pub mod geo;
pub mod json;
pub mod tasks;
pub mod verify;

pub use context::AdvisoryContextBuilder;
pub use geo::{haversine_km, Geocoder, StaticGeocoder};
pub use tasks::{AssessmentPlanner, ShelterPlan};
pub use verify::{Overall, RumorVerdict, StatementCheck, Verdict};

use crate::orchestration::Orchestrator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator wired with the advisory pipeline
pub type AssessmentOrchestrator = Orchestrator<AdvisoryContextBuilder, AssessmentPlanner>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Current storm advisory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Advisory {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub category: String,
    pub issued_at: String,
    pub active: bool,
}

impl Default for Advisory {
    fn default() -> Self {
        Self {
            center: GeoPoint::new(25.77, -80.19),
            radius_km: 100.0,
            category: "TS".to_string(),
            issued_at: String::new(),
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelter {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Shelter {
    /// An explicit `open` flag wins; otherwise `status` must read "open"
    pub fn is_open(&self) -> bool {
        match (self.open, &self.status) {
            (Some(open), _) => open,
            (None, Some(status)) => status.trim().eq_ignore_ascii_case("open"),
            (None, None) => false,
        }
    }
}

/// One assessment request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub zip_code: String,
    #[serde(default)]
    pub advisory: Advisory,
    #[serde(default)]
    pub shelters: Vec<Shelter>,
    /// Rumors or instructions to fact-check
    #[serde(default)]
    pub statements: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// No active advisory
    Safe,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Some(RiskLevel::Safe),
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk: RiskLevel,
    pub why: String,
}

/// Shared read-only context for the fan-out jobs.
///
/// Optional fields are absent when the context stage fell back after a
/// non-fatal failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisoryContext {
    pub zip_code: String,
    pub advisory: Advisory,
    pub zip_point: Option<GeoPoint>,
    pub distance_km: Option<f64>,
    pub inside_radius: Option<bool>,
    pub analysis: Option<RiskAssessment>,
    #[serde(skip)]
    pub shelters: Vec<Shelter>,
    #[serde(skip)]
    pub statements: Vec<String>,
}

impl AdvisoryContext {
    pub fn open_shelters(&self) -> Vec<&Shelter> {
        self.shelters.iter().filter(|s| s.is_open()).collect()
    }
}

/// Five ASCII digits
pub fn is_valid_zip(zip_code: &str) -> bool {
    zip_code.len() == 5 && zip_code.bytes().all(|b| b.is_ascii_digit())
}
