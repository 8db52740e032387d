//! Sequential context stage: ZIP validation, geocoding, distance, and the
//! model's risk classification.

use crate::constants::CONTEXT_STAGE_NAME;
use crate::error::StageError;
use crate::orchestration::ContextBuilder;
use crate::pipeline::geo::{haversine_km, Geocoder};
use crate::pipeline::{
    is_valid_zip, json, AdvisoryContext, AssessmentRequest, RiskAssessment, RiskLevel,
};
use crate::pipeline::tasks::traced_parser;
use crate::resilience::InferenceProvider;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct AdvisoryContextBuilder {
    geocoder: Arc<dyn Geocoder>,
    inference: Arc<InferenceProvider>,
}

impl AdvisoryContextBuilder {
    pub fn new(geocoder: Arc<dyn Geocoder>, inference: Arc<InferenceProvider>) -> Self {
        Self {
            geocoder,
            inference,
        }
    }

    /// Everything that can be derived without the model
    fn geometry(&self, request: &AssessmentRequest) -> AdvisoryContext {
        let mut context = AdvisoryContext {
            zip_code: request.zip_code.clone(),
            advisory: request.advisory.clone(),
            shelters: request.shelters.clone(),
            statements: request.statements.clone(),
            ..AdvisoryContext::default()
        };

        if is_valid_zip(&request.zip_code) {
            if let Some(point) = self.geocoder.locate(&request.zip_code) {
                let distance = haversine_km(point, request.advisory.center);
                context.zip_point = Some(point);
                context.distance_km = Some(distance);
                context.inside_radius = Some(distance <= request.advisory.radius_km);
            }
        }
        context
    }
}

fn risk_prompt(context: &AdvisoryContext, distance_km: f64, inside: bool) -> String {
    format!(
        "Classify hurricane risk. Reply with JSON only: {{\"risk\":\"LOW|MEDIUM|HIGH\",\"why\":\"...\"}}\n\
         Facts:\n\
         - zip: {}\n\
         - category: {}\n\
         - radius_km: {:.1}\n\
         - distance_km: {:.1}\n\
         - inside_radius: {}",
        context.zip_code,
        context.advisory.category,
        context.advisory.radius_km,
        distance_km,
        if inside { "TRUE" } else { "FALSE" },
    )
}

/// `{"risk": "LOW|MEDIUM|HIGH", "why": "..."}`
pub fn parse_risk(text: &str) -> Result<RiskAssessment, String> {
    let object = json::parse_object(text)?;
    let risk = object
        .get("risk")
        .and_then(Value::as_str)
        .and_then(RiskLevel::parse)
        .filter(|level| *level != RiskLevel::Safe)
        .ok_or_else(|| "missing or unknown \"risk\" level".to_string())?;
    let why = object
        .get("why")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    Ok(RiskAssessment { risk, why })
}

#[async_trait]
impl ContextBuilder for AdvisoryContextBuilder {
    type Input = AssessmentRequest;
    type Context = AdvisoryContext;

    #[instrument(skip(self, request), fields(zip_code = %request.zip_code))]
    async fn build_context(&self, request: &AssessmentRequest) -> Result<AdvisoryContext, StageError> {
        if !is_valid_zip(&request.zip_code) {
            return Err(StageError::Input(format!(
                "'{}' is not a 5-digit ZIP code",
                request.zip_code
            )));
        }

        let mut context = self.geometry(request);

        if !request.advisory.active {
            debug!("No active advisory, skipping risk classification");
            context.analysis = Some(RiskAssessment {
                risk: RiskLevel::Safe,
                why: "No active hurricane advisory.".to_string(),
            });
            return Ok(context);
        }

        let (Some(distance_km), Some(inside)) = (context.distance_km, context.inside_radius) else {
            return Err(StageError::Input(format!(
                "unknown ZIP code {}",
                request.zip_code
            )));
        };

        let prompt = risk_prompt(&context, distance_km, inside);
        debug!(task = CONTEXT_STAGE_NAME, prompt = %prompt, "Sending prompt");
        let client = self.inference.client().await?;
        let analysis = client
            .generate_parsed(&prompt, traced_parser(CONTEXT_STAGE_NAME, parse_risk))
            .await?;

        debug!(risk = %analysis.risk, distance_km, "Risk classified");
        context.analysis = Some(analysis);
        Ok(context)
    }

    fn fallback_context(&self, request: &AssessmentRequest) -> AdvisoryContext {
        self.geometry(request)
    }
}
