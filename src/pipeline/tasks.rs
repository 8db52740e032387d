//! Fan-out jobs over an [`AdvisoryContext`]: checklist, shelter plan, and
//! rumor verification.

use crate::config::ConfigResult;
use crate::constants::tasks;
use crate::error::TaskError;
use crate::orchestration::{TaskMap, TaskPlanner};
use crate::pipeline::verify::RumorVerdict;
use crate::pipeline::{json, AdvisoryContext};
use crate::resilience::InferenceProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Nearest open shelter as chosen by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelterPlan {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
    pub eta_min: u32,
}

/// Plans the checklist, planner, and verify jobs for one request
#[derive(Debug, Clone)]
pub struct AssessmentPlanner {
    inference: Arc<InferenceProvider>,
}

impl AssessmentPlanner {
    pub fn new(inference: Arc<InferenceProvider>) -> Self {
        Self { inference }
    }
}

impl TaskPlanner<AdvisoryContext> for AssessmentPlanner {
    fn plan(&self, context: Arc<AdvisoryContext>) -> ConfigResult<TaskMap> {
        let mut jobs = TaskMap::new();

        let (inference, ctx) = (Arc::clone(&self.inference), Arc::clone(&context));
        jobs.insert(tasks::CHECKLIST, move || async move {
            checklist(&inference, &ctx).await
        })?;

        let (inference, ctx) = (Arc::clone(&self.inference), Arc::clone(&context));
        jobs.insert(tasks::PLANNER, move || async move {
            shelter_plan(&inference, &ctx).await
        })?;

        let (inference, ctx) = (Arc::clone(&self.inference), context);
        jobs.insert(tasks::VERIFY, move || async move {
            verify_statements(&inference, &ctx).await
        })?;

        Ok(jobs)
    }
}

/// Wrap a response parser so every raw response, and any parse error, is
/// logged at debug level under the task's name
pub(crate) fn traced_parser<T: 'static>(
    task: &'static str,
    parse: fn(&str) -> Result<T, String>,
) -> impl Fn(&str) -> Result<T, String> + Send + Sync + 'static {
    move |text: &str| {
        debug!(task, raw = %text, "Received response");
        parse(text).inspect_err(|error| debug!(task, error = %error, "Response did not parse"))
    }
}

pub async fn checklist(
    inference: &InferenceProvider,
    context: &AdvisoryContext,
) -> Result<Vec<String>, TaskError> {
    let analysis = context
        .analysis
        .as_ref()
        .ok_or_else(|| TaskError::Input("no risk analysis in context".to_string()))?;

    let prompt = format!(
        "Write a short hurricane preparedness checklist as a JSON array of strings.\n\
         Facts:\n\
         zip={}\n\
         risk={}\n\
         distance_km={}\n\
         radius_km={}\n\
         category={}",
        context.zip_code,
        analysis.risk,
        context
            .distance_km
            .map(|d| format!("{d:.1}"))
            .unwrap_or_else(|| "unknown".to_string()),
        context.advisory.radius_km,
        context.advisory.category,
    );

    debug!(task = tasks::CHECKLIST, prompt = %prompt, "Sending prompt");
    let client = inference.client().await?;
    let items = client
        .generate_parsed(&prompt, traced_parser(tasks::CHECKLIST, parse_checklist))
        .await?;
    debug!(items = items.len(), "Checklist generated");
    Ok(items)
}

/// A JSON array of strings, or `- ` bullet lines when no array is present
pub fn parse_checklist(text: &str) -> Result<Vec<String>, String> {
    if let Some(raw) = json::extract_array(text) {
        let values: Vec<Value> =
            serde_json::from_str(raw).map_err(|e| format!("invalid checklist JSON: {e}"))?;
        return Ok(values
            .into_iter()
            .map(|value| match value {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|item| !item.is_empty())
            .collect());
    }

    Ok(text
        .lines()
        .filter_map(|line| line.trim().strip_prefix("- "))
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

pub async fn shelter_plan(
    inference: &InferenceProvider,
    context: &AdvisoryContext,
) -> Result<ShelterPlan, TaskError> {
    let origin = context
        .zip_point
        .ok_or_else(|| TaskError::Input("ZIP coordinates unavailable".to_string()))?;
    let open = context.open_shelters();
    if open.is_empty() {
        return Err(TaskError::Input("no open shelters".to_string()));
    }

    let prompt = format!(
        "Pick the nearest open shelter. Reply with JSON only: \
         {{\"name\":...,\"lat\":...,\"lon\":...,\"distance_km\":...,\"eta_min\":...}}\n\
         zip_lat={} zip_lon={}\nshelters_json={}",
        origin.lat,
        origin.lon,
        serde_json::to_string(&open)?,
    );

    debug!(task = tasks::PLANNER, prompt = %prompt, "Sending prompt");
    let client = inference.client().await?;
    let plan = client
        .generate_parsed(&prompt, traced_parser(tasks::PLANNER, parse_shelter_plan))
        .await?;
    debug!(shelter = %plan.name, distance_km = plan.distance_km, "Shelter plan chosen");
    Ok(plan)
}

/// Requires a non-empty name and non-negative distance and ETA
pub fn parse_shelter_plan(text: &str) -> Result<ShelterPlan, String> {
    let object = json::parse_object(text)?;
    let number = |key: &str| object.get(key).and_then(Value::as_f64);

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    let distance_km = number("distance_km").unwrap_or(-1.0);
    let eta_min = number("eta_min").unwrap_or(-1.0);

    if name.is_empty() || distance_km < 0.0 || eta_min < 0.0 {
        return Err("no open shelter in response".to_string());
    }

    Ok(ShelterPlan {
        name: name.to_string(),
        lat: number("lat").unwrap_or(0.0),
        lon: number("lon").unwrap_or(0.0),
        distance_km: (distance_km * 10.0).round() / 10.0,
        eta_min: eta_min.trunc().min(f64::from(u32::MAX)) as u32,
    })
}

pub async fn verify_statements(
    inference: &InferenceProvider,
    context: &AdvisoryContext,
) -> Result<RumorVerdict, TaskError> {
    let statements: Vec<&str> = context
        .statements
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if statements.is_empty() {
        return Ok(RumorVerdict::clear());
    }

    let prompt = format!(
        "Check each hurricane preparation statement. Reply with JSON only: \
         {{\"matches\":[{{\"pattern\":...,\"verdict\":\"TRUE|FALSE|MISLEADING|CAUTION\",\"note\":...}}]}}\n\
         Items:\n{}",
        statements.join("\n"),
    );

    debug!(task = tasks::VERIFY, prompt = %prompt, "Sending prompt");
    let client = inference.client().await?;
    let verdict = client
        .generate_parsed(&prompt, traced_parser(tasks::VERIFY, RumorVerdict::parse))
        .await?;
    debug!(overall = ?verdict.overall, checked = verdict.matches.len(), "Statements verified");
    Ok(verdict)
}
