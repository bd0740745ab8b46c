//! Travel-plan extraction from the loop's final text.
//!
//! The whole text is tried as JSON first, then the first fenced code block.
//! Nothing is repaired: a plan is either complete in shape or rejected with the
//! raw text kept verbatim for the caller.

use itinera_core::plan::TravelPlan;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static RE_JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]+?)\s*```").expect("static regex"));

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidReason {
    #[error("output is not parseable JSON: {0}")]
    NotParseable(String),
    #[error("travel plan is missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
    #[error("section '{key}' is malformed: {detail}")]
    MalformedSection { key: String, detail: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Valid(TravelPlan),
    Invalid { reason: InvalidReason, raw_text: String },
}

impl ExtractionOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ExtractionOutcome::Valid(_))
    }
}

pub fn extract(raw: &str) -> ExtractionOutcome {
    let mut reason = match plan_from_json(raw.trim()) {
        Ok(plan) => return ExtractionOutcome::Valid(plan),
        Err(reason) => reason,
    };

    if let Some(block) = RE_JSON_FENCE.captures(raw).and_then(|c| c.get(1)) {
        match plan_from_json(block.as_str()) {
            Ok(plan) => return ExtractionOutcome::Valid(plan),
            Err(r) => reason = r,
        }
    }

    tracing::warn!("Travel plan extraction failed: {}", reason);
    ExtractionOutcome::Invalid {
        reason,
        raw_text: raw.to_string(),
    }
}

fn plan_from_json(text: &str) -> Result<TravelPlan, InvalidReason> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| InvalidReason::NotParseable(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(InvalidReason::NotParseable(format!(
            "expected a JSON object, found {}",
            json_type_name(&value)
        )));
    };

    let missing = TravelPlan::missing_sections(&obj);
    if !missing.is_empty() {
        return Err(InvalidReason::MissingKeys(
            missing.into_iter().map(String::from).collect(),
        ));
    }

    TravelPlan::from_sections(&obj).map_err(|e| InvalidReason::MalformedSection {
        key: e.key.to_string(),
        detail: e.detail,
    })
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
