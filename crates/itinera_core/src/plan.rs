//! Trip request and travel-plan types.
//!
//! `TravelPlan` is only ever built from a JSON object that already carries all
//! six section keys. Leaf values are taken as text whatever their JSON type;
//! only the shape of each section is enforced.

use crate::error::PlanErrorKind;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Top-level keys every travel plan must carry.
pub const SECTION_KEYS: [&str; 6] = [
    "trip_summary",
    "flights",
    "accommodations",
    "weather",
    "local_events",
    "itinerary",
];

// ============================================================================
// Request
// ============================================================================

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripParameters {
    pub origin: String,
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(alias = "travelers")]
    pub traveler_count: u32,
    pub budget: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl TripParameters {
    /// Reject requests a task description cannot be built from.
    pub fn validate(&self) -> Result<(), String> {
        if self.origin.trim().is_empty() {
            return Err("origin must not be empty".into());
        }
        if self.destination.trim().is_empty() {
            return Err("destination must not be empty".into());
        }
        if self.traveler_count == 0 {
            return Err("traveler_count must be at least 1".into());
        }
        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        if end < start {
            return Err(format!(
                "end_date {} is before start_date {}",
                self.end_date, self.start_date
            ));
        }
        Ok(())
    }

    /// Comma-joined interests, or a generic label when none were given.
    pub fn interests_label(&self) -> String {
        let picked: Vec<&str> = self
            .interests
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if picked.is_empty() {
            "general tourism".to_string()
        } else {
            picked.join(", ")
        }
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("{} '{}' is not a YYYY-MM-DD date: {}", field, value, e))
}

// ============================================================================
// Plan sections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flight {
    #[serde(deserialize_with = "lenient_string")]
    pub airline: String,
    #[serde(deserialize_with = "lenient_string")]
    pub flight_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub departure_time: String,
    #[serde(deserialize_with = "lenient_string")]
    pub arrival_time: String,
    #[serde(deserialize_with = "lenient_string")]
    pub price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Accommodation {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(deserialize_with = "lenient_string")]
    pub price_per_night: String,
    #[serde(deserialize_with = "lenient_string")]
    pub rating: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weather {
    #[serde(deserialize_with = "lenient_string")]
    pub forecast: String,
    #[serde(deserialize_with = "lenient_string")]
    pub temperature: String,
    #[serde(deserialize_with = "lenient_string")]
    pub precipitation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEvent {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(deserialize_with = "lenient_string")]
    pub price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Activity {
    #[serde(deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItineraryDay {
    #[serde(deserialize_with = "lenient_day")]
    pub day: u32,
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    pub activities: Vec<Activity>,
}

/// The validated six-section plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelPlan {
    #[serde(deserialize_with = "lenient_string")]
    pub trip_summary: String,
    pub flights: Vec<Flight>,
    pub accommodations: Vec<Accommodation>,
    pub weather: Weather,
    pub local_events: Vec<LocalEvent>,
    pub itinerary: Vec<ItineraryDay>,
}

/// A section key was present but its value had the wrong shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("section '{key}' is malformed: {detail}")]
pub struct SectionError {
    pub key: &'static str,
    pub detail: String,
}

impl TravelPlan {
    /// Section keys absent from `obj`, in canonical order.
    pub fn missing_sections(obj: &Map<String, Value>) -> Vec<&'static str> {
        SECTION_KEYS
            .iter()
            .copied()
            .filter(|k| !obj.contains_key(*k))
            .collect()
    }

    /// Build a plan section by section so a shape error names its key.
    /// Callers check `missing_sections` first; an absent key is reported as
    /// malformed here.
    pub fn from_sections(obj: &Map<String, Value>) -> Result<Self, SectionError> {
        Ok(Self {
            trip_summary: section(obj, "trip_summary")?,
            flights: section(obj, "flights")?,
            accommodations: section(obj, "accommodations")?,
            weather: section(obj, "weather")?,
            local_events: section(obj, "local_events")?,
            itinerary: section(obj, "itinerary")?,
        })
    }
}

fn section<T: serde::de::DeserializeOwned>(
    obj: &Map<String, Value>,
    key: &'static str,
) -> Result<T, SectionError> {
    let value = obj.get(key).cloned().ok_or_else(|| SectionError {
        key,
        detail: "missing".into(),
    })?;
    if key == "trip_summary" {
        // Any scalar is acceptable as a summary.
        let text = value_as_text(value);
        return serde_json::from_value(Value::String(text)).map_err(|e| SectionError {
            key,
            detail: e.to_string(),
        });
    }
    serde_json::from_value(value).map_err(|e| SectionError {
        key,
        detail: e.to_string(),
    })
}

fn value_as_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_as_text(Value::deserialize(d)?))
}

fn lenient_day<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

// ============================================================================
// Result
// ============================================================================

/// What `generate_plan` hands back. Serialized with a `status` tag; the
/// success variant carries the plan sections at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanResult {
    Success(TravelPlan),
    Error {
        kind: PlanErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_text: Option<String>,
    },
}

impl PlanResult {
    pub fn error(kind: PlanErrorKind, message: impl Into<String>) -> Self {
        PlanResult::Error {
            kind,
            message: message.into(),
            raw_text: None,
        }
    }

    pub fn error_with_raw(
        kind: PlanErrorKind,
        message: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        PlanResult::Error {
            kind,
            message: message.into(),
            raw_text: Some(raw_text.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PlanResult::Success(_))
    }

    pub fn error_kind(&self) -> Option<PlanErrorKind> {
        match self {
            PlanResult::Success(_) => None,
            PlanResult::Error { kind, .. } => Some(*kind),
        }
    }
}
