use serde::{Deserialize, Serialize};

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    /// False when no model client could be built; every plan request will
    /// then fail with `model_unavailable`.
    pub model_configured: bool,
    /// Tool providers in catalog order.
    pub providers: Vec<String>,
    pub step_budget: usize,
}
