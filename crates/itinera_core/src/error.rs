use serde::{Deserialize, Serialize};

/// Machine-readable failure kinds surfaced in `PlanResult::Error`.
///
/// Only the fatal kinds ever reach a caller; the tool- and intent-level kinds
/// are absorbed by the reasoning loop as observations and exist here so logs
/// and diagnostics share one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum PlanErrorKind {
    #[error("language model unavailable")]
    ModelUnavailable,
    #[error("tool provider unavailable")]
    ProviderUnavailable,
    #[error("tool not found")]
    ToolNotFound,
    #[error("invalid tool arguments")]
    InvalidArguments,
    #[error("tool call timed out")]
    ToolTimeout,
    #[error("malformed model intent")]
    MalformedIntent,
    #[error("step budget exhausted")]
    LoopExhausted,
    #[error("final answer failed extraction")]
    ExtractionInvalid,
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    #[error("invalid trip request")]
    InvalidRequest,
}

impl PlanErrorKind {
    /// Fatal kinds abort the request; the rest are recovered inside the loop
    /// or reported after extraction.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            PlanErrorKind::ModelUnavailable
                | PlanErrorKind::ProviderUnavailable
                | PlanErrorKind::DeadlineExceeded
                | PlanErrorKind::InvalidRequest
        )
    }
}
