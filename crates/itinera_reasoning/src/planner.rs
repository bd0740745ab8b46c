//! Top-level entry: trip parameters in, `PlanResult` out.

use crate::catalog::ToolCatalog;
use crate::extraction::{extract, ExtractionOutcome};
use crate::invoker::ToolInvoker;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::PromptBuilder;
use crate::react_loop::{LlmReasoner, LoopFailure, LoopResult, Reasoner, ReasoningLoop};
use crate::scratchpad::Scratchpad;
use itinera_core::config::PlannerConfig;
use itinera_core::error::PlanErrorKind;
use itinera_core::plan::{PlanResult, TripParameters};
use itinera_core::tools::{ToolErrorKind, ToolProvider};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Runs one planning request end to end. Shared across concurrent requests;
/// each call builds its own catalog and scratchpad.
pub struct PlanOrchestrator {
    reasoner: Option<Arc<dyn Reasoner>>,
    providers: Vec<Arc<dyn ToolProvider>>,
    config: PlannerConfig,
}

impl PlanOrchestrator {
    /// `providers` order decides which provider owns a duplicated tool name.
    pub fn new(
        reasoner: Option<Arc<dyn Reasoner>>,
        providers: Vec<Arc<dyn ToolProvider>>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            reasoner,
            providers,
            config,
        }
    }

    pub fn with_llm(
        client: Option<Arc<dyn LlmClient>>,
        params: CompletionParams,
        providers: Vec<Arc<dyn ToolProvider>>,
        config: PlannerConfig,
    ) -> Self {
        let reasoner = client.map(|c| Arc::new(LlmReasoner::new(c, params)) as Arc<dyn Reasoner>);
        Self::new(reasoner, providers, config)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn has_model(&self) -> bool {
        self.reasoner.is_some()
    }

    /// Provider names in catalog order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn generate_plan(&self, trip: &TripParameters) -> PlanResult {
        let span = tracing::info_span!(
            "generate_plan",
            request_id = %Uuid::new_v4(),
            origin = %trip.origin,
            destination = %trip.destination,
        );
        self.generate_plan_inner(trip).instrument(span).await
    }

    async fn generate_plan_inner(&self, trip: &TripParameters) -> PlanResult {
        let Some(reasoner) = self.reasoner.clone() else {
            tracing::error!("No language model configured");
            return PlanResult::error(
                PlanErrorKind::ModelUnavailable,
                "no language model configured; check the API key and provider settings",
            );
        };

        if let Err(reason) = trip.validate() {
            tracing::warn!("Rejected trip request: {}", reason);
            return PlanResult::error(PlanErrorKind::InvalidRequest, reason);
        }

        let deadline = self.config.request_deadline().map(|d| Instant::now() + d);

        let build = ToolCatalog::build(&self.providers, self.config.on_provider_unavailable);
        let built = match deadline {
            Some(at) => match tokio::time::timeout_at(at, build).await {
                Ok(built) => built,
                Err(_) => {
                    tracing::error!("Deadline reached during tool discovery");
                    return PlanResult::error(
                        PlanErrorKind::DeadlineExceeded,
                        "request deadline exceeded during tool discovery",
                    );
                }
            },
            None => build.await,
        };
        let catalog = match built {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!("Tool discovery failed: {}", e);
                return PlanResult::error(PlanErrorKind::ProviderUnavailable, e.to_string());
            }
        };
        tracing::info!(
            "Loaded {} tool(s): {:?}",
            catalog.len(),
            catalog.describe_all().iter().map(|d| &d.name).collect::<Vec<_>>()
        );

        let invoker = ToolInvoker::new(Arc::new(catalog), self.config.tool_timeout());
        let reasoning = ReasoningLoop::new(reasoner, invoker, self.config.step_budget);
        let task = PromptBuilder::task(trip);

        let run = reasoning.run(&task, deadline).await;
        log_absorbed_errors(&run.scratchpad);

        match run.result {
            LoopResult::Finished(text) => match extract(&text) {
                ExtractionOutcome::Valid(plan) => {
                    tracing::info!(
                        "Travel plan extracted after {} step(s), {} tool call(s)",
                        run.steps,
                        run.scratchpad.actions().count()
                    );
                    PlanResult::Success(plan)
                }
                ExtractionOutcome::Invalid { reason, raw_text } => PlanResult::error_with_raw(
                    PlanErrorKind::ExtractionInvalid,
                    format!("failed to parse JSON output: {}", reason),
                    raw_text,
                ),
            },
            LoopResult::Exhausted(text) => match extract(&text) {
                ExtractionOutcome::Valid(plan) => {
                    tracing::info!("Step budget exhausted, best-effort output held a valid plan");
                    PlanResult::Success(plan)
                }
                ExtractionOutcome::Invalid { reason, raw_text } => PlanResult::error_with_raw(
                    PlanErrorKind::LoopExhausted,
                    format!(
                        "step budget of {} exhausted without a final answer ({})",
                        self.config.step_budget, reason
                    ),
                    raw_text,
                ),
            },
            LoopResult::Failed(failure) => {
                let (kind, message) = match failure {
                    LoopFailure::Model(message) => (PlanErrorKind::ModelUnavailable, message),
                    LoopFailure::DeadlineExceeded => (
                        PlanErrorKind::DeadlineExceeded,
                        "request deadline exceeded".to_string(),
                    ),
                };
                // Carry whatever the model said last, if it said anything.
                match run.last_reply {
                    Some(raw) => PlanResult::error_with_raw(kind, message, raw),
                    None => PlanResult::error(kind, message),
                }
            }
        }
    }
}

/// Error kinds the loop recovered from, for the request log.
fn absorbed_kind(entry_outcome: Option<ToolErrorKind>) -> Option<PlanErrorKind> {
    match entry_outcome? {
        ToolErrorKind::NotFound => Some(PlanErrorKind::ToolNotFound),
        ToolErrorKind::InvalidArguments => Some(PlanErrorKind::InvalidArguments),
        ToolErrorKind::Timeout => Some(PlanErrorKind::ToolTimeout),
        ToolErrorKind::Transient | ToolErrorKind::Permanent => None,
    }
}

fn absorbed_errors(scratchpad: &Scratchpad) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in scratchpad.entries() {
        let kind = if entry.is_noop() {
            Some(PlanErrorKind::MalformedIntent)
        } else {
            absorbed_kind(entry.outcome)
        };
        if let Some(kind) = kind {
            *counts.entry(kind.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn log_absorbed_errors(scratchpad: &Scratchpad) {
    let counts = absorbed_errors(scratchpad);
    if !counts.is_empty() {
        tracing::info!("Recovered inside the loop: {:?}", counts);
    }
}
