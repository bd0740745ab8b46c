use crate::types::HealthReport;
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use itinera_core::error::PlanErrorKind;
use itinera_core::plan::{PlanResult, TripParameters};
use itinera_reasoning::PlanOrchestrator;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
struct AppState {
    planner: Arc<PlanOrchestrator>,
}

/// The planning HTTP API.
///
/// - `POST /generate-travel-plan` — trip parameters in, `PlanResult` out
/// - `GET /health` — liveness
/// - `GET /status` — model and provider summary
pub struct GatewayServer {
    planner: Arc<PlanOrchestrator>,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(planner: Arc<PlanOrchestrator>, host: &str, port: u16) -> Self {
        Self {
            planner,
            host: host.to_string(),
            port,
        }
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            planner: self.planner.clone(),
        };
        Router::new()
            .route("/health", get(health))
            .route("/status", get(status))
            .route("/generate-travel-plan", post(generate_travel_plan))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until the process is stopped.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Gateway failed to bind {}", addr))?;
        tracing::info!("Gateway listening on {}", addr);
        axum::serve(listener, self.router())
            .await
            .context("Gateway server error")
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok".into(),
        model_configured: state.planner.has_model(),
        providers: state.planner.provider_names(),
        step_budget: state.planner.config().step_budget,
    })
}

/// POST /generate-travel-plan
///
/// Planning failures are reported in the body with status 200. Only a body
/// that does not decode as trip parameters gets a 4xx.
async fn generate_travel_plan(
    State(state): State<AppState>,
    payload: Result<Json<TripParameters>, JsonRejection>,
) -> (StatusCode, Json<PlanResult>) {
    let trip = match payload {
        Ok(Json(trip)) => trip,
        Err(rejection) => {
            tracing::warn!("Rejected plan request body: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(PlanResult::error(
                    PlanErrorKind::InvalidRequest,
                    rejection.body_text(),
                )),
            );
        }
    };

    tracing::info!(
        "Plan request: {} → {} ({} to {})",
        trip.origin,
        trip.destination,
        trip.start_date,
        trip.end_date
    );
    let result = state.planner.generate_plan(&trip).await;
    if let Some(kind) = result.error_kind() {
        if kind.is_fatal() {
            tracing::error!("Plan request aborted: {}", kind);
        } else {
            tracing::warn!("Plan request failed: {}", kind);
        }
    }
    (StatusCode::OK, Json(result))
}
