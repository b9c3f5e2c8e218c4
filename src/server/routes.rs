//! Axum route handlers for the giftwise HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`            — Returns `{"status": "ok", "version": ..., "service": "giftwise"}`
//! - `POST /api/ai/openrouter` — Runs one orchestrator action
//! - `GET  /api/ai/openrouter` — Lists the provider's models

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::llms::{GatewayError, ModelGateway};
use crate::orchestrator::{ErrorKind, Orchestrator, OrchestratorSettings, Outcome};

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ModelGateway>, settings: OrchestratorSettings) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(gateway, settings)),
        }
    }

    /// State backed by the OpenRouter gateway described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            orchestrator: Arc::new(Orchestrator::from_config(config)?),
        })
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/ai/openrouter",
            get(list_models_handler).post(orchestrate_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP status for a failure of the given kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Configuration => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Provider | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(outcome: Outcome) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match outcome.error_kind() {
        None => Ok(Json(outcome.into_envelope())),
        Some(kind) => Err((status_for(kind), Json(outcome.into_envelope()))),
    }
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "giftwise",
    }))
}

/// POST /api/ai/openrouter — `{action, ...params}`.
///
/// Success: `{success: true, ...payload}` with 200. Failure:
/// `{success: false, error, details?}` with 400, 409 or 500.
async fn orchestrate_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::info!("Rejected request body: {}", rejection.body_text());
            let outcome = Outcome::failure(
                ErrorKind::Validation,
                format!("Invalid request body: {}", rejection.body_text()),
            );
            return respond(outcome);
        }
    };

    respond(state.orchestrator.handle(body).await)
}

/// GET /api/ai/openrouter — `{success: true, models: [...]}`.
async fn list_models_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    respond(state.orchestrator.list_models().await)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
