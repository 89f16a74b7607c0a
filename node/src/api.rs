//! # Verification API
//!
//! Builds the axum router that exposes proof validation over HTTP.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path           | Description                              |
//! |--------|----------------|------------------------------------------|
//! | GET    | `/health`      | Liveness probe                           |
//! | GET    | `/status`      | Version, namespaces, counters            |
//! | POST   | `/v1/validate` | Validate a proof (v1 or v2)              |
//! | POST   | `/v1/migrate`  | Convert a proof to its v2 encoding       |
//! | POST   | `/v1/consent`  | Build the consent message for a DID      |
//!
//! `/v1/validate` answers 200 when the proof verifies, 422 when it is
//! well-formed but does not verify, 400 when it cannot be interpreted and
//! 502 when a provider or verification network failed.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use account_link::{
    migrate, ConsentMessage, ErrorClass, LinkDispatcher, LinkError, LinkProof,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub dispatcher: LinkDispatcher,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/v1/validate", post(validate_handler))
        .route("/v1/migrate", post(migrate_handler))
        .route("/v1/consent", post(consent_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    /// Namespaces this service can validate.
    pub namespaces: Vec<String>,
    pub proofs_verified: u64,
    pub proofs_rejected: u64,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
}

/// Body of `POST /v1/consent`.
#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    pub did: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Generic error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// HTTP status for a request that could not be answered.
pub fn error_status(err: &LinkError) -> StatusCode {
    match err.class() {
        ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
        ErrorClass::Upstream => StatusCode::BAD_GATEWAY,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the service is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: state.version.clone(),
        namespaces: state
            .dispatcher
            .namespaces()
            .into_iter()
            .map(str::to_owned)
            .collect(),
        proofs_verified: state.metrics.proofs_verified_total.get(),
        proofs_rejected: state.metrics.proofs_rejected_total.get(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /v1/validate`: body is the proof JSON, either version.
///
/// The body is taken as a string so malformed JSON is reported through the
/// same error taxonomy as every other bad proof.
async fn validate_handler(State(state): State<AppState>, body: String) -> Response {
    let timer = state.metrics.validation_latency_seconds.start_timer();
    let result = state.dispatcher.validate_json(&body).await;
    timer.observe_duration();

    match result {
        Ok(Some(proof)) => {
            state.metrics.proofs_verified_total.inc();
            (
                StatusCode::OK,
                Json(json!({ "verified": true, "proof": LinkProof::V2(proof) })),
            )
                .into_response()
        }
        Ok(None) => {
            state.metrics.proofs_rejected_total.inc();
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "verified": false })),
            )
                .into_response()
        }
        Err(err) => {
            let status = error_status(&err);
            if status == StatusCode::BAD_GATEWAY {
                state.metrics.upstream_errors_total.inc();
                tracing::warn!(error = %err, "validation failed upstream");
            } else {
                state.metrics.bad_requests_total.inc();
                tracing::debug!(error = %err, "validation request refused");
            }
            error_response(status, err)
        }
    }
}

/// `POST /v1/migrate`: returns the v2 encoding of the posted proof.
async fn migrate_handler(State(state): State<AppState>, body: String) -> Response {
    match LinkProof::from_json(&body).and_then(migrate) {
        Ok(proof) => (StatusCode::OK, Json(LinkProof::V2(proof))).into_response(),
        Err(err) => {
            state.metrics.bad_requests_total.inc();
            error_response(StatusCode::BAD_REQUEST, err)
        }
    }
}

/// `POST /v1/consent`: `{"did": ..., "timestamp"?: ...}`.
async fn consent_handler(State(state): State<AppState>, body: String) -> Response {
    match serde_json::from_str::<ConsentRequest>(&body) {
        Ok(req) => Json(ConsentMessage::with_timestamp(&req.did, req.timestamp)).into_response(),
        Err(err) => {
            state.metrics.bad_requests_total.inc();
            error_response(StatusCode::BAD_REQUEST, err)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
