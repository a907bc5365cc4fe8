use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use opt_core::Space;
use opt_orchestrator::RestOptimiser;
use opt_wire::{HealthResponse, InitRequest, ObserveRequest, OptimisationConfig};

use crate::AppState;

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() }))).into_response()
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Validates an `OptimisationConfig` without starting a session, returning
/// the effective dimension and trial counts or a 400 with the validation
/// error (used by callers to surface config mistakes before connecting).
pub async fn config_preview(Json(config): Json<OptimisationConfig>) -> Response {
    let settings = config.settings();
    if let Err(error) = settings.validate() {
        return bad_request(error.to_string());
    }
    match Space::build(config.enabled_dimensions()) {
        Ok(space) => Json(json!({
            "parameters": space.len(),
            "trials": settings.trials,
        }))
        .into_response(),
        Err(error) => bad_request(error.to_string()),
    }
}

/// Builds the global optimiser and returns its first suggested point
/// directly, rather than a bare acknowledgement — callers get a single
/// `init` → `observe` → `observe` → ... loop with no separate suggest call.
pub async fn init(State(state): State<AppState>, Json(req): Json<InitRequest>) -> Response {
    let mut optimiser = match RestOptimiser::init(&req, &state.engine_config) {
        Ok(optimiser) => optimiser,
        Err(error) => return bad_request(error.to_string()),
    };
    let response = match optimiser.suggest() {
        Ok(response) => response,
        Err(error) => return bad_request(error.to_string()),
    };
    *state.rest_optimiser.lock().unwrap() = Some(optimiser);
    Json(response).into_response()
}

/// Registers an observation against the pending suggestion and returns the
/// next one in the same call (or `done: true` once the budget is spent).
pub async fn observe(State(state): State<AppState>, Json(req): Json<ObserveRequest>) -> Response {
    let mut guard = state.rest_optimiser.lock().unwrap();
    let Some(optimiser) = guard.as_mut() else {
        return bad_request("call /init before /observe");
    };
    if let Err(error) = optimiser.observe(&req) {
        return bad_request(error.to_string());
    }
    match optimiser.suggest() {
        Ok(response) => Json(response).into_response(),
        Err(error) => bad_request(error.to_string()),
    }
}

pub async fn best(State(state): State<AppState>) -> Response {
    let guard = state.rest_optimiser.lock().unwrap();
    let Some(optimiser) = guard.as_ref() else {
        return bad_request("call /init before /best");
    };
    match optimiser.best() {
        Some(response) => Json(response).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "no trial has passed its filters yet" }))).into_response(),
    }
}

pub async fn status(State(state): State<AppState>) -> Response {
    let guard = state.rest_optimiser.lock().unwrap();
    let Some(optimiser) = guard.as_ref() else {
        return bad_request("call /init before /status");
    };
    Json(optimiser.status()).into_response()
}

pub async fn history(State(state): State<AppState>) -> Response {
    let guard = state.rest_optimiser.lock().unwrap();
    let Some(optimiser) = guard.as_ref() else {
        return bad_request("call /init before /history");
    };
    Json(optimiser.history()).into_response()
}
