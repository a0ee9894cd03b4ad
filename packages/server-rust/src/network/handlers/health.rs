//! Health, liveness, and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// Detailed health as JSON. Always 200; the `state` field says whether the
/// server is actually serving.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let backends: Vec<&str> = state
        .api
        .registry()
        .kinds()
        .into_iter()
        .map(|k| k.as_str())
        .collect();

    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "backends": backends,
    }))
}

/// Liveness probe: the process is up.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only in the `Ready` state.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
