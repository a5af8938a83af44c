//! Health check handlers.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use watch_shop_core::HealthResponse;

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns `{"status": "OK", "time": ...}` while the process is up. Does not
/// check dependencies.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_owned(),
        time: Utc::now(),
    })
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
