//! Health probe.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Current server time.
    pub timestamp: chrono::DateTime<Utc>,
    /// Registry program this process talks to.
    pub program_address: String,
}

/// Liveness check: 200 OK whenever the process is running. Does not touch
/// the ledger.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
            program_address: state.program_address,
        }),
    )
}
