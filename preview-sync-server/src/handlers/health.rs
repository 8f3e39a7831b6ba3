//! Health check handler

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// "healthy", or "unconfigured" when sync requests would fail
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
}

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.synchronizer.is_ok() {
        "healthy"
    } else {
        "unconfigured"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        service: "preview-sync-server",
    })
}
