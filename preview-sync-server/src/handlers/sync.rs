//! Sync handler
//!
//! One request runs one full reconciliation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use preview_sync_core::SyncError;

use super::AppState;
use crate::config::ResponseMode;
use crate::error::ApiError;

/// POST / and POST /sync - Run one sync
///
/// Returns the summary report, or `204` in empty-response mode.
/// Per-record failures are counted in the report; only a failed listing
/// (502) or missing configuration (500) fails the request.
pub async fn sync_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let synchronizer = state
        .synchronizer
        .clone()
        .map_err(|reason| ApiError::Sync(SyncError::ConfigError(reason)))?;

    // Own task, so a dropped request never cuts a record between upload and insert
    let report = tokio::spawn(async move { synchronizer.run().await })
        .await
        .map_err(|e| ApiError::internal(format!("Sync task failed: {e}")))??;

    Ok(match state.response_mode {
        ResponseMode::Summary => Json(report).into_response(),
        ResponseMode::Empty => StatusCode::NO_CONTENT.into_response(),
    })
}
