//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::time::Duration;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers::{health, sync_handler};
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState, config: &Config) -> Router {
    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    Router::new()
        .route("/", post(sync_handler))
        .route("/sync", post(sync_handler))
        .route("/health", get(health))
        .with_state(state)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
}
