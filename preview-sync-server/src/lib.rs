//! Preview Sync Server Library - HTTP entry point for the preview synchronizer
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{Config, ResponseMode};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
