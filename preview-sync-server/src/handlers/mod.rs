//! HTTP request handlers

pub mod health;
pub mod sync;

pub use crate::state::AppState;
pub use health::{health, HealthResponse};
pub use sync::sync_handler;
