//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use preview_sync_core::{SyncConfig, Synchronizer};

use crate::config::ResponseMode;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Synchronizer, or the reason it could not be configured
    pub synchronizer: Result<Arc<Synchronizer>, String>,
    /// Body of a successful sync response
    pub response_mode: ResponseMode,
}

impl AppState {
    pub fn new(synchronizer: Synchronizer, response_mode: ResponseMode) -> Self {
        Self {
            synchronizer: Ok(Arc::new(synchronizer)),
            response_mode,
        }
    }

    /// State whose sync requests fail with a configuration error.
    pub fn unconfigured(reason: impl Into<String>, response_mode: ResponseMode) -> Self {
        Self {
            synchronizer: Err(reason.into()),
            response_mode,
        }
    }

    /// Build the synchronizer from environment variables.
    ///
    /// A bad configuration does not stop the server; it is reported on every
    /// sync request instead so the platform surfaces it.
    pub fn from_env(response_mode: ResponseMode) -> Self {
        match SyncConfig::from_env().and_then(Synchronizer::from_config) {
            Ok(synchronizer) => {
                tracing::info!(config = ?synchronizer.config(), "Synchronizer configured");
                Self::new(synchronizer, response_mode)
            }
            Err(e) => {
                tracing::error!(error = %e, "Synchronizer not configured");
                Self::unconfigured(e.to_string(), response_mode)
            }
        }
    }
}
