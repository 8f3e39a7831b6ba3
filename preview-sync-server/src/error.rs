//! API error handling module
//!
//! Maps synchronizer failures onto HTTP statuses with a JSON `{ error, code }` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use preview_sync_core::SyncError;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Sync run did not complete
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Backend failures → 502
            Self::Sync(e) if e.is_upstream() => StatusCode::BAD_GATEWAY,
            Self::Sync(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::Sync(e) => match e {
                SyncError::ConfigError(_) => "CONFIG_ERROR",
                SyncError::UpstreamFetchError(_) => "UPSTREAM_ERROR",
                SyncError::UpstreamUploadError(_) => "UPLOAD_ERROR",
                SyncError::DeleteError(_) => "DELETE_ERROR",
                SyncError::EncodeError(_) => "ENCODE_ERROR",
                SyncError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
                SyncError::SerializationError(_) => "SERIALIZATION_ERROR",
                SyncError::InvalidRecord { .. } => "INVALID_RECORD",
            },
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Sync(SyncError::ConfigError(_)) => "Synchronizer is not configured".to_string(),
            Self::Sync(e) if e.is_upstream() => "Backend request failed".to_string(),
            _ => "Sync failed".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let client_message = self.client_message();

        // Full details go to the log only
        if status == StatusCode::BAD_GATEWAY {
            tracing::warn!(status = %status, code = code, error = %self, "Upstream error");
        } else {
            tracing::error!(status = %status, code = code, error = %self, "Server error");
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let upstream = ApiError::from(SyncError::UpstreamFetchError("503".into()));
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(upstream.error_code(), "UPSTREAM_ERROR");

        let config = ApiError::from(SyncError::ConfigError("missing".into()));
        assert_eq!(config.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(config.error_code(), "CONFIG_ERROR");

        assert_eq!(
            ApiError::internal("join").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_message_hides_details() {
        let err = ApiError::from(SyncError::UpstreamFetchError("secret-host:443".into()));
        assert!(!err.client_message().contains("secret-host"));
    }
}
