//! Exit codes following sysexits.h conventions.
//!
//! Schedulers and wrappers can tell a broken deployment (78) from a
//! backend outage (69) without parsing the message.

use preview_sync_core::SyncError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Backend unreachable or a listing failed.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Missing or invalid configuration.
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first synchronizer error in the chain
        let code = match err.chain().find_map(|e| e.downcast_ref::<SyncError>()) {
            Some(SyncError::ConfigError(_)) => CONFIG_ERROR,
            Some(e) if e.is_upstream() => NETWORK_ERROR,
            _ => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_error_maps_to_ex_config() {
        let err = anyhow::Error::new(SyncError::ConfigError("APPWRITE_PROJECT_ID".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, CONFIG_ERROR);
    }

    #[test]
    fn test_wrapped_upstream_error_maps_to_unavailable() {
        let err: anyhow::Result<()> =
            Err(SyncError::UpstreamFetchError("503".into())).context("Sync run failed");
        let exit = ExitCode::from_anyhow(&err.unwrap_err());
        assert_eq!(exit.code, NETWORK_ERROR);
        assert!(exit.message.unwrap().contains("Sync run failed"));
    }

    #[test]
    fn test_other_errors_are_general() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
        assert_eq!(ExitCode::success().code, SUCCESS);
    }
}
