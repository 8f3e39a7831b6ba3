//! Synchronizer configuration.
//!
//! Everything the job needs to reach the backend lives in one immutable
//! [`SyncConfig`], loaded from environment variables with sensible defaults
//! and handed to the synchronizer at construction.

use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::preview::{PreviewOptions, MAX_WEBP_DIMENSION};

/// Default Appwrite API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://syd.cloud.appwrite.io/v1";

/// Records fetched per list request.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Backend document size ceiling (16,000 KB).
pub const MAX_PAYLOAD_BYTES: usize = 16_000 * 1024;

/// Default request timeout for backend calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where original images come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Bucket holding the original image files.
    pub bucket_id: String,
    /// Collection of source image records. When unset, source records are
    /// derived from the bucket's file listing instead.
    pub collection_id: Option<String>,
}

/// Where previews and their metadata are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub bucket_id: String,
    pub collection_id: String,
}

/// Immutable configuration for one synchronizer.
#[derive(Clone)]
pub struct SyncConfig {
    /// API base URL, without trailing slash
    pub endpoint: String,
    /// Project the API key belongs to
    pub project_id: String,
    /// Server API key
    pub api_key: String,
    /// Database holding both collections
    pub database_id: String,
    pub source: SourceConfig,
    pub target: TargetConfig,
    /// Records per list request
    pub page_size: usize,
    /// Preview width and WebP quality
    pub preview: PreviewOptions,
    /// Serialized metadata payload ceiling in bytes
    pub max_payload_bytes: usize,
    /// Per-request timeout for backend calls
    pub timeout: Duration,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .field("database_id", &self.database_id)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("page_size", &self.page_size)
            .field("preview", &self.preview)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project_id: String::new(),
            api_key: String::new(),
            database_id: "default".to_string(),
            source: SourceConfig {
                bucket_id: "originals".to_string(),
                collection_id: Some("images".to_string()),
            },
            target: TargetConfig {
                bucket_id: "previews".to_string(),
                collection_id: "previews".to_string(),
            },
            page_size: DEFAULT_PAGE_SIZE,
            preview: PreviewOptions::default(),
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Required: `APPWRITE_PROJECT_ID`, `APPWRITE_API_KEY` (or the legacy
    /// `APIWRITE_API_KEY`), `APPWRITE_DATABASE_ID`, `SOURCE_BUCKET_ID`,
    /// `TARGET_BUCKET_ID`, `TARGET_COLLECTION_ID`.
    ///
    /// Optional: `APPWRITE_ENDPOINT`, `SOURCE_COLLECTION_ID`, `PAGE_SIZE`,
    /// `PREVIEW_WIDTH`, `PREVIEW_QUALITY`, `REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            var(name).ok_or_else(|| {
                SyncError::ConfigError(format!("{name} environment variable not set"))
            })
        };

        let api_key = var("APPWRITE_API_KEY")
            .or_else(|| var("APIWRITE_API_KEY"))
            .ok_or_else(|| {
                SyncError::ConfigError("APPWRITE_API_KEY environment variable not set".into())
            })?;

        let endpoint = var("APPWRITE_ENDPOINT")
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let page_size = parse_or(var("PAGE_SIZE"), "PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let defaults = PreviewOptions::default();
        let preview = PreviewOptions {
            width: parse_or(var("PREVIEW_WIDTH"), "PREVIEW_WIDTH", defaults.width)?,
            quality: parse_or(var("PREVIEW_QUALITY"), "PREVIEW_QUALITY", defaults.quality)?,
        };
        let timeout_secs = parse_or(
            var("REQUEST_TIMEOUT_SECS"),
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_TIMEOUT.as_secs(),
        )?;

        let config = Self {
            endpoint,
            project_id: required("APPWRITE_PROJECT_ID")?,
            api_key,
            database_id: required("APPWRITE_DATABASE_ID")?,
            source: SourceConfig {
                bucket_id: required("SOURCE_BUCKET_ID")?,
                collection_id: var("SOURCE_COLLECTION_ID"),
            },
            target: TargetConfig {
                bucket_id: required("TARGET_BUCKET_ID")?,
                collection_id: required("TARGET_COLLECTION_ID")?,
            },
            page_size,
            preview,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            timeout: Duration::from_secs(timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the synchronizer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SyncError::ConfigError("PAGE_SIZE must be at least 1".into()));
        }
        if self.preview.width == 0 || self.preview.width > MAX_WEBP_DIMENSION {
            return Err(SyncError::ConfigError(format!(
                "PREVIEW_WIDTH must be within 1..={MAX_WEBP_DIMENSION}, got {}",
                self.preview.width
            )));
        }
        if !(0.0..=100.0).contains(&self.preview.quality) {
            return Err(SyncError::ConfigError(format!(
                "PREVIEW_QUALITY must be within 0..=100, got {}",
                self.preview.quality
            )));
        }
        Ok(())
    }

    /// Whether source records are derived from the bucket listing.
    pub fn uses_bucket_source(&self) -> bool {
        self.source.collection_id.is_none()
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, name: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SyncError::ConfigError(format!("{name} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}
