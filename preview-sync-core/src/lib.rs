//! Preview Sync Core - keeps WebP previews in step with original images
//!
//! This crate reconciles a "source" collection of original images with a
//! "target" collection of preview records on an Appwrite backend:
//!
//! - Sources without a verified preview get one (download, resize to a fixed
//!   width, lossy WebP, upload, insert metadata)
//! - Preview records whose original or file is gone are deleted with their file
//! - Every run re-evaluates every record, so re-invoking is always safe
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use preview_sync_core::{MemoryBackend, SyncConfig, Synchronizer};
//!
//! # async fn example() -> preview_sync_core::Result<()> {
//! // In production, use Synchronizer::from_config(SyncConfig::from_env()?)
//! let backend = Arc::new(MemoryBackend::new());
//! let synchronizer = Synchronizer::new(backend, SyncConfig::default());
//!
//! let report = synchronizer.run().await?;
//! println!("converted {} previews", report.converted);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod pagination;
pub mod preview;
pub mod sync;

// Re-export main types for convenience
pub use backend::{AppwriteClient, Backend, CallCounts, MemoryBackend};
pub use config::{SourceConfig, SyncConfig, TargetConfig, MAX_PAYLOAD_BYTES};
pub use diff::{FileChecks, Orphan, OrphanReason, SyncPlan};
pub use error::{Result, SyncError};
pub use model::{
    Document, FileNameMetadata, NewPreviewRecord, PreviewRecord, SourceImageRecord, StoredFile,
    UNIQUE_ID,
};
pub use pagination::PageRequest;
pub use preview::{preview_file_name, render_preview, PreviewOptions};
pub use sync::{CleanupOutcome, RecordOutcome, SummaryReport, Synchronizer};
