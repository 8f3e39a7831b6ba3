//! The synchronizer: list, diff, clean, generate.
//!
//! A run is a linear pipeline. Both listings must succeed or the run aborts;
//! after that every record is handled independently and its outcome folded
//! into a [`SummaryReport`]. Nothing is retried and nothing is locked, so two
//! concurrent runs may both generate a preview for the same image.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{AppwriteClient, Backend};
use crate::config::SyncConfig;
use crate::diff::{self, Orphan, SyncPlan};
use crate::error::{Result, SyncError};
use crate::model::{
    Document, InsertDocumentRequest, NewPreviewRecord, PreviewRecord, SourceImageRecord,
};
use crate::pagination;
use crate::preview::{self, PreviewOptions};

/// What happened to one unprocessed source record.
#[derive(Debug)]
pub enum RecordOutcome {
    /// Preview uploaded and metadata inserted.
    Converted {
        preview_id: String,
        document_id: String,
    },
    /// Download, encode or upload failed.
    Skipped(SyncError),
    /// Metadata payload over the size ceiling; nothing inserted.
    PayloadTooLarge { size: usize },
    /// Metadata insert rejected by the backend.
    InsertFailed(SyncError),
}

/// What happened to one orphaned preview record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub record_deleted: bool,
    /// `None` when there was no file left to delete.
    pub file_deleted: Option<bool>,
}

/// Counts returned by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub converted: usize,
    pub skipped: usize,
    pub cleaned: usize,
    pub clean_failed: usize,
    pub already_processed: usize,
    pub payload_too_large: usize,
    pub failed_inserts: usize,
    pub total_source: usize,
    pub total_target: usize,
}

impl SummaryReport {
    /// Start a report from the totals of a plan.
    pub fn from_plan(plan: &SyncPlan) -> Self {
        Self {
            already_processed: plan.already_processed,
            total_source: plan.total_source,
            total_target: plan.total_target,
            ..Default::default()
        }
    }

    pub fn record(mut self, outcome: &RecordOutcome) -> Self {
        match outcome {
            RecordOutcome::Converted { .. } => self.converted += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
            RecordOutcome::PayloadTooLarge { .. } => self.payload_too_large += 1,
            RecordOutcome::InsertFailed(_) => self.failed_inserts += 1,
        }
        self
    }

    pub fn record_cleanup(mut self, outcome: &CleanupOutcome) -> Self {
        if outcome.record_deleted {
            self.cleaned += 1;
        } else {
            self.clean_failed += 1;
        }
        self
    }
}

/// Reconciles the source collection with the preview collection.
pub struct Synchronizer {
    backend: Arc<dyn Backend>,
    config: SyncConfig,
}

impl Synchronizer {
    pub fn new(backend: Arc<dyn Backend>, config: SyncConfig) -> Self {
        Self { backend, config }
    }

    /// Synchronizer talking to the configured Appwrite project.
    pub fn from_config(config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let client = AppwriteClient::new(&config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Every source record, from the source collection or, in bucket mode,
    /// from the source bucket's file names. Undecodable documents are skipped.
    #[instrument(level = "debug", skip(self))]
    pub async fn list_sources(&self) -> Result<Vec<SourceImageRecord>> {
        let backend = self.backend.as_ref();
        let page_size = self.config.page_size;

        match &self.config.source.collection_id {
            Some(collection_id) => {
                let documents: Vec<Document> =
                    pagination::documents(backend, collection_id, page_size)
                        .try_collect()
                        .await?;
                Ok(documents
                    .iter()
                    .filter_map(|doc| match SourceImageRecord::from_document(doc) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            warn!(error = %e, "Ignoring source document");
                            None
                        }
                    })
                    .collect())
            }
            None => {
                let files: Vec<_> =
                    pagination::files(backend, &self.config.source.bucket_id, page_size)
                        .try_collect()
                        .await?;
                Ok(files.iter().map(SourceImageRecord::from_stored_file).collect())
            }
        }
    }

    /// Every preview record of the target collection.
    #[instrument(level = "debug", skip(self))]
    pub async fn list_targets(&self) -> Result<Vec<PreviewRecord>> {
        let documents: Vec<Document> = pagination::documents(
            self.backend.as_ref(),
            &self.config.target.collection_id,
            self.config.page_size,
        )
        .try_collect()
        .await?;
        Ok(documents.iter().map(PreviewRecord::from_document).collect())
    }

    /// List both sides and diff them without changing anything.
    #[instrument(level = "info", skip(self), fields(backend = self.backend.name()))]
    pub async fn plan(&self) -> Result<SyncPlan> {
        let sources = self.list_sources().await?;
        let targets = self.list_targets().await?;
        info!(
            sources = sources.len(),
            targets = targets.len(),
            "Listed collections"
        );

        let plan = diff::diff(
            self.backend.as_ref(),
            &self.config.target.bucket_id,
            sources,
            targets,
        )
        .await;

        info!(
            to_process = plan.to_process.len(),
            to_clean = plan.to_clean.len(),
            already_processed = plan.already_processed,
            "Computed sync plan"
        );
        Ok(plan)
    }

    /// Run one full reconciliation.
    ///
    /// Fails only when a listing fails; per-record failures are counted.
    #[instrument(level = "info", skip(self), fields(backend = self.backend.name()))]
    pub async fn run(&self) -> Result<SummaryReport> {
        let start = Instant::now();
        info!("Starting image preview sync");

        let plan = self.plan().await?;
        let report = SummaryReport::from_plan(&plan);

        let report = stream::iter(plan.to_clean)
            .then(|orphan| async move { self.delete_orphan(&orphan).await })
            .fold(report, |report, outcome| async move {
                report.record_cleanup(&outcome)
            })
            .await;

        let report = stream::iter(plan.to_process)
            .then(|source| async move { self.process_record(&source).await })
            .fold(report, |report, outcome| async move { report.record(&outcome) })
            .await;

        info!(
            converted = report.converted,
            skipped = report.skipped,
            cleaned = report.cleaned,
            already_processed = report.already_processed,
            payload_too_large = report.payload_too_large,
            failed_inserts = report.failed_inserts,
            total_ms = start.elapsed().as_millis() as u64,
            "Sync complete"
        );
        Ok(report)
    }

    /// Download an original, render its preview and upload it.
    /// Returns the id of the uploaded preview file.
    #[instrument(level = "debug", skip(self))]
    pub async fn generate_preview(&self, source_image_id: &str) -> Result<String> {
        let original = self
            .backend
            .download_file(&self.config.source.bucket_id, source_image_id)
            .await?;
        debug!(bytes = original.len(), "Downloaded original");

        let options = self.config.preview;
        let rendered = render_off_thread(original, options).await?;
        debug!(bytes = rendered.len(), "Rendered preview");

        let file = self
            .backend
            .upload_file(
                &self.config.target.bucket_id,
                &preview::preview_file_name(source_image_id),
                rendered,
            )
            .await?;
        info!(preview_id = %file.id, "Created preview");
        Ok(file.id)
    }

    /// Insert a preview record unless its payload is over the ceiling.
    #[instrument(level = "debug", skip(self, record), fields(original_image_id = %record.original_image_id))]
    pub async fn insert_preview_record(&self, record: &NewPreviewRecord) -> Result<Document> {
        let body = InsertDocumentRequest::unique(record).to_bytes()?;
        let limit = self.config.max_payload_bytes;
        if body.len() > limit {
            return Err(SyncError::PayloadTooLarge {
                size: body.len(),
                limit,
            });
        }
        self.backend
            .insert_document(&self.config.target.collection_id, body)
            .await
    }

    /// Delete an orphaned record, then its preview file if it may still exist.
    /// Both steps are attempted independently and never retried.
    #[instrument(level = "debug", skip(self, orphan), fields(record_id = %orphan.record.id, reason = %orphan.reason))]
    pub async fn delete_orphan(&self, orphan: &Orphan) -> CleanupOutcome {
        let record = &orphan.record;

        let record_deleted = match self
            .backend
            .delete_document(&self.config.target.collection_id, &record.id)
            .await
        {
            Ok(()) => {
                info!(record_id = %record.id, reason = %orphan.reason, "Deleted orphaned preview record");
                true
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Failed to delete orphaned preview record");
                false
            }
        };

        let file_deleted = if orphan.has_file() {
            Some(self.discard_preview(&record.preview_image_id).await)
        } else {
            None
        };

        CleanupOutcome {
            record_deleted,
            file_deleted,
        }
    }

    /// Generate, upload and record the preview of one source image.
    async fn process_record(&self, source: &SourceImageRecord) -> RecordOutcome {
        let preview_id = match self.generate_preview(&source.image_id).await {
            Ok(id) => id,
            Err(e) => {
                warn!(image_id = %source.image_id, error = %e, "Skipping image");
                return RecordOutcome::Skipped(e);
            }
        };

        let record = NewPreviewRecord::for_source(source, &preview_id);
        match self.insert_preview_record(&record).await {
            Ok(document) => {
                info!(image_id = %source.image_id, preview_id = %preview_id, "Inserted preview record");
                RecordOutcome::Converted {
                    preview_id,
                    document_id: document.id,
                }
            }
            Err(SyncError::PayloadTooLarge { size, limit }) => {
                warn!(image_id = %source.image_id, size, limit, "Preview record payload too large");
                self.discard_preview(&preview_id).await;
                RecordOutcome::PayloadTooLarge { size }
            }
            Err(e) => {
                error!(image_id = %source.image_id, error = %e, "Failed to insert preview record");
                self.discard_preview(&preview_id).await;
                RecordOutcome::InsertFailed(e)
            }
        }
    }

    /// Best-effort removal of a preview file.
    async fn discard_preview(&self, preview_id: &str) -> bool {
        match self
            .backend
            .delete_file(&self.config.target.bucket_id, preview_id)
            .await
        {
            Ok(()) => {
                debug!(preview_id, "Deleted preview file");
                true
            }
            Err(e) => {
                warn!(preview_id, error = %e, "Failed to delete preview file");
                false
            }
        }
    }
}

/// Image work is CPU-bound; keep it off the async worker threads.
async fn render_off_thread(original: Vec<u8>, options: PreviewOptions) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || preview::render_preview(&original, &options))
        .await
        .map_err(|e| SyncError::EncodeError(format!("Preview task failed: {e}")))?
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_folds_outcomes() {
        let outcomes = vec![
            RecordOutcome::Converted {
                preview_id: "f1".into(),
                document_id: "d1".into(),
            },
            RecordOutcome::Skipped(SyncError::EncodeError("bad".into())),
            RecordOutcome::PayloadTooLarge { size: 10 },
            RecordOutcome::InsertFailed(SyncError::UpstreamUploadError("no".into())),
            RecordOutcome::Converted {
                preview_id: "f2".into(),
                document_id: "d2".into(),
            },
        ];
        let report = outcomes
            .iter()
            .fold(SummaryReport::default(), |r, o| r.record(o));

        assert_eq!(report.converted, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.payload_too_large, 1);
        assert_eq!(report.failed_inserts, 1);
    }

    #[test]
    fn test_report_cleanup_counts() {
        let report = SummaryReport::default()
            .record_cleanup(&CleanupOutcome {
                record_deleted: true,
                file_deleted: Some(false),
            })
            .record_cleanup(&CleanupOutcome {
                record_deleted: false,
                file_deleted: None,
            });
        assert_eq!(report.cleaned, 1);
        assert_eq!(report.clean_failed, 1);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = SummaryReport {
            already_processed: 3,
            payload_too_large: 1,
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["alreadyProcessed"], 3);
        assert_eq!(value["payloadTooLarge"], 1);
        assert_eq!(value["failedInserts"], 0);
    }
}
