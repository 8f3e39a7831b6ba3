//! Three-way diff between source images, preview records and preview files.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::model::{PreviewRecord, SourceImageRecord};

/// Why a preview record has to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OrphanReason {
    /// `originalImageId` matches no source record.
    MissingSource,
    /// The existence check answered that the preview file is gone.
    MissingPreviewFile,
    /// The existence check errored; the preview file may still exist.
    PreviewCheckFailed,
}

impl std::fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSource => write!(f, "source image missing"),
            Self::MissingPreviewFile => write!(f, "preview file missing"),
            Self::PreviewCheckFailed => write!(f, "preview file unverifiable"),
        }
    }
}

/// A preview record scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Orphan {
    pub record: PreviewRecord,
    pub reason: OrphanReason,
}

impl Orphan {
    /// Whether the preview file may still exist and should be deleted too.
    pub fn has_file(&self) -> bool {
        self.reason != OrphanReason::MissingPreviewFile && !self.record.preview_image_id.is_empty()
    }
}

/// Outcome of diffing both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    /// Sources without a verified preview.
    pub to_process: Vec<SourceImageRecord>,
    /// Preview records violating the reference invariant.
    pub to_clean: Vec<Orphan>,
    /// Sources that already have a verified preview.
    pub already_processed: usize,
    pub total_source: usize,
    pub total_target: usize,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.to_process.is_empty() && self.to_clean.is_empty()
    }
}

/// Existence check results for preview files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChecks {
    /// Preview ids the backend confirmed.
    pub live: HashSet<String>,
    /// Preview ids whose existence check errored.
    pub failed: HashSet<String>,
}

/// Classify records given the existence check results of their preview files.
///
/// Duplicate source ids are processed once.
pub fn classify(
    sources: Vec<SourceImageRecord>,
    targets: Vec<PreviewRecord>,
    checks: &FileChecks,
) -> SyncPlan {
    let total_source = sources.len();
    let total_target = targets.len();
    let source_ids: HashSet<&str> = sources.iter().map(|s| s.image_id.as_str()).collect();

    let mut verified: HashSet<String> = HashSet::new();
    let mut to_clean = Vec::new();
    for record in targets {
        let reason = if !source_ids.contains(record.original_image_id.as_str()) {
            Some(OrphanReason::MissingSource)
        } else if checks.failed.contains(&record.preview_image_id) {
            Some(OrphanReason::PreviewCheckFailed)
        } else if !checks.live.contains(&record.preview_image_id) {
            Some(OrphanReason::MissingPreviewFile)
        } else {
            None
        };

        match reason {
            Some(reason) => to_clean.push(Orphan { record, reason }),
            None => {
                verified.insert(record.original_image_id);
            }
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut already_processed = 0;
    let mut to_process = Vec::new();
    for source in sources {
        if !seen.insert(source.image_id.clone()) {
            continue;
        }
        if verified.contains(&source.image_id) {
            already_processed += 1;
        } else {
            to_process.push(source);
        }
    }

    SyncPlan {
        to_process,
        to_clean,
        already_processed,
        total_source,
        total_target,
    }
}

/// Check preview files and classify.
///
/// Only records whose original still exists are checked. A check that errors
/// makes the record an orphan whose file is still deleted best-effort.
pub async fn diff(
    backend: &dyn Backend,
    preview_bucket_id: &str,
    sources: Vec<SourceImageRecord>,
    targets: Vec<PreviewRecord>,
) -> SyncPlan {
    let source_ids: HashSet<&str> = sources.iter().map(|s| s.image_id.as_str()).collect();

    let mut checks = FileChecks::default();
    for record in &targets {
        if record.preview_image_id.is_empty()
            || !source_ids.contains(record.original_image_id.as_str())
        {
            continue;
        }
        match backend
            .file_exists(preview_bucket_id, &record.preview_image_id)
            .await
        {
            Ok(true) => {
                checks.live.insert(record.preview_image_id.clone());
            }
            Ok(false) => {
                debug!(record_id = %record.id, preview_id = %record.preview_image_id, "Preview file missing");
            }
            Err(e) => {
                warn!(
                    record_id = %record.id,
                    preview_id = %record.preview_image_id,
                    error = %e,
                    "Existence check failed, scheduling record and file for deletion"
                );
                checks.failed.insert(record.preview_image_id.clone());
            }
        }
    }

    classify(sources, targets, &checks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str) -> SourceImageRecord {
        SourceImageRecord {
            image_id: id.into(),
            prompt: format!("prompt {id}"),
            model: "flux".into(),
            created_at: String::new(),
            tags: vec![],
        }
    }

    fn preview(id: &str, original: &str, file: &str) -> PreviewRecord {
        PreviewRecord {
            id: id.into(),
            original_image_id: original.into(),
            preview_image_id: file.into(),
            prompt: String::new(),
            model: String::new(),
            created_at: String::new(),
            tags: vec![],
        }
    }

    fn live(ids: &[&str]) -> FileChecks {
        FileChecks {
            live: ids.iter().map(|s| s.to_string()).collect(),
            failed: HashSet::new(),
        }
    }

    #[test]
    fn test_new_source_is_processed() {
        let plan = classify(vec![source("A")], vec![], &live(&[]));
        assert_eq!(plan.to_process, vec![source("A")]);
        assert!(plan.to_clean.is_empty());
        assert_eq!(plan.already_processed, 0);
    }

    #[test]
    fn test_verified_preview_is_kept() {
        let plan = classify(
            vec![source("A")],
            vec![preview("p1", "A", "f1")],
            &live(&["f1"]),
        );
        assert!(plan.is_noop());
        assert_eq!(plan.already_processed, 1);
        assert_eq!(plan.total_target, 1);
    }

    #[test]
    fn test_missing_source_is_orphan() {
        let plan = classify(vec![], vec![preview("p1", "gone", "f1")], &live(&["f1"]));
        assert_eq!(plan.to_clean.len(), 1);
        assert_eq!(plan.to_clean[0].reason, OrphanReason::MissingSource);
        assert!(plan.to_clean[0].has_file());
    }

    #[test]
    fn test_missing_file_is_orphan_and_reprocessed() {
        let plan = classify(vec![source("A")], vec![preview("p1", "A", "f1")], &live(&[]));
        assert_eq!(plan.to_clean.len(), 1);
        assert_eq!(plan.to_clean[0].reason, OrphanReason::MissingPreviewFile);
        assert!(!plan.to_clean[0].has_file());
        assert_eq!(plan.to_process, vec![source("A")]);
    }

    #[test]
    fn test_failed_check_keeps_file_for_deletion() {
        let checks = FileChecks {
            live: HashSet::new(),
            failed: ["f1".to_string()].into_iter().collect(),
        };
        let plan = classify(vec![source("A")], vec![preview("p1", "A", "f1")], &checks);
        assert_eq!(plan.to_clean[0].reason, OrphanReason::PreviewCheckFailed);
        assert!(plan.to_clean[0].has_file());
        assert_eq!(plan.to_process, vec![source("A")]);
    }

    #[test]
    fn test_one_valid_duplicate_is_enough() {
        let plan = classify(
            vec![source("A")],
            vec![preview("p1", "A", "f1"), preview("p2", "A", "f2")],
            &live(&["f1", "f2"]),
        );
        assert!(plan.to_process.is_empty());
        assert!(plan.to_clean.is_empty());
        assert_eq!(plan.already_processed, 1);
    }

    #[test]
    fn test_duplicate_sources_processed_once() {
        let plan = classify(vec![source("A"), source("A")], vec![], &live(&[]));
        assert_eq!(plan.to_process.len(), 1);
        assert_eq!(plan.total_source, 2);
    }

    #[test]
    fn test_empty_reference_is_orphan() {
        let plan = classify(vec![source("A")], vec![preview("p1", "", "")], &live(&[]));
        assert_eq!(plan.to_clean[0].reason, OrphanReason::MissingSource);
        assert!(!plan.to_clean[0].has_file());
    }
}
