//! In-memory backend for tests and local runs.
//!
//! Collections and buckets are kept ordered by id so cursor pagination
//! behaves deterministically. Generated ids increase monotonically, which
//! keeps inserted records at the end of every listing.
//! WARNING: nothing is persisted.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::appwrite::mime_for;
use super::Backend;
use crate::error::{Result, SyncError};
use crate::model::{Document, StoredFile, UNIQUE_ID};
use crate::pagination::PageRequest;

#[derive(Debug, Clone)]
struct StoredObject {
    file: StoredFile,
    bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertBody {
    document_id: String,
    data: Map<String, Value>,
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_documents: usize,
    pub list_files: usize,
    pub downloads: usize,
    pub exists_checks: usize,
    pub uploads: usize,
    pub inserts: usize,
    pub document_deletes: usize,
    pub file_deletes: usize,
}

#[derive(Default)]
struct Counters {
    list_documents: AtomicUsize,
    list_files: AtomicUsize,
    downloads: AtomicUsize,
    exists_checks: AtomicUsize,
    uploads: AtomicUsize,
    inserts: AtomicUsize,
    document_deletes: AtomicUsize,
    file_deletes: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Backend held entirely in memory.
#[derive(Default)]
pub struct MemoryBackend {
    collections: DashMap<String, BTreeMap<String, Document>>,
    buckets: DashMap<String, BTreeMap<String, StoredObject>>,
    next_id: AtomicU64,
    counters: Counters,
    failing_downloads: DashSet<String>,
    failing_checks: DashSet<String>,
    fail_listings: AtomicBool,
    fail_uploads: AtomicBool,
    fail_inserts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&self) -> String {
        format!("mem{:08}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    /// Store (or replace) a document as-is.
    pub fn put_document(&self, collection_id: &str, mut document: Document) {
        if document.created_at.is_none() {
            document.created_at = Some(Self::now());
        }
        self.collections
            .entry(collection_id.to_string())
            .or_default()
            .insert(document.id.clone(), document);
    }

    /// Store (or replace) a file under a caller-chosen id.
    pub fn put_file(&self, bucket_id: &str, file_id: &str, name: &str, bytes: Vec<u8>) -> StoredFile {
        let file = StoredFile {
            id: file_id.to_string(),
            name: name.to_string(),
            created_at: Some(Self::now()),
            size: bytes.len() as u64,
            mime_type: Some(mime_for(name).to_string()),
        };
        self.buckets
            .entry(bucket_id.to_string())
            .or_default()
            .insert(file.id.clone(), StoredObject {
                file: file.clone(),
                bytes,
            });
        file
    }

    /// Drop a file behind the synchronizer's back.
    pub fn remove_file(&self, bucket_id: &str, file_id: &str) -> bool {
        self.buckets
            .get_mut(bucket_id)
            .map(|mut bucket| bucket.remove(file_id).is_some())
            .unwrap_or(false)
    }

    /// Drop a document behind the synchronizer's back.
    pub fn remove_document(&self, collection_id: &str, document_id: &str) -> bool {
        self.collections
            .get_mut(collection_id)
            .map(|mut collection| collection.remove(document_id).is_some())
            .unwrap_or(false)
    }

    pub fn documents(&self, collection_id: &str) -> Vec<Document> {
        self.collections
            .get(collection_id)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn files(&self, bucket_id: &str) -> Vec<StoredFile> {
        self.buckets
            .get(bucket_id)
            .map(|b| b.values().map(|o| o.file.clone()).collect())
            .unwrap_or_default()
    }

    pub fn file_bytes(&self, bucket_id: &str, file_id: &str) -> Option<Vec<u8>> {
        self.buckets
            .get(bucket_id)
            .and_then(|b| b.get(file_id).map(|o| o.bytes.clone()))
    }

    pub fn has_file(&self, bucket_id: &str, file_id: &str) -> bool {
        self.buckets
            .get(bucket_id)
            .map(|b| b.contains_key(file_id))
            .unwrap_or(false)
    }

    /// Make downloads of `file_id` fail.
    pub fn fail_download(&self, file_id: &str) {
        self.failing_downloads.insert(file_id.to_string());
    }

    /// Make existence checks of `file_id` error out.
    pub fn fail_exists_check(&self, file_id: &str) {
        self.failing_checks.insert(file_id.to_string());
    }

    pub fn fail_listings(&self, fail: bool) {
        self.fail_listings.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            list_documents: c.list_documents.load(Ordering::SeqCst),
            list_files: c.list_files.load(Ordering::SeqCst),
            downloads: c.downloads.load(Ordering::SeqCst),
            exists_checks: c.exists_checks.load(Ordering::SeqCst),
            uploads: c.uploads.load(Ordering::SeqCst),
            inserts: c.inserts.load(Ordering::SeqCst),
            document_deletes: c.document_deletes.load(Ordering::SeqCst),
            file_deletes: c.file_deletes.load(Ordering::SeqCst),
        }
    }

    fn check_listing(&self) -> Result<()> {
        if self.fail_listings.load(Ordering::SeqCst) {
            return Err(SyncError::UpstreamFetchError(
                "List returned status 503 Service Unavailable".into(),
            ));
        }
        Ok(())
    }
}

/// Records after the cursor, in id order.
fn page_of<T: Clone>(map: Option<&BTreeMap<String, T>>, page: &PageRequest) -> Vec<T> {
    let Some(map) = map else {
        return Vec::new();
    };
    let lower = match &page.cursor_after {
        Some(cursor) => Bound::Excluded(cursor.clone()),
        None => Bound::Unbounded,
    };
    map.range((lower, Bound::Unbounded))
        .take(page.limit)
        .map(|(_, v)| v.clone())
        .collect()
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_documents(
        &self,
        collection_id: &str,
        page: &PageRequest,
    ) -> Result<Vec<Document>> {
        bump(&self.counters.list_documents);
        self.check_listing()?;
        let collection = self.collections.get(collection_id);
        Ok(page_of(collection.as_deref(), page))
    }

    async fn list_files(&self, bucket_id: &str, page: &PageRequest) -> Result<Vec<StoredFile>> {
        bump(&self.counters.list_files);
        self.check_listing()?;
        let bucket = self.buckets.get(bucket_id);
        Ok(page_of(bucket.as_deref(), page)
            .into_iter()
            .map(|o| o.file)
            .collect())
    }

    async fn download_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<u8>> {
        bump(&self.counters.downloads);
        if self.failing_downloads.contains(file_id) {
            return Err(SyncError::UpstreamFetchError(format!(
                "Download returned status 500 Internal Server Error: {file_id}"
            )));
        }
        self.file_bytes(bucket_id, file_id).ok_or_else(|| {
            SyncError::UpstreamFetchError(format!(
                "Download returned status 404 Not Found: {file_id}"
            ))
        })
    }

    async fn file_exists(&self, bucket_id: &str, file_id: &str) -> Result<bool> {
        bump(&self.counters.exists_checks);
        if self.failing_checks.contains(file_id) {
            return Err(SyncError::UpstreamFetchError(format!(
                "Existence check failed: {file_id}"
            )));
        }
        Ok(self.has_file(bucket_id, file_id))
    }

    async fn upload_file(
        &self,
        bucket_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredFile> {
        bump(&self.counters.uploads);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(SyncError::UpstreamUploadError(
                "Upload returned status 500 Internal Server Error".into(),
            ));
        }
        let id = self.generate_id();
        Ok(self.put_file(bucket_id, &id, file_name, bytes))
    }

    async fn insert_document(&self, collection_id: &str, body: Vec<u8>) -> Result<Document> {
        bump(&self.counters.inserts);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(SyncError::UpstreamUploadError(
                "Insert document returned status 400 Bad Request".into(),
            ));
        }
        let body: InsertBody = serde_json::from_slice(&body).map_err(|e| {
            SyncError::UpstreamUploadError(format!("Insert document body invalid: {e}"))
        })?;
        let id = if body.document_id == UNIQUE_ID {
            self.generate_id()
        } else {
            body.document_id
        };
        let document = Document {
            id,
            created_at: Some(Self::now()),
            fields: body.data,
        };
        self.put_document(collection_id, document.clone());
        Ok(document)
    }

    async fn delete_document(&self, collection_id: &str, document_id: &str) -> Result<()> {
        bump(&self.counters.document_deletes);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::DeleteError(
                "Delete document returned status 500 Internal Server Error".into(),
            ));
        }
        if self.remove_document(collection_id, document_id) {
            Ok(())
        } else {
            Err(SyncError::DeleteError(format!(
                "Delete document returned status 404 Not Found: {document_id}"
            )))
        }
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()> {
        bump(&self.counters.file_deletes);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::DeleteError(
                "Delete file returned status 500 Internal Server Error".into(),
            ));
        }
        if self.remove_file(bucket_id, file_id) {
            Ok(())
        } else {
            Err(SyncError::DeleteError(format!(
                "Delete file returned status 404 Not Found: {file_id}"
            )))
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("collections", &self.collections.len())
            .field("buckets", &self.buckets.len())
            .field("calls", &self.calls())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pages_follow_cursor() {
        let backend = MemoryBackend::new();
        for id in ["a", "b", "c"] {
            backend.put_document("docs", Document::new(id, Map::new()));
        }

        let first = backend
            .list_documents("docs", &PageRequest::first(2))
            .await
            .unwrap();
        assert_eq!(first.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);

        let next = PageRequest {
            limit: 2,
            cursor_after: Some("b".into()),
        };
        let second = backend.list_documents("docs", &next).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, "c");
        assert_eq!(backend.calls().list_documents, 2);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let backend = MemoryBackend::new();
        let page = backend
            .list_files("nothing", &PageRequest::first(10))
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_insert_generates_id() {
        let backend = MemoryBackend::new();
        let body = serde_json::to_vec(&json!({
            "documentId": "unique()",
            "data": { "originalImageId": "A" }
        }))
        .unwrap();
        let doc = backend.insert_document("previews", body).await.unwrap();
        assert!(doc.id.starts_with("mem"));
        assert_eq!(doc.str_field("originalImageId"), Some("A"));
        assert_eq!(backend.documents("previews").len(), 1);
    }

    #[tokio::test]
    async fn test_upload_check_delete() {
        let backend = MemoryBackend::new();
        let file = backend
            .upload_file("previews", "preview-A.webp", vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(file.mime_type.as_deref(), Some("image/webp"));
        assert!(backend.file_exists("previews", &file.id).await.unwrap());

        backend.delete_file("previews", &file.id).await.unwrap();
        assert!(!backend.file_exists("previews", &file.id).await.unwrap());
        assert!(backend.delete_file("previews", &file.id).await.is_err());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let backend = MemoryBackend::new();
        backend.put_file("originals", "A", "a.png", vec![0]);
        backend.fail_download("A");
        backend.fail_exists_check("A");
        assert!(backend.download_file("originals", "A").await.is_err());
        assert!(backend.file_exists("originals", "A").await.is_err());

        backend.fail_listings(true);
        assert!(backend
            .list_files("originals", &PageRequest::first(1))
            .await
            .is_err());
    }
}
