//! Typed client interface to the storage/database backend.
//!
//! The synchronizer only ever talks to the backend through [`Backend`]:
//!
//! - **AppwriteClient** - REST implementation used in production
//! - **MemoryBackend** - in-memory implementation with fault injection, for tests

mod appwrite;
mod memory;

pub use appwrite::AppwriteClient;
pub use memory::{CallCounts, MemoryBackend};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Document, StoredFile};
use crate::pagination::PageRequest;

/// Operations the synchronizer needs from the backend.
///
/// Implementations must be thread-safe (`Send + Sync`). None of them retry;
/// a failed call is reported once and the caller decides what to skip.
#[async_trait]
pub trait Backend: Send + Sync {
    /// One page of documents from a collection, ordered by creation time.
    async fn list_documents(&self, collection_id: &str, page: &PageRequest)
        -> Result<Vec<Document>>;

    /// One page of files from a bucket, ordered by creation time.
    async fn list_files(&self, bucket_id: &str, page: &PageRequest) -> Result<Vec<StoredFile>>;

    /// Full contents of a stored file.
    async fn download_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<u8>>;

    /// Cheap existence check, without downloading the file.
    async fn file_exists(&self, bucket_id: &str, file_id: &str) -> Result<bool>;

    /// Store `bytes` under a backend-generated id.
    async fn upload_file(&self, bucket_id: &str, file_name: &str, bytes: Vec<u8>)
        -> Result<StoredFile>;

    /// Insert a document from an already-serialized request body.
    async fn insert_document(&self, collection_id: &str, body: Vec<u8>) -> Result<Document>;

    async fn delete_document(&self, collection_id: &str, document_id: &str) -> Result<()>;

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
