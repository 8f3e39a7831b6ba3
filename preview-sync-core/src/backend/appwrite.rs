//! Appwrite REST client.
//!
//! Talks to the Databases and Storage APIs with a server API key. Requests
//! are made exactly once; failures surface as [`SyncError`] variants that
//! say which side of the pipeline broke.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::Backend;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::model::{Document, StoredFile, UNIQUE_ID};
use crate::pagination::PageRequest;

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    documents: Vec<Document>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<StoredFile>,
}

/// REST client for one Appwrite project and database.
pub struct AppwriteClient {
    client: Client,
    endpoint: String,
    database_id: String,
}

impl AppwriteClient {
    /// Create a client authenticated with the configured project and key.
    #[instrument(level = "debug", skip_all, fields(endpoint = %config.endpoint))]
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Appwrite-Project", header_value(&config.project_id)?);
        let mut key = header_value(&config.api_key)?;
        key.set_sensitive(true);
        headers.insert("X-Appwrite-Key", key);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        info!("Appwrite client created");
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            database_id: config.database_id.clone(),
        })
    }

    fn documents_url(&self, collection_id: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint, self.database_id, collection_id
        )
    }

    fn files_url(&self, bucket_id: &str) -> String {
        format!("{}/storage/buckets/{}/files", self.endpoint, bucket_id)
    }

    fn file_url(&self, bucket_id: &str, file_id: &str) -> String {
        format!("{}/{}", self.files_url(bucket_id), file_id)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| SyncError::ConfigError(format!("Invalid header value: {e}")))
}

/// Query parameters for one page: limit, creation-time order, cursor.
pub(crate) fn list_queries(page: &PageRequest) -> Vec<(&'static str, String)> {
    let mut queries = vec![
        (
            "queries[]",
            json!({ "method": "limit", "values": [page.limit] }).to_string(),
        ),
        (
            "queries[]",
            json!({ "method": "orderAsc", "attribute": "$createdAt" }).to_string(),
        ),
    ];
    if let Some(cursor) = &page.cursor_after {
        queries.push((
            "queries[]",
            json!({ "method": "cursorAfter", "values": [cursor] }).to_string(),
        ));
    }
    queries
}

/// Pass successful responses through; turn anything else into `into_error`
/// carrying the status and response body.
async fn ensure_success(
    response: Response,
    what: &str,
    into_error: fn(String) -> SyncError,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        debug!(status = %status, "Received HTTP response");
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body = %body, "{what} rejected");
    Err(into_error(format!("{what} returned status {status}: {body}")))
}

#[async_trait]
impl Backend for AppwriteClient {
    #[instrument(level = "debug", skip(self, page), fields(cursor = ?page.cursor_after))]
    async fn list_documents(
        &self,
        collection_id: &str,
        page: &PageRequest,
    ) -> Result<Vec<Document>> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.documents_url(collection_id))
            .query(&list_queries(page))
            .send()
            .await
            .map_err(|e| SyncError::UpstreamFetchError(format!("List documents failed: {e}")))?;

        let list: DocumentList =
            ensure_success(response, "List documents", SyncError::UpstreamFetchError)
                .await?
                .json()
                .await
                .map_err(|e| {
                    SyncError::UpstreamFetchError(format!("Failed to parse document list: {e}"))
                })?;

        debug!(
            records = list.documents.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Listed documents"
        );
        Ok(list.documents)
    }

    #[instrument(level = "debug", skip(self, page), fields(cursor = ?page.cursor_after))]
    async fn list_files(&self, bucket_id: &str, page: &PageRequest) -> Result<Vec<StoredFile>> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.files_url(bucket_id))
            .query(&list_queries(page))
            .send()
            .await
            .map_err(|e| SyncError::UpstreamFetchError(format!("List files failed: {e}")))?;

        let list: FileList = ensure_success(response, "List files", SyncError::UpstreamFetchError)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::UpstreamFetchError(format!("Failed to parse file list: {e}")))?;

        debug!(
            records = list.files.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Listed files"
        );
        Ok(list.files)
    }

    #[instrument(level = "debug", skip(self))]
    async fn download_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/download", self.file_url(bucket_id, file_id));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::UpstreamFetchError(format!("Download failed: {e}")))?;

        let bytes = ensure_success(response, "Download", SyncError::UpstreamFetchError)
            .await?
            .bytes()
            .await
            .map_err(|e| SyncError::UpstreamFetchError(format!("Failed to read download: {e}")))?;

        debug!(bytes = bytes.len(), "Downloaded file");
        Ok(bytes.to_vec())
    }

    #[instrument(level = "debug", skip(self))]
    async fn file_exists(&self, bucket_id: &str, file_id: &str) -> Result<bool> {
        let url = format!("{}/view", self.file_url(bucket_id, file_id));
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| SyncError::UpstreamFetchError(format!("Existence check failed: {e}")))?;

        let status = response.status();
        debug!(status = %status, "Checked file existence");
        Ok(status.is_success())
    }

    #[instrument(level = "debug", skip(self, bytes), fields(bytes = bytes.len()))]
    async fn upload_file(
        &self,
        bucket_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredFile> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|e| SyncError::UpstreamUploadError(format!("Invalid MIME type: {e}")))?;
        let form = Form::new().text("fileId", UNIQUE_ID).part("file", part);

        let response = self
            .client
            .post(self.files_url(bucket_id))
            .multipart(form)
            .send()
            .await
            .map_err(|e| SyncError::UpstreamUploadError(format!("Upload failed: {e}")))?;

        let file: StoredFile = ensure_success(response, "Upload", SyncError::UpstreamUploadError)
            .await?
            .json()
            .await
            .map_err(|e| {
                SyncError::UpstreamUploadError(format!("Failed to parse upload response: {e}"))
            })?;

        debug!(file_id = %file.id, "Uploaded file");
        Ok(file)
    }

    #[instrument(level = "debug", skip(self, body), fields(bytes = body.len()))]
    async fn insert_document(&self, collection_id: &str, body: Vec<u8>) -> Result<Document> {
        let response = self
            .client
            .post(self.documents_url(collection_id))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::UpstreamUploadError(format!("Insert failed: {e}")))?;

        ensure_success(response, "Insert document", SyncError::UpstreamUploadError)
            .await?
            .json()
            .await
            .map_err(|e| {
                SyncError::UpstreamUploadError(format!("Failed to parse insert response: {e}"))
            })
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_document(&self, collection_id: &str, document_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.documents_url(collection_id), document_id);
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| SyncError::DeleteError(format!("Delete document failed: {e}")))?;
        ensure_success(response, "Delete document", SyncError::DeleteError).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.file_url(bucket_id, file_id))
            .send()
            .await
            .map_err(|e| SyncError::DeleteError(format!("Delete file failed: {e}")))?;
        ensure_success(response, "Delete file", SyncError::DeleteError).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "appwrite"
    }
}

/// MIME type for an uploaded file, from its extension.
pub(crate) fn mime_for(file_name: &str) -> &'static str {
    match file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("webp") => "image/webp",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AppwriteClient {
        let config = SyncConfig {
            endpoint: "https://cloud.example.test/v1/".into(),
            project_id: "project".into(),
            api_key: "key".into(),
            database_id: "db".into(),
            ..Default::default()
        };
        AppwriteClient::new(&config).unwrap()
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.documents_url("previews"),
            "https://cloud.example.test/v1/databases/db/collections/previews/documents"
        );
        assert_eq!(
            client.file_url("bucket", "f1"),
            "https://cloud.example.test/v1/storage/buckets/bucket/files/f1"
        );
    }

    #[test]
    fn test_first_page_queries() {
        let queries = list_queries(&PageRequest::first(100));
        assert_eq!(queries.len(), 2);
        assert!(queries.iter().all(|(name, _)| *name == "queries[]"));
        assert_eq!(queries[0].1, r#"{"method":"limit","values":[100]}"#);
        assert!(queries[1].1.contains("orderAsc"));
    }

    #[test]
    fn test_cursor_query() {
        let page = PageRequest {
            limit: 50,
            cursor_after: Some("doc42".into()),
        };
        let queries = list_queries(&page);
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[2].1, r#"{"method":"cursorAfter","values":["doc42"]}"#);
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("preview-a.webp"), "image/webp");
        assert_eq!(mime_for("photo.JPG"), "image/jpeg");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_rejects_invalid_header() {
        let config = SyncConfig {
            api_key: "bad\nkey".into(),
            ..Default::default()
        };
        assert!(matches!(
            AppwriteClient::new(&config),
            Err(SyncError::ConfigError(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires network access and Appwrite credentials"]
    async fn test_real_listing() {
        let config = SyncConfig::from_env().unwrap();
        let client = AppwriteClient::new(&config).unwrap();
        let page = PageRequest::first(1);
        assert!(client
            .list_files(&config.source.bucket_id, &page)
            .await
            .is_ok());
    }
}
