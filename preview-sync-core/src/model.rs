//! Records exchanged with the backend.
//!
//! The backend returns loosely-typed documents; [`SourceImageRecord`] and
//! [`PreviewRecord`] are decoded from them, and [`NewPreviewRecord`] is what
//! gets written back.

use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};

/// Sentinel asking the backend to generate a new identifier.
pub const UNIQUE_ID: &str = "unique()";

/// Anything that can serve as a pagination cursor.
pub trait Identified {
    fn cursor_id(&self) -> &str;
}

/// A raw backend document: system attributes plus arbitrary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            fields,
        }
    }

    /// String attribute, if present and a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// String-array attribute; non-string entries are ignored.
    pub fn string_list(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Identified for Document {
    fn cursor_id(&self) -> &str {
        &self.id
    }
}

/// A file stored in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "sizeOriginal", default)]
    pub size: u64,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

impl Identified for StoredFile {
    fn cursor_id(&self) -> &str {
        &self.id
    }
}

/// An original image, created upstream and never modified here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceImageRecord {
    pub image_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SourceImageRecord {
    /// Decode a source collection document.
    ///
    /// `imageId` is required; `createdAt` falls back to the document's own
    /// creation time.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let image_id = doc
            .str_field("imageId")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::InvalidRecord {
                id: doc.id.clone(),
                reason: "missing imageId".into(),
            })?;

        let created_at = doc
            .str_field("createdAt")
            .map(str::to_string)
            .or_else(|| doc.created_at.clone())
            .unwrap_or_default();

        Ok(Self {
            image_id: image_id.to_string(),
            prompt: doc.str_field("prompt").unwrap_or_default().to_string(),
            model: doc.str_field("model").unwrap_or_default().to_string(),
            created_at,
            tags: doc.string_list("tags"),
        })
    }

    /// Derive a source record from a bucket file whose name encodes
    /// `prompt_model_tag1+tag2.ext`.
    pub fn from_stored_file(file: &StoredFile) -> Self {
        let meta = FileNameMetadata::parse(&file.name);
        Self {
            image_id: file.id.clone(),
            prompt: meta.prompt,
            model: meta.model,
            created_at: file
                .created_at
                .as_deref()
                .map(normalize_timestamp)
                .unwrap_or_default(),
            tags: meta.tags,
        }
    }
}

/// Metadata recovered from an original file's name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileNameMetadata {
    pub prompt: String,
    pub model: String,
    pub tags: Vec<String>,
}

impl FileNameMetadata {
    /// Parse `prompt_model_tag1+tag2.ext`.
    ///
    /// The prompt is percent-decoded (kept raw if it is not valid UTF-8);
    /// everything after the second `_` is joined back and split on `+`.
    pub fn parse(file_name: &str) -> Self {
        let stem = match file_name.rfind('.') {
            Some(dot) if dot + 1 < file_name.len() => &file_name[..dot],
            _ => file_name,
        };

        let mut parts = stem.split('_');
        let prompt_raw = parts.next().unwrap_or_default();
        let model = parts.next().unwrap_or_default().to_string();
        let rest: Vec<&str> = parts.collect();
        let tags = rest
            .join("_")
            .split('+')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let prompt = percent_decode_str(prompt_raw)
            .decode_utf8()
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| prompt_raw.to_string());

        Self {
            prompt,
            model,
            tags,
        }
    }
}

/// Render a timestamp as RFC 3339 UTC with millisecond precision; values that
/// do not parse are returned unchanged.
pub fn normalize_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        })
        .unwrap_or_else(|_| raw.to_string())
}

/// A preview metadata record owned by this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRecord {
    pub id: String,
    pub original_image_id: String,
    pub preview_image_id: String,
    pub prompt: String,
    pub model: String,
    pub created_at: String,
    pub tags: Vec<String>,
}

impl PreviewRecord {
    /// Decode a target collection document. Missing references decode as
    /// empty strings so the record is classified as an orphan rather than
    /// silently ignored.
    pub fn from_document(doc: &Document) -> Self {
        let field = |name: &str| doc.str_field(name).unwrap_or_default().to_string();
        Self {
            id: doc.id.clone(),
            original_image_id: field("originalImageId"),
            preview_image_id: field("previewImageId"),
            prompt: field("prompt"),
            model: field("model"),
            created_at: doc
                .str_field("createdAt")
                .map(str::to_string)
                .or_else(|| doc.created_at.clone())
                .unwrap_or_default(),
            tags: doc.string_list("tags"),
        }
    }
}

/// Fields of a preview record about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPreviewRecord {
    pub original_image_id: String,
    pub preview_image_id: String,
    pub prompt: String,
    pub model: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl NewPreviewRecord {
    pub fn for_source(source: &SourceImageRecord, preview_image_id: impl Into<String>) -> Self {
        Self {
            original_image_id: source.image_id.clone(),
            preview_image_id: preview_image_id.into(),
            prompt: source.prompt.clone(),
            model: source.model.clone(),
            created_at: source.created_at.clone(),
            tags: source.tags.clone(),
        }
    }
}

/// Body of a document insert request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertDocumentRequest<T> {
    pub document_id: String,
    pub data: T,
}

impl<T: Serialize> InsertDocumentRequest<T> {
    /// Insert with a backend-generated id.
    pub fn unique(data: T) -> Self {
        Self {
            document_id: UNIQUE_ID.to_string(),
            data,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            SyncError::SerializationError(format!("Failed to serialize document: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_document_flattens_fields() {
        let d = doc(json!({
            "$id": "doc1",
            "$createdAt": "2025-05-20T01:02:03.000+00:00",
            "$collectionId": "images",
            "imageId": "A",
            "tags": ["a", 3, "b"]
        }));
        assert_eq!(d.id, "doc1");
        assert_eq!(d.str_field("imageId"), Some("A"));
        assert_eq!(d.string_list("tags"), vec!["a", "b"]);
        assert_eq!(d.str_field("missing"), None);
    }

    #[test]
    fn test_source_from_document() {
        let d = doc(json!({
            "$id": "doc1",
            "$createdAt": "2025-05-20T01:02:03.000+00:00",
            "imageId": "A",
            "prompt": "cat",
            "model": "flux"
        }));
        let record = SourceImageRecord::from_document(&d).unwrap();
        assert_eq!(record.image_id, "A");
        assert_eq!(record.prompt, "cat");
        assert_eq!(record.model, "flux");
        assert_eq!(record.created_at, "2025-05-20T01:02:03.000+00:00");
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_source_without_image_id_is_invalid() {
        let d = doc(json!({ "$id": "doc1", "prompt": "cat" }));
        let err = SourceImageRecord::from_document(&d).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord { ref id, .. } if id == "doc1"));
    }

    #[test]
    fn test_preview_from_document_tolerates_missing_fields() {
        let d = doc(json!({ "$id": "p1", "previewImageId": "f1" }));
        let record = PreviewRecord::from_document(&d);
        assert_eq!(record.id, "p1");
        assert_eq!(record.original_image_id, "");
        assert_eq!(record.preview_image_id, "f1");
    }

    #[test]
    fn test_file_name_metadata_full() {
        let meta = FileNameMetadata::parse("a%20red%20cat_flux-dev_pets+cute+_extra.png");
        assert_eq!(meta.prompt, "a red cat");
        assert_eq!(meta.model, "flux-dev");
        assert_eq!(meta.tags, vec!["pets", "cute", "_extra"]);
    }

    #[test]
    fn test_file_name_metadata_prompt_only() {
        let meta = FileNameMetadata::parse("sunset.jpeg");
        assert_eq!(meta.prompt, "sunset");
        assert_eq!(meta.model, "");
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn test_file_name_metadata_no_extension() {
        let meta = FileNameMetadata::parse("dog_sdxl");
        assert_eq!(meta.prompt, "dog");
        assert_eq!(meta.model, "sdxl");
    }

    #[test]
    fn test_file_name_metadata_invalid_utf8_kept_raw() {
        let meta = FileNameMetadata::parse("bad%FFname_m.png");
        assert_eq!(meta.prompt, "bad%FFname");
    }

    #[test]
    fn test_source_from_stored_file() {
        let file = StoredFile {
            id: "file1".into(),
            name: "cat_flux_pets.png".into(),
            created_at: Some("2025-05-20T01:02:03.123+02:00".into()),
            size: 10,
            mime_type: Some("image/png".into()),
        };
        let record = SourceImageRecord::from_stored_file(&file);
        assert_eq!(record.image_id, "file1");
        assert_eq!(record.prompt, "cat");
        assert_eq!(record.tags, vec!["pets"]);
        assert_eq!(record.created_at, "2025-05-19T23:02:03.123Z");
    }

    #[test]
    fn test_insert_request_shape() {
        let source = SourceImageRecord {
            image_id: "A".into(),
            prompt: "cat".into(),
            model: "flux".into(),
            created_at: "2025-01-01T00:00:00.000Z".into(),
            tags: vec![],
        };
        let body = InsertDocumentRequest::unique(NewPreviewRecord::for_source(&source, "P"))
            .to_bytes()
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["documentId"], "unique()");
        assert_eq!(value["data"]["originalImageId"], "A");
        assert_eq!(value["data"]["previewImageId"], "P");
        assert!(value["data"].get("tags").is_none());
    }
}
