use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Listing or downloading from the backend failed.
    #[error("Upstream fetch error: {0}")]
    UpstreamFetchError(String),

    /// Decoding, resizing or re-encoding an image failed.
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Writing a preview file or a metadata record failed.
    #[error("Upstream upload error: {0}")]
    UpstreamUploadError(String),

    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Soft rejection: the metadata payload is over the backend's document limit.
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },
}

impl SyncError {
    /// Whether this error came from talking to the backend.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamFetchError(_)
                | Self::UpstreamUploadError(_)
                | Self::DeleteError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
