#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid setting `{field}`: {value}")]
    InvalidSetting { field: &'static str, value: String },

    #[error("no image loaded, upload a source image first")]
    NoImage,

    #[error("a correction is already in progress")]
    CorrectionInFlight,

    #[error("no correction is in progress")]
    NoCorrectionInFlight,

    #[error("correction failed: {0}")]
    CorrectionFailed(String),

    #[error("reference pack not found: {0}")]
    PackNotFound(String),

    #[error("reference image not found: {0}")]
    ImageNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("pack name must not be empty")]
    EmptyPackName,

    #[error("image already present in pack {pack_id} as {image_id}")]
    DuplicateReference { pack_id: String, image_id: String },

    #[error("store schema version {found} is newer than supported version {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by the external correction provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider interrupted")]
    Interrupted,
}

impl ProviderError {
    /// The provider-supplied message, if it sent a non-empty one.
    pub fn message(&self) -> Option<&str> {
        let msg = match self {
            ProviderError::Transport(m)
            | ProviderError::Quota(m)
            | ProviderError::MalformedResponse(m) => m.as_str(),
            ProviderError::Interrupted => return None,
        };
        let msg = msg.trim();
        (!msg.is_empty()).then_some(msg)
    }
}
