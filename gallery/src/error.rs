use thiserror::Error;

/// Errors returned by gallery operations.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("gallery: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("gallery: non-finite value at index {index}")]
    NonFiniteVector { index: usize },

    #[error("gallery: invalid identity id {0:?}")]
    InvalidIdentity(String),

    #[error("gallery: storage error: {0}")]
    Storage(String),

    #[error("gallery: corrupt record for {id:?}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl GalleryError {
    pub(crate) fn storage(e: impl std::fmt::Display) -> Self {
        GalleryError::Storage(e.to_string())
    }
}
