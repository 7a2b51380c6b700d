use giztoy_gallery::GalleryError;
use thiserror::Error;

/// Errors returned by matching, enrollment and the embedding boundary.
///
/// None of these are retried inside the crate; callers decide.
#[derive(Debug, Error)]
pub enum GaitError {
    #[error("gaitid: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("gaitid: non-finite value at index {index}")]
    NonFiniteVector { index: usize },

    #[error("gaitid: threshold {0} outside [0, 1]")]
    InvalidThreshold(f32),

    #[error("gaitid: invalid config: {0}")]
    InvalidConfig(String),

    #[error("gaitid: invalid identity id {0:?}")]
    InvalidIdentity(String),

    #[error("gaitid: invalid frames: {0}")]
    InvalidFrames(String),

    #[error("gaitid: model load error: {0}")]
    ModelLoad(String),

    #[error("gaitid: embedding error: {0}")]
    Embedding(String),

    #[error("gaitid: storage error: {0}")]
    Storage(String),
}

impl From<GalleryError> for GaitError {
    fn from(e: GalleryError) -> Self {
        match e {
            GalleryError::DimensionMismatch { expected, got } => {
                GaitError::DimensionMismatch { expected, got }
            }
            GalleryError::NonFiniteVector { index } => GaitError::NonFiniteVector { index },
            GalleryError::InvalidIdentity(id) => GaitError::InvalidIdentity(id),
            other => GaitError::Storage(other.to_string()),
        }
    }
}

/// Rejects vectors of the wrong length or with NaN/infinite components.
pub(crate) fn check_vector(dim: usize, v: &[f32]) -> Result<(), GaitError> {
    if v.len() != dim {
        return Err(GaitError::DimensionMismatch {
            expected: dim,
            got: v.len(),
        });
    }
    match v.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(GaitError::NonFiniteVector { index }),
        None => Ok(()),
    }
}
