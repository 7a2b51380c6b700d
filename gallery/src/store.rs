use std::fmt;

use crate::error::GalleryError;
use crate::identity::Identity;

/// Durable collection of enrolled identities: the source of truth for
/// matching.
///
/// Each identity owns exactly one reference vector; `put` overwrites.
/// Implementations must be safe for concurrent use.
pub trait GalleryStore: Send + Sync {
    /// Returns the vector dimensionality this gallery accepts.
    fn dim(&self) -> usize;

    /// Stores or overwrites the reference vector for `id`.
    ///
    /// Every effective write takes the next enrollment `seq`. Storing a
    /// bit-identical vector for an existing identity is a no-op and keeps
    /// its `seq` and `enrolled_at`. Vectors with NaN or infinite components
    /// are rejected. The write is durable when this returns `Ok`.
    fn put(&self, id: &str, vector: &[f32]) -> Result<PutOutcome, GalleryError>;

    /// Returns the full record for `id`.
    fn record(&self, id: &str) -> Result<Option<Identity>, GalleryError>;

    /// Returns a snapshot of every enrolled identity. Order is unspecified.
    fn all(&self) -> Result<Vec<Identity>, GalleryError>;

    /// Returns the number of enrolled identities.
    fn len(&self) -> Result<usize, GalleryError>;

    /// Returns the reference vector for `id`.
    fn get(&self, id: &str) -> Result<Option<Vec<f32>>, GalleryError> {
        Ok(self.record(id)?.map(|ident| ident.vector))
    }

    /// Returns true if nobody is enrolled.
    fn is_empty(&self) -> Result<bool, GalleryError> {
        Ok(self.len()? == 0)
    }
}

/// Result of [`GalleryStore::put`].
#[derive(Debug, Clone)]
pub struct PutOutcome {
    /// The record now stored for the identity.
    pub identity: Identity,

    /// The record that was stored before this call, if any.
    pub previous: Option<Identity>,
}

impl PutOutcome {
    /// True if the call changed nothing (same vector already stored).
    pub fn unchanged(&self) -> bool {
        self.previous.as_ref().is_some_and(|prev| {
            prev.seq == self.identity.seq && prev.same_vector(&self.identity.vector)
        })
    }

    /// True if an existing, different template was overwritten.
    pub fn replaced(&self) -> bool {
        self.previous.is_some() && !self.unchanged()
    }
}

impl fmt::Debug for dyn GalleryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GalleryStore {{ dim: {} }}", self.dim())
    }
}

/// Checks an enrollment request against the gallery contract.
pub(crate) fn validate_put(dim: usize, id: &str, vector: &[f32]) -> Result<(), GalleryError> {
    if id.is_empty() {
        return Err(GalleryError::InvalidIdentity(id.to_string()));
    }
    if vector.len() != dim {
        return Err(GalleryError::DimensionMismatch {
            expected: dim,
            got: vector.len(),
        });
    }
    match vector.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(GalleryError::NonFiniteVector { index }),
        None => Ok(()),
    }
}
