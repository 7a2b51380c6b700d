use std::sync::Arc;

use chrono::{DateTime, Utc};
use giztoy_gallery::{GalleryStore, Identity};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RebuildPolicy;
use crate::error::{check_vector, GaitError};
use crate::index::SimilarityIndex;

/// Confirmation returned after a successful enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentResult {
    pub identity_id: String,

    /// Dimensionality of the stored reference vector.
    pub dimension: usize,

    pub enrolled_at: DateTime<Utc>,

    /// True if a different template was overwritten.
    pub replaced: bool,

    /// Number of identities in the index published by this enrollment.
    pub gallery_size: usize,
}

/// Writes identities to the gallery and keeps the index in step.
///
/// The gallery write always happens first; the index is only refreshed once
/// the write is durable, so the index never runs ahead of the store.
pub struct EnrollmentService {
    store: Arc<dyn GalleryStore>,
    index: Arc<SimilarityIndex>,
    policy: RebuildPolicy,
    // Insert policy only: held across the gallery write and the index
    // insert, so two enrollments of one identity reach the index in
    // gallery order. Rebuilds re-read the store and need no such lock.
    writer: Mutex<()>,
}

impl EnrollmentService {
    /// Fails with [`GaitError::DimensionMismatch`] if the store and the
    /// index disagree on D.
    pub fn new(
        store: Arc<dyn GalleryStore>,
        index: Arc<SimilarityIndex>,
        policy: RebuildPolicy,
    ) -> Result<Self, GaitError> {
        if store.dim() != index.dim() {
            return Err(GaitError::DimensionMismatch {
                expected: index.dim(),
                got: store.dim(),
            });
        }
        Ok(Self {
            store,
            index,
            policy,
            writer: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &Arc<dyn GalleryStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    pub fn policy(&self) -> RebuildPolicy {
        self.policy
    }

    /// Stores `vector` as the reference for `identity_id` and publishes an
    /// index that contains it.
    pub fn enroll(&self, identity_id: &str, vector: &[f32]) -> Result<EnrollmentResult, GaitError> {
        if identity_id.is_empty() {
            return Err(GaitError::InvalidIdentity(identity_id.to_string()));
        }
        check_vector(self.index.dim(), vector)?;

        let _guard = (self.policy == RebuildPolicy::Insert).then(|| self.writer.lock());
        let outcome = self.store.put(identity_id, vector)?;

        let gallery_size = match self.policy {
            RebuildPolicy::Rebuild => self.sync()?,
            RebuildPolicy::Insert if outcome.unchanged() => {
                debug!("enroll: {identity_id} unchanged, index untouched");
                self.index.len()
            }
            RebuildPolicy::Insert => {
                self.index.insert(identity_id, &outcome.identity.vector)?;
                self.index.len()
            }
        };

        info!(
            "enrolled {} (dim={}, replaced={}, gallery={})",
            identity_id,
            outcome.identity.dim(),
            outcome.replaced(),
            gallery_size
        );

        Ok(EnrollmentResult {
            identity_id: identity_id.to_string(),
            dimension: outcome.identity.dim(),
            enrolled_at: outcome.identity.enrolled_at,
            replaced: outcome.replaced(),
            gallery_size,
        })
    }

    /// Rebuilds the index from the gallery. Returns the number of entries
    /// published.
    pub fn sync(&self) -> Result<usize, GaitError> {
        self.index.rebuild_with(|| load_entries(self.store.as_ref()))
    }
}

/// Reads the gallery in enrollment order so that index slots (and with them
/// tie-breaking) follow the gallery's enrollment sequence.
fn load_entries(store: &dyn GalleryStore) -> Result<Vec<(String, Vec<f32>)>, GaitError> {
    let mut all: Vec<Identity> = store.all()?;
    all.sort_by(Identity::enrollment_order);
    Ok(all.into_iter().map(|i| (i.id, i.vector)).collect())
}
