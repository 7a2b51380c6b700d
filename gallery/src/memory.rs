//! In-memory gallery for testing and ephemeral use.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::GalleryError;
use crate::identity::Identity;
use crate::store::{validate_put, GalleryStore, PutOutcome};

/// A [`GalleryStore`] backed by a map. Data is lost on restart.
pub struct MemoryGallery {
    dim: usize,
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    identities: BTreeMap<String, Identity>,
    last_seq: u64,
}

impl MemoryGallery {
    /// Creates an empty gallery. Panics if `dim` is 0.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "gallery: dim must be positive");
        Self {
            dim,
            state: RwLock::new(State::default()),
        }
    }
}

impl GalleryStore for MemoryGallery {
    fn dim(&self) -> usize {
        self.dim
    }

    fn put(&self, id: &str, vector: &[f32]) -> Result<PutOutcome, GalleryError> {
        validate_put(self.dim, id, vector)?;

        let mut state = self.state.write();
        if let Some(existing) = state.identities.get(id) {
            if existing.same_vector(vector) {
                return Ok(PutOutcome {
                    identity: existing.clone(),
                    previous: Some(existing.clone()),
                });
            }
        }
        state.last_seq += 1;
        let identity = Identity::new(id, vector.to_vec(), state.last_seq);
        let previous = state.identities.insert(id.to_string(), identity.clone());
        Ok(PutOutcome { identity, previous })
    }

    fn record(&self, id: &str) -> Result<Option<Identity>, GalleryError> {
        Ok(self.state.read().identities.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<Identity>, GalleryError> {
        Ok(self.state.read().identities.values().cloned().collect())
    }

    fn len(&self) -> Result<usize, GalleryError> {
        Ok(self.state.read().identities.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let g = MemoryGallery::new(3);
        let out = g.put("alice", &[1.0, 2.0, 3.0]).unwrap();
        assert!(out.previous.is_none());
        assert!(!out.replaced());
        assert_eq!(out.identity.vector, vec![1.0, 2.0, 3.0]);
        assert_eq!(g.get("alice").unwrap(), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(g.get("nobody").unwrap(), None);
        assert_eq!(g.len().unwrap(), 1);
    }

    #[test]
    fn put_overwrites() {
        let g = MemoryGallery::new(2);
        g.put("alice", &[1.0, 0.0]).unwrap();
        let out = g.put("alice", &[0.0, 1.0]).unwrap();
        assert!(out.replaced());
        assert_eq!(out.previous.unwrap().vector, vec![1.0, 0.0]);

        let all = g.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].vector, vec![0.0, 1.0]);
    }

    #[test]
    fn put_identical_is_idempotent() {
        let g = MemoryGallery::new(2);
        g.put("alice", &[1.0, 0.5]).unwrap();
        let first = g.record("alice").unwrap().unwrap();
        let out = g.put("alice", &[1.0, 0.5]).unwrap();
        assert!(out.unchanged());
        assert!(!out.replaced());
        let second = g.record("alice").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(g.len().unwrap(), 1);
    }

    #[test]
    fn put_rejects_wrong_dimension() {
        let g = MemoryGallery::new(3);
        let err = g.put("alice", &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            GalleryError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        ));
        assert!(g.is_empty().unwrap());
    }

    #[test]
    fn put_rejects_non_finite() {
        let g = MemoryGallery::new(2);
        assert!(matches!(
            g.put("alice", &[1.0, f32::NAN]),
            Err(GalleryError::NonFiniteVector { index: 1 })
        ));
        assert!(matches!(
            g.put("alice", &[f32::NEG_INFINITY, 0.0]),
            Err(GalleryError::NonFiniteVector { index: 0 })
        ));
        assert!(g.is_empty().unwrap());
    }

    #[test]
    fn seq_increases_with_every_write() {
        let g = MemoryGallery::new(1);
        let a = g.put("a", &[1.0]).unwrap().identity.seq;
        let b = g.put("b", &[1.0]).unwrap().identity.seq;
        assert!(a < b);

        // Identical put keeps the seq; a real overwrite takes a new one.
        assert_eq!(g.put("a", &[1.0]).unwrap().identity.seq, a);
        let a2 = g.put("a", &[2.0]).unwrap().identity.seq;
        assert!(a2 > b);
    }

    #[test]
    fn put_rejects_empty_id() {
        let g = MemoryGallery::new(1);
        assert!(matches!(
            g.put("", &[1.0]),
            Err(GalleryError::InvalidIdentity(_))
        ));
    }
}
