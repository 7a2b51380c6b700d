//! Redb-backed durable gallery.

use std::fmt;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, info};

use crate::error::GalleryError;
use crate::identity::Identity;
use crate::store::{validate_put, GalleryStore, PutOutcome};

const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const META_DIM: &str = "dim";
const META_SEQ: &str = "seq";

/// A persistent [`GalleryStore`] backed by redb.
///
/// Every `put` runs in its own write transaction and is committed with
/// immediate durability before it returns. The enrollment counter lives in
/// the same `meta` table and advances in that transaction.
pub struct RedbGallery {
    db: Database,
    dim: usize,
    path: PathBuf,
}

impl fmt::Debug for RedbGallery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbGallery")
            .field("path", &self.path)
            .field("dim", &self.dim)
            .finish()
    }
}

impl RedbGallery {
    /// Opens or creates a gallery at `path` for vectors of size `dim`.
    ///
    /// Fails with [`GalleryError::DimensionMismatch`] if the file was
    /// created for a different dimensionality. Panics if `dim` is 0.
    pub fn open<P: AsRef<Path>>(path: P, dim: usize) -> Result<Self, GalleryError> {
        assert!(dim > 0, "gallery: dim must be positive");

        let path = path.as_ref();
        let db = Database::create(path).map_err(GalleryError::storage)?;

        let tx = db.begin_write().map_err(GalleryError::storage)?;
        {
            tx.open_table(IDENTITIES).map_err(GalleryError::storage)?;
            let mut meta = tx.open_table(META).map_err(GalleryError::storage)?;
            let stored = meta
                .get(META_DIM)
                .map_err(GalleryError::storage)?
                .map(|v| v.value() as usize);
            match stored {
                Some(stored) if stored != dim => {
                    return Err(GalleryError::DimensionMismatch {
                        expected: stored,
                        got: dim,
                    });
                }
                Some(_) => {}
                None => {
                    meta.insert(META_DIM, dim as u64)
                        .map_err(GalleryError::storage)?;
                }
            }
        }
        tx.commit().map_err(GalleryError::storage)?;

        let gallery = Self {
            db,
            dim,
            path: path.to_path_buf(),
        };
        info!(
            "gallery opened at {} (dim={}, identities={})",
            path.display(),
            dim,
            gallery.len()?
        );
        Ok(gallery)
    }
}

impl GalleryStore for RedbGallery {
    fn dim(&self) -> usize {
        self.dim
    }

    fn put(&self, id: &str, vector: &[f32]) -> Result<PutOutcome, GalleryError> {
        validate_put(self.dim, id, vector)?;

        let tx = self.db.begin_write().map_err(GalleryError::storage)?;
        let (identity, previous) = {
            let mut table = tx.open_table(IDENTITIES).map_err(GalleryError::storage)?;
            let previous = match table.get(id).map_err(GalleryError::storage)? {
                Some(data) => Some(Identity::decode(id, data.value())?),
                None => None,
            };
            let identity = match &previous {
                Some(prev) if prev.same_vector(vector) => prev.clone(),
                _ => {
                    let mut meta = tx.open_table(META).map_err(GalleryError::storage)?;
                    let seq = meta
                        .get(META_SEQ)
                        .map_err(GalleryError::storage)?
                        .map_or(0, |v| v.value())
                        + 1;
                    meta.insert(META_SEQ, seq).map_err(GalleryError::storage)?;

                    let ident = Identity::new(id, vector.to_vec(), seq);
                    table
                        .insert(id, ident.encode().as_slice())
                        .map_err(GalleryError::storage)?;
                    ident
                }
            };
            (identity, previous)
        };

        let outcome = PutOutcome { identity, previous };
        if outcome.unchanged() {
            debug!("gallery: {id} unchanged, skipping write");
            tx.abort().map_err(GalleryError::storage)?;
        } else {
            tx.commit().map_err(GalleryError::storage)?;
        }
        Ok(outcome)
    }

    fn record(&self, id: &str) -> Result<Option<Identity>, GalleryError> {
        let tx = self.db.begin_read().map_err(GalleryError::storage)?;
        let table = tx.open_table(IDENTITIES).map_err(GalleryError::storage)?;
        match table.get(id).map_err(GalleryError::storage)? {
            Some(data) => Ok(Some(Identity::decode(id, data.value())?)),
            None => Ok(None),
        }
    }

    fn all(&self) -> Result<Vec<Identity>, GalleryError> {
        let tx = self.db.begin_read().map_err(GalleryError::storage)?;
        let table = tx.open_table(IDENTITIES).map_err(GalleryError::storage)?;

        let mut out = Vec::new();
        for item in table.iter().map_err(GalleryError::storage)? {
            let (key, value) = item.map_err(GalleryError::storage)?;
            let ident = Identity::decode(key.value(), value.value())?;
            let dim = ident.dim();
            if dim != self.dim {
                return Err(GalleryError::Corrupt {
                    id: ident.id,
                    reason: format!("stored dim {dim}, gallery dim {}", self.dim),
                });
            }
            out.push(ident);
        }
        Ok(out)
    }

    fn len(&self) -> Result<usize, GalleryError> {
        let tx = self.db.begin_read().map_err(GalleryError::storage)?;
        let table = tx.open_table(IDENTITIES).map_err(GalleryError::storage)?;
        Ok(table.len().map_err(GalleryError::storage)? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn redb_put_and_get() {
        let dir = tempdir().unwrap();
        let g = RedbGallery::open(dir.path().join("gallery.redb"), 3).unwrap();

        assert!(g.put("alice", &[1.0, 0.25, -3.5]).unwrap().previous.is_none());
        assert_eq!(g.get("alice").unwrap(), Some(vec![1.0, 0.25, -3.5]));
        assert_eq!(g.get("bob").unwrap(), None);
        assert_eq!(g.len().unwrap(), 1);
    }

    #[test]
    fn redb_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gallery.redb");
        let v = vec![0.1f32, f32::EPSILON, -1.0e-40, 7.0];
        {
            let g = RedbGallery::open(&path, 4).unwrap();
            g.put("alice", &v).unwrap();
            g.put("bob", &[0.0; 4]).unwrap();
        }

        let g = RedbGallery::open(&path, 4).unwrap();
        let got = g.record("alice").unwrap().unwrap();
        assert!(got.same_vector(&v));
        assert_eq!(g.all().unwrap().len(), 2);
    }

    #[test]
    fn redb_reopen_with_other_dim_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gallery.redb");
        drop(RedbGallery::open(&path, 4).unwrap());

        let err = RedbGallery::open(&path, 8).unwrap_err();
        assert!(matches!(
            err,
            GalleryError::DimensionMismatch {
                expected: 4,
                got: 8
            }
        ));
    }

    #[test]
    fn redb_overwrite_keeps_single_record() {
        let dir = tempdir().unwrap();
        let g = RedbGallery::open(dir.path().join("gallery.redb"), 2).unwrap();

        g.put("alice", &[1.0, 0.0]).unwrap();
        let out = g.put("alice", &[0.0, 1.0]).unwrap();
        assert!(out.replaced());
        assert_eq!(out.previous.unwrap().vector, vec![1.0, 0.0]);

        let all = g.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].vector, vec![0.0, 1.0]);
    }

    #[test]
    fn redb_identical_put_keeps_timestamp() {
        let dir = tempdir().unwrap();
        let g = RedbGallery::open(dir.path().join("gallery.redb"), 2).unwrap();

        g.put("alice", &[1.0, 2.0]).unwrap();
        let before = g.record("alice").unwrap().unwrap();
        let out = g.put("alice", &[1.0, 2.0]).unwrap();
        assert!(out.unchanged());
        assert_eq!(out.identity, before);
        assert_eq!(g.record("alice").unwrap().unwrap(), before);
    }

    #[test]
    fn redb_seq_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gallery.redb");
        let (a, b) = {
            let g = RedbGallery::open(&path, 1).unwrap();
            let a = g.put("zed", &[1.0]).unwrap().identity.seq;
            let b = g.put("amy", &[-1.0]).unwrap().identity.seq;
            assert_eq!(g.put("zed", &[1.0]).unwrap().identity.seq, a);
            (a, b)
        };
        assert!(a < b);

        let g = RedbGallery::open(&path, 1).unwrap();
        assert_eq!(g.record("zed").unwrap().unwrap().seq, a);
        let c = g.put("kim", &[0.0]).unwrap().identity.seq;
        assert!(c > b, "seq restarted after reopen: {c} <= {b}");
    }

    #[test]
    fn redb_rejects_non_finite() {
        let dir = tempdir().unwrap();
        let g = RedbGallery::open(dir.path().join("gallery.redb"), 2).unwrap();
        assert!(matches!(
            g.put("alice", &[f32::INFINITY, 0.0]),
            Err(GalleryError::NonFiniteVector { index: 0 })
        ));
        assert!(g.is_empty().unwrap());
    }

    #[test]
    fn redb_debug_shows_path_and_dim() {
        let dir = tempdir().unwrap();
        let g = RedbGallery::open(dir.path().join("gallery.redb"), 2).unwrap();
        let dbg = format!("{g:?}");
        assert!(dbg.contains("gallery.redb") && dbg.contains("dim: 2"), "got {dbg}");
    }

    #[test]
    fn redb_rejects_wrong_dimension() {
        let dir = tempdir().unwrap();
        let g = RedbGallery::open(dir.path().join("gallery.redb"), 2).unwrap();
        assert!(matches!(
            g.put("alice", &[1.0, 2.0, 3.0]),
            Err(GalleryError::DimensionMismatch { .. })
        ));
        assert!(g.is_empty().unwrap());
    }
}
