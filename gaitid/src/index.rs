//! Exact nearest-neighbor index with snapshot publishing.
//!
//! The index content lives in an immutable [`Snapshot`]. Writers assemble a
//! new snapshot off to the side and swap it in under a single write lock;
//! readers clone the current `Arc` and search without holding any lock.
//! A reader therefore sees either the old or the new index, never a mix.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{check_vector, GaitError};

/// The nearest enrolled entry for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Identity owning the nearest vector.
    pub identity_id: String,

    /// Slot of the nearest vector in the snapshot that answered.
    pub slot: usize,

    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// Squared Euclidean distance, accumulated in f64.
///
/// Callers guarantee equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum()
}

/// Immutable index content.
///
/// Slots are dense (`0..len`) and ordered by enrollment: the entry enrolled
/// first holds the lowest slot. `ids[slot]` and `slots[id]` are inverse
/// mappings at all times.
#[derive(Clone)]
pub struct Snapshot {
    dim: usize,
    version: u64,
    ids: Vec<String>,
    slots: HashMap<String, usize>,
    data: Vec<f32>,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("dim", &self.dim)
            .field("version", &self.version)
            .field("len", &self.ids.len())
            .finish()
    }
}

impl Snapshot {
    fn empty(dim: usize, version: u64) -> Self {
        Self {
            dim,
            version,
            ids: Vec::new(),
            slots: HashMap::new(),
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Publish counter; increases by one with every published snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identity ids in slot order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn identity_at(&self, slot: usize) -> Option<&str> {
        self.ids.get(slot).map(String::as_str)
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.slots.get(id).copied()
    }

    pub fn vector_at(&self, slot: usize) -> Option<&[f32]> {
        if slot >= self.ids.len() {
            return None;
        }
        Some(&self.data[slot * self.dim..(slot + 1) * self.dim])
    }

    /// Returns the nearest entry, or `None` if the snapshot is empty.
    pub fn search(&self, query: &[f32]) -> Result<Option<Neighbor>, GaitError> {
        check_vector(self.dim, query)?;
        Ok(self.nearest(query))
    }

    fn nearest(&self, query: &[f32]) -> Option<Neighbor> {
        let mut best: Option<(usize, f64)> = None;
        for (slot, v) in self.data.chunks_exact(self.dim).enumerate() {
            let d = squared_l2(query, v);
            // Strict comparison keeps the lowest slot among ties.
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((slot, d));
            }
        }
        best.map(|(slot, d)| Neighbor {
            identity_id: self.ids[slot].clone(),
            slot,
            distance: d as f32,
        })
    }

    /// Appends `id` at the end, dropping any previous slot it held.
    fn upsert(&mut self, id: &str, vector: &[f32]) {
        self.remove(id);
        self.slots.insert(id.to_string(), self.ids.len());
        self.ids.push(id.to_string());
        self.data.extend_from_slice(vector);
    }

    /// Removes `id` and shifts later slots down by one.
    fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        self.ids.remove(slot);
        self.data.drain(slot * self.dim..(slot + 1) * self.dim);
        for (i, later) in self.ids.iter().enumerate().skip(slot) {
            self.slots.insert(later.clone(), i);
        }
        true
    }
}

/// Shared nearest-neighbor index over enrolled identities.
///
/// Thread-safe: searches run in parallel with each other and with writers.
/// Writers (`build`, `rebuild_with`, `insert`) are serialized by a publish
/// mutex so no update is lost.
pub struct SimilarityIndex {
    dim: usize,
    current: RwLock<Arc<Snapshot>>,
    publish: Mutex<()>,
}

impl fmt::Debug for SimilarityIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilarityIndex")
            .field("dim", &self.dim)
            .field("snapshot", &*self.snapshot())
            .finish()
    }
}

impl SimilarityIndex {
    /// Creates an empty index. Panics if `dim` is 0.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "gaitid: index dim must be positive");
        Self {
            dim,
            current: RwLock::new(Arc::new(Snapshot::empty(dim, 0))),
            publish: Mutex::new(()),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Returns the currently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Returns the nearest enrolled entry, or `None` if the index is empty.
    pub fn search(&self, query: &[f32]) -> Result<Option<Neighbor>, GaitError> {
        self.snapshot().search(query)
    }

    /// Replaces the whole index content with `entries`, in order.
    ///
    /// A repeated id keeps its last vector and moves to the end. On error the
    /// published index is left untouched.
    pub fn build<I, S>(&self, entries: I) -> Result<usize, GaitError>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: AsRef<str>,
    {
        let _guard = self.publish.lock();
        self.assemble_and_publish(entries)
    }

    /// Loads entries with `load` and rebuilds from them, holding the publish
    /// lock across both steps so a slow loader cannot publish stale content
    /// over a newer snapshot.
    pub fn rebuild_with<F>(&self, load: F) -> Result<usize, GaitError>
    where
        F: FnOnce() -> Result<Vec<(String, Vec<f32>)>, GaitError>,
    {
        let _guard = self.publish.lock();
        let entries = load()?;
        self.assemble_and_publish(entries)
    }

    /// Adds or replaces one entry by copying the published snapshot.
    ///
    /// A replaced entry moves to the last slot, matching its new enrollment
    /// time.
    pub fn insert(&self, id: &str, vector: &[f32]) -> Result<(), GaitError> {
        check_entry(self.dim, id, vector)?;

        let _guard = self.publish.lock();
        let mut next = Snapshot::clone(&self.snapshot());
        next.upsert(id, vector);
        self.publish_locked(next);
        Ok(())
    }

    fn assemble_and_publish<I, S>(&self, entries: I) -> Result<usize, GaitError>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: AsRef<str>,
    {
        let mut next = Snapshot::empty(self.dim, 0);
        for (id, vector) in entries {
            let id = id.as_ref();
            check_entry(self.dim, id, &vector)?;
            next.upsert(id, &vector);
        }
        let n = next.len();
        self.publish_locked(next);
        Ok(n)
    }

    /// Swaps in `next`. The caller holds the publish mutex.
    fn publish_locked(&self, mut next: Snapshot) {
        let mut current = self.current.write();
        next.version = current.version + 1;
        debug!(
            "index: publishing version {} with {} entries",
            next.version,
            next.len()
        );
        *current = Arc::new(next);
    }
}

fn check_entry(dim: usize, id: &str, vector: &[f32]) -> Result<(), GaitError> {
    if id.is_empty() {
        return Err(GaitError::InvalidIdentity(id.to_string()));
    }
    check_vector(dim, vector)
}
