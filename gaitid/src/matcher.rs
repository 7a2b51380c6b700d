use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::check_threshold;
use crate::error::{check_vector, GaitError};
use crate::index::SimilarityIndex;

/// Outcome of matching one query against the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Accepted identity; `None` for an unknown subject or an empty gallery.
    pub identity_id: Option<String>,

    /// `1 / (1 + distance)`, in `[0, 1]`. Reported even when rejected.
    pub similarity: f32,

    /// Squared L2 distance to the nearest enrolled vector; `+inf` when the
    /// gallery is empty.
    pub distance: f32,
}

impl MatchResult {
    fn empty_gallery() -> Self {
        Self {
            identity_id: None,
            similarity: 0.0,
            distance: f32::INFINITY,
        }
    }

    /// True if an identity was accepted.
    pub fn is_match(&self) -> bool {
        self.identity_id.is_some()
    }
}

/// Maps squared L2 distance to a similarity score.
///
/// Monotonically decreasing, `similarity(0) == 1` and `similarity(inf) == 0`.
/// The curve is steep near zero and flat far away, so thresholds have to be
/// calibrated on data rather than derived from a target distance.
pub fn similarity(distance: f32) -> f32 {
    (1.0 / (1.0 + distance as f64)) as f32
}

/// Answers "who is this?" for a query embedding.
///
/// Stateless apart from the shared index; safe to call concurrently.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    index: Arc<SimilarityIndex>,
    threshold: f32,
}

impl MatchingEngine {
    /// Creates an engine with a default acceptance threshold.
    pub fn new(index: Arc<SimilarityIndex>, threshold: f32) -> Result<Self, GaitError> {
        check_threshold(threshold)?;
        Ok(Self { index, threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    /// Matches with the configured threshold.
    pub fn identify(&self, query: &[f32]) -> Result<MatchResult, GaitError> {
        self.match_query(query, self.threshold)
    }

    /// Matches `query` and accepts the nearest identity if its similarity
    /// reaches `threshold`.
    pub fn match_query(&self, query: &[f32], threshold: f32) -> Result<MatchResult, GaitError> {
        check_threshold(threshold)?;
        check_vector(self.index.dim(), query)?;

        // Empty check and search must see the same index state.
        let snapshot = self.index.snapshot();
        if snapshot.is_empty() {
            debug!("match: gallery empty, no candidate");
            return Ok(MatchResult::empty_gallery());
        }

        let Some(nearest) = snapshot.search(query)? else {
            return Ok(MatchResult::empty_gallery());
        };

        let sim = similarity(nearest.distance);
        let accepted = sim >= threshold;
        debug!(
            "match: nearest={} distance={} similarity={:.4} threshold={} accepted={}",
            nearest.identity_id, nearest.distance, sim, threshold, accepted
        );

        Ok(MatchResult {
            identity_id: accepted.then_some(nearest.identity_id),
            similarity: sim,
            distance: nearest.distance,
        })
    }
}
