use std::sync::Arc;

use chrono::{DateTime, Utc};
use giztoy_gallery::GalleryStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{checked_embed, EmbeddingSource, ModelSignature};
use crate::enroll::{EnrollmentResult, EnrollmentService};
use crate::error::GaitError;
use crate::frames::FrameSequence;
use crate::index::SimilarityIndex;
use crate::matcher::{MatchResult, MatchingEngine};

/// Response for a match request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub recognized: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,

    pub similarity: f32,

    /// Absent when the gallery is empty (infinite distance).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,

    /// Query embedding, echoed only when diagnostics are requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MatchResponse {
    /// Builds a response, attaching `embedding` for diagnostics if given.
    pub fn new(result: MatchResult, embedding: Option<Vec<f32>>) -> Self {
        Self {
            recognized: result.identity_id.is_some(),
            identity_id: result.identity_id,
            similarity: result.similarity,
            distance: result.distance.is_finite().then_some(result.distance),
            embedding,
        }
    }
}

/// Response for an enrollment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentResponse {
    pub identity_id: String,
    pub dimension: usize,
    pub enrolled_at: DateTime<Utc>,
    pub replaced: bool,
}

impl From<EnrollmentResult> for EnrollmentResponse {
    fn from(r: EnrollmentResult) -> Self {
        Self {
            identity_id: r.identity_id,
            dimension: r.dimension,
            enrolled_at: r.enrolled_at,
            replaced: r.replaced,
        }
    }
}

/// Wires the embedding model, gallery, index, matcher and enrollment
/// together.
///
/// Build one at startup and share it by reference (or `Arc`) with every
/// request handler. Construction validates that all parts agree on D and
/// loads the index from the gallery; dropping it releases everything.
pub struct Recognizer {
    source: Arc<dyn EmbeddingSource>,
    signature: ModelSignature,
    engine: MatchingEngine,
    enrollment: EnrollmentService,
}

impl Recognizer {
    /// Fails with [`GaitError::ModelLoad`] if the model's signature is
    /// invalid or its dimension differs from `cfg.dim`, and with
    /// [`GaitError::DimensionMismatch`] if the gallery's does.
    pub fn new(
        cfg: &Config,
        source: Arc<dyn EmbeddingSource>,
        store: Arc<dyn GalleryStore>,
    ) -> Result<Self, GaitError> {
        cfg.validate()?;

        let signature = source.signature();
        let declared = signature.validate().inspect_err(|e| {
            warn!("recognizer: rejecting model: {e}");
        })?;
        if declared != source.dimension() {
            return Err(GaitError::ModelLoad(format!(
                "signature declares {declared} values, model reports {} ({signature})",
                source.dimension()
            )));
        }
        if declared != cfg.dim {
            return Err(GaitError::ModelLoad(format!(
                "model emits {declared} values, configured dim is {}",
                cfg.dim
            )));
        }

        let index = Arc::new(SimilarityIndex::new(cfg.dim));
        let enrollment = EnrollmentService::new(store, index.clone(), cfg.rebuild)?;
        let engine = MatchingEngine::new(index, cfg.threshold)?;

        let n = enrollment.sync()?;
        info!(
            "recognizer ready: dim={} threshold={} identities={}",
            cfg.dim, cfg.threshold, n
        );

        Ok(Self {
            source,
            signature,
            engine,
            enrollment,
        })
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn enrollment(&self) -> &EnrollmentService {
        &self.enrollment
    }

    pub fn dimension(&self) -> usize {
        self.engine.index().dim()
    }

    pub fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn embed(&self, frames: &FrameSequence) -> Result<Vec<f32>, GaitError> {
        self.signature.check_frames(frames)?;
        checked_embed(self.source.as_ref(), frames)
    }

    /// Embeds `frames` and matches the result.
    ///
    /// `threshold` overrides the configured one. With `diagnostics` the
    /// query embedding is echoed back.
    pub fn recognize(
        &self,
        frames: &FrameSequence,
        threshold: Option<f32>,
        diagnostics: bool,
    ) -> Result<MatchResponse, GaitError> {
        let embedding = self.embed(frames).inspect_err(|e| {
            warn!("recognize: embedding failed: {e}");
        })?;
        let threshold = threshold.unwrap_or(self.engine.threshold());
        let result = self.engine.match_query(&embedding, threshold)?;
        Ok(MatchResponse::new(result, diagnostics.then_some(embedding)))
    }

    /// Embeds `frames` and enrolls the result under `identity_id`.
    pub fn enroll(
        &self,
        identity_id: &str,
        frames: &FrameSequence,
    ) -> Result<EnrollmentResponse, GaitError> {
        let embedding = self.embed(frames).inspect_err(|e| {
            warn!("enroll {identity_id}: embedding failed: {e}");
        })?;
        Ok(self.enrollment.enroll(identity_id, &embedding)?.into())
    }
}

#[cfg(test)]
mod tests {
    use giztoy_gallery::MemoryGallery;

    use super::*;
    use crate::frames::Frame;

    /// Embeds a sequence as the first pixel of each frame placed on a
    /// one-hot axis, so distinct sequences land on distinct unit vectors.
    struct OneHot {
        dim: usize,
        input_shape: Vec<i64>,
    }

    impl OneHot {
        fn new(dim: usize) -> Self {
            Self {
                dim,
                input_shape: vec![1, 1, -1, -1, -1],
            }
        }
    }

    impl EmbeddingSource for OneHot {
        fn embed(&self, frames: &FrameSequence) -> Result<Vec<f32>, GaitError> {
            if frames.len() < 2 {
                return Err(GaitError::Embedding("need at least 2 frames".into()));
            }
            let axis = (frames.frames()[0].pixels()[0] * 10.0) as usize % self.dim;
            let mut v = vec![0.0; self.dim];
            v[axis] = 1.0;
            Ok(v)
        }

        fn dimension(&self) -> usize {
            self.dim
        }

        fn signature(&self) -> ModelSignature {
            ModelSignature {
                input_shape: self.input_shape.clone(),
                output_shape: vec![1, self.dim as i64],
            }
        }
    }

    fn walk(first_pixel: f32, n: usize) -> FrameSequence {
        let frames = (0..n)
            .map(|_| Frame::new(1, 1, vec![first_pixel]).unwrap())
            .collect();
        FrameSequence::new(frames).unwrap()
    }

    fn recognizer(dim: usize) -> Recognizer {
        let cfg = Config {
            dim,
            ..Config::default()
        };
        Recognizer::new(
            &cfg,
            Arc::new(OneHot::new(dim)),
            Arc::new(MemoryGallery::new(dim)),
        )
        .unwrap()
    }

    #[test]
    fn enroll_then_recognize() {
        let r = recognizer(8);
        let resp = r.enroll("alice", &walk(0.1, 3)).unwrap();
        assert_eq!(resp.dimension, 8);
        assert!(!resp.replaced);

        let m = r.recognize(&walk(0.1, 5), None, false).unwrap();
        assert!(m.recognized);
        assert_eq!(m.identity_id.as_deref(), Some("alice"));
        assert_eq!(m.similarity, 1.0);
        assert_eq!(m.distance, Some(0.0));
        assert!(m.embedding.is_none());

        let m = r.recognize(&walk(0.2, 5), None, true).unwrap();
        assert!(!m.recognized);
        assert_eq!(m.identity_id, None);
        assert_eq!(m.embedding.as_ref().map(Vec::len), Some(8));
    }

    #[test]
    fn recognize_on_empty_gallery() {
        let r = recognizer(4);
        let m = r.recognize(&walk(0.1, 2), None, false).unwrap();
        assert!(!m.recognized);
        assert_eq!(m.similarity, 0.0);
        assert_eq!(m.distance, None);
    }

    #[test]
    fn upstream_failure_is_propagated() {
        let r = recognizer(4);
        assert!(matches!(
            r.recognize(&walk(0.1, 1), None, false),
            Err(GaitError::Embedding(_))
        ));
        assert!(matches!(
            r.enroll("alice", &walk(0.1, 1)),
            Err(GaitError::Embedding(_))
        ));
        assert!(r.enrollment().store().is_empty().unwrap());
    }

    #[test]
    fn model_dimension_must_match_config() {
        let cfg = Config {
            dim: 16,
            ..Config::default()
        };
        let err = Recognizer::new(
            &cfg,
            Arc::new(OneHot::new(8)),
            Arc::new(MemoryGallery::new(16)),
        )
        .err()
        .unwrap();
        assert!(matches!(err, GaitError::ModelLoad(_)));
    }

    #[test]
    fn gallery_dimension_must_match_config() {
        let cfg = Config {
            dim: 8,
            ..Config::default()
        };
        let err = Recognizer::new(
            &cfg,
            Arc::new(OneHot::new(8)),
            Arc::new(MemoryGallery::new(4)),
        )
        .err()
        .unwrap();
        assert!(matches!(err, GaitError::DimensionMismatch { .. }));
    }

    #[test]
    fn invalid_model_signature_is_rejected_at_startup() {
        let cfg = Config {
            dim: 4,
            ..Config::default()
        };
        for input_shape in [vec![1, 3, -1, 64, 44], vec![1, 1, -1, 64], vec![1, 1, -1, 128, 44]] {
            let model = OneHot {
                dim: 4,
                input_shape,
            };
            let err = Recognizer::new(&cfg, Arc::new(model), Arc::new(MemoryGallery::new(4)))
                .err()
                .unwrap();
            assert!(matches!(err, GaitError::ModelLoad(_)), "got {err}");
        }
    }

    #[test]
    fn frames_must_fit_fixed_model_geometry() {
        let model = OneHot {
            dim: 4,
            input_shape: vec![1, 1, -1, 64, 44],
        };
        let cfg = Config {
            dim: 4,
            ..Config::default()
        };
        let r = Recognizer::new(&cfg, Arc::new(model), Arc::new(MemoryGallery::new(4))).unwrap();
        assert!(matches!(
            r.recognize(&walk(0.1, 3), None, false),
            Err(GaitError::InvalidFrames(_))
        ));
        assert!(matches!(
            r.enroll("alice", &walk(0.1, 3)),
            Err(GaitError::InvalidFrames(_))
        ));
        assert!(r.enrollment().store().is_empty().unwrap());
    }

    #[test]
    fn startup_loads_existing_gallery() {
        let store = Arc::new(MemoryGallery::new(4));
        store.put("bob", &[0.0, 1.0, 0.0, 0.0]).unwrap();

        let cfg = Config {
            dim: 4,
            ..Config::default()
        };
        let r = Recognizer::new(&cfg, Arc::new(OneHot::new(4)), store).unwrap();
        let m = r.recognize(&walk(0.1, 2), None, false).unwrap();
        assert_eq!(m.identity_id.as_deref(), Some("bob"));
    }

    #[test]
    fn response_json_shape() {
        let resp = MatchResponse::new(
            MatchResult {
                identity_id: None,
                similarity: 0.0,
                distance: f32::INFINITY,
            },
            None,
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, serde_json::json!({"recognized": false, "similarity": 0.0}));
    }
}
