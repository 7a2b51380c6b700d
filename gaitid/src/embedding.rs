//! Boundary to the embedding model.
//!
//! The model itself is external. This module defines what the matcher needs
//! from it, how a loaded model's I/O signature is validated before serving,
//! and how per-frame outputs are reduced to one sequence embedding.

use std::fmt;

use crate::error::GaitError;
use crate::frames::{FrameSequence, FRAME_HEIGHT, FRAME_WIDTH};

/// Turns a walking sequence into one fixed-size embedding.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait EmbeddingSource: Send + Sync {
    /// Computes the embedding for `frames`. The result must have
    /// [`EmbeddingSource::dimension`] values.
    fn embed(&self, frames: &FrameSequence) -> Result<Vec<f32>, GaitError>;

    /// Returns D, fixed once the model is loaded.
    fn dimension(&self) -> usize;

    /// Declared I/O shapes of the loaded model, checked with
    /// [`ModelSignature::validate`] before the model serves.
    fn signature(&self) -> ModelSignature;
}

/// A model that emits one embedding per frame instead of per sequence.
pub trait FrameEmbedder: Send + Sync {
    /// Returns one vector per input frame.
    fn embed_frames(&self, frames: &FrameSequence) -> Result<Vec<Vec<f32>>, GaitError>;

    fn dimension(&self) -> usize;

    fn signature(&self) -> ModelSignature;
}

/// Adapts a [`FrameEmbedder`] into an [`EmbeddingSource`] by element-wise
/// mean over the frame embeddings.
pub struct MeanPooled<E> {
    inner: E,
}

impl<E> MeanPooled<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: FrameEmbedder> EmbeddingSource for MeanPooled<E> {
    fn embed(&self, frames: &FrameSequence) -> Result<Vec<f32>, GaitError> {
        let per_frame = self.inner.embed_frames(frames)?;
        mean_pool(&per_frame, self.inner.dimension())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn signature(&self) -> ModelSignature {
        self.inner.signature()
    }
}

/// Averages equally sized vectors. Accumulates in f64.
pub fn mean_pool(vectors: &[Vec<f32>], dim: usize) -> Result<Vec<f32>, GaitError> {
    if vectors.is_empty() {
        return Err(GaitError::Embedding("model returned no frame embeddings".into()));
    }
    let mut sum = vec![0.0f64; dim];
    for (i, v) in vectors.iter().enumerate() {
        if v.len() != dim {
            return Err(GaitError::Embedding(format!(
                "frame {i} embedding has {} values, expected {dim}",
                v.len()
            )));
        }
        for (acc, &x) in sum.iter_mut().zip(v) {
            *acc += x as f64;
        }
    }
    let n = vectors.len() as f64;
    Ok(sum.into_iter().map(|s| (s / n) as f32).collect())
}

/// Declared input/output shapes of a loaded model. `-1` marks a dynamic
/// axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSignature {
    pub input_shape: Vec<i64>,
    pub output_shape: Vec<i64>,
}

impl fmt::Display for ModelSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input {:?} -> output {:?}", self.input_shape, self.output_shape)
    }
}

impl ModelSignature {
    /// Checks the signature against the `[N, 1, S, H, W]` input contract and
    /// returns the embedding dimension D taken from the output's last axis.
    ///
    /// Call this at load time: a model that fails here must never serve.
    pub fn validate(&self) -> Result<usize, GaitError> {
        let load_err = |msg: String| GaitError::ModelLoad(format!("{msg} ({self})"));

        if self.input_shape.len() != 5 {
            return Err(load_err(format!(
                "input rank {}, expected 5 [N, C, S, H, W]",
                self.input_shape.len()
            )));
        }
        if self.input_shape[1] != 1 {
            return Err(load_err(format!(
                "input channels {}, expected 1",
                self.input_shape[1]
            )));
        }
        for (axis, name, want) in [(3, "height", FRAME_HEIGHT), (4, "width", FRAME_WIDTH)] {
            let got = self.input_shape[axis];
            if got > 0 && got as usize != want {
                return Err(load_err(format!("input {name} {got}, expected {want}")));
            }
        }

        match self.output_shape.last() {
            Some(&d) if d > 0 => Ok(d as usize),
            Some(&d) => Err(load_err(format!("output dimension {d} is not fixed"))),
            None => Err(load_err("output has rank 0".into())),
        }
    }

    /// Checks `frames` against the fixed height and width axes, if any.
    /// Call only on a signature that passed [`ModelSignature::validate`].
    pub fn check_frames(&self, frames: &FrameSequence) -> Result<(), GaitError> {
        let (h, w) = frames.geometry();
        for (axis, name, got) in [(3, "height", h), (4, "width", w)] {
            let want = self.input_shape.get(axis).copied().unwrap_or(-1);
            if want > 0 && want as usize != got {
                return Err(GaitError::InvalidFrames(format!(
                    "frame {name} {got}, model expects {want}"
                )));
            }
        }
        Ok(())
    }
}

/// Runs `source` and checks its output before it reaches the matcher.
///
/// A wrong length or a non-finite value is reported as
/// [`GaitError::Embedding`]; nothing is padded, truncated or zero-filled.
pub fn checked_embed(
    source: &dyn EmbeddingSource,
    frames: &FrameSequence,
) -> Result<Vec<f32>, GaitError> {
    let v = source.embed(frames)?;
    let dim = source.dimension();
    if v.len() != dim {
        return Err(GaitError::Embedding(format!(
            "model returned {} values, expected {dim}",
            v.len()
        )));
    }
    if let Some(i) = v.iter().position(|x| !x.is_finite()) {
        return Err(GaitError::Embedding(format!(
            "model returned non-finite value at index {i}"
        )));
    }
    Ok(v)
}
