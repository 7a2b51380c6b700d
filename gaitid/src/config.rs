use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GaitError;

/// Default embedding dimensionality (GaitSet-style models emit 256 values).
pub const DEFAULT_DIM: usize = 256;

/// Default acceptance threshold on `1 / (1 + distance)`.
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// How the index follows the gallery after an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildPolicy {
    /// Rebuild the whole index from `GalleryStore::all()`.
    #[default]
    Rebuild,
    /// Copy the published index and upsert the single entry.
    Insert,
}

impl RebuildPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebuildPolicy::Rebuild => "rebuild",
            RebuildPolicy::Insert => "insert",
        }
    }
}

impl fmt::Display for RebuildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebuildPolicy {
    type Err = GaitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rebuild" => Ok(RebuildPolicy::Rebuild),
            "insert" => Ok(RebuildPolicy::Insert),
            other => Err(GaitError::InvalidConfig(format!(
                "unknown rebuild policy {other:?}, expected rebuild or insert"
            ))),
        }
    }
}

/// Controls matching and enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Embedding dimension D. Fixed for the process lifetime.
    pub dim: usize,

    /// Minimum similarity to accept a match. Must be in `[0, 1]`.
    /// Tune per deployment; similarity is not linear in distance.
    pub threshold: f32,

    /// Index refresh strategy on enrollment.
    pub rebuild: RebuildPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            threshold: DEFAULT_THRESHOLD,
            rebuild: RebuildPolicy::default(),
        }
    }
}

impl Config {
    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<(), GaitError> {
        if self.dim == 0 {
            return Err(GaitError::InvalidConfig("dim must be positive".into()));
        }
        check_threshold(self.threshold)
    }
}

pub(crate) fn check_threshold(t: f32) -> Result<(), GaitError> {
    if (0.0..=1.0).contains(&t) {
        Ok(())
    } else {
        Err(GaitError::InvalidThreshold(t))
    }
}
