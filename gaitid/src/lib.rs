//! Gait identification: match a walking-sequence embedding against a gallery
//! of enrolled identities.
//!
//! # Architecture
//!
//! ```text
//! frames -> EmbeddingSource -> vector -+-> MatchingEngine    (read)
//!                                      +-> EnrollmentService (write)
//!                                              |
//!                       SimilarityIndex <- GalleryStore (source of truth)
//! ```
//!
//! - [`SimilarityIndex`]: exact brute-force nearest neighbor under squared
//!   L2 distance, published as immutable snapshots.
//! - [`MatchingEngine`]: `similarity = 1 / (1 + distance)`, accepted when
//!   `similarity >= threshold`; otherwise the subject is unknown.
//! - [`EnrollmentService`]: writes the gallery first, then rebuilds (or
//!   inserts into) the index.
//! - [`Recognizer`]: the composition root for frame-level requests.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use giztoy_gaitid::{EnrollmentService, MatchingEngine, RebuildPolicy, SimilarityIndex};
//! use giztoy_gallery::MemoryGallery;
//!
//! let index = Arc::new(SimilarityIndex::new(3));
//! let enroll = EnrollmentService::new(
//!     Arc::new(MemoryGallery::new(3)),
//!     index.clone(),
//!     RebuildPolicy::Rebuild,
//! ).unwrap();
//! let engine = MatchingEngine::new(index, 0.85).unwrap();
//!
//! enroll.enroll("alice", &[1.0, 0.0, 0.0]).unwrap();
//! let r = engine.identify(&[1.0, 0.0, 0.0]).unwrap();
//! assert_eq!(r.identity_id.as_deref(), Some("alice"));
//! ```
//!
//! An empty gallery is a normal state: every query returns no identity.

mod config;
mod embedding;
mod enroll;
mod error;
mod frames;
mod index;
mod matcher;
mod recognizer;


pub use config::{Config, RebuildPolicy, DEFAULT_DIM, DEFAULT_THRESHOLD};
pub use embedding::{
    checked_embed, mean_pool, EmbeddingSource, FrameEmbedder, MeanPooled, ModelSignature,
};
pub use enroll::{EnrollmentResult, EnrollmentService};
pub use error::GaitError;
pub use frames::{Frame, FrameSequence, FRAME_HEIGHT, FRAME_WIDTH};
pub use index::{squared_l2, Neighbor, SimilarityIndex, Snapshot};
pub use matcher::{similarity, MatchResult, MatchingEngine};
pub use recognizer::{EnrollmentResponse, MatchResponse, Recognizer};
