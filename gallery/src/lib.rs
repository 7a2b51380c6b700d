//! Durable gallery of enrolled identities for embedding-based recognition.
//!
//! The gallery is the source of truth for who is enrolled. Each identity has
//! exactly one reference vector of a fixed, gallery-wide dimensionality;
//! enrolling an identity again overwrites its previous vector.
//!
//! # Usage
//!
//! ```
//! use giztoy_gallery::{GalleryStore, MemoryGallery};
//!
//! let gallery = MemoryGallery::new(3);
//! gallery.put("alice", &[1.0, 0.0, 0.0]).unwrap();
//! assert_eq!(gallery.get("alice").unwrap(), Some(vec![1.0, 0.0, 0.0]));
//! ```
//!
//! Use [`RedbGallery`] for persistence. Its record layout is documented on
//! [`Identity::encode`].

mod error;
mod identity;
mod memory;
mod persistent;
mod store;

pub use error::GalleryError;
pub use identity::Identity;
pub use memory::MemoryGallery;
pub use persistent::RedbGallery;
pub use store::{GalleryStore, PutOutcome};
