//! Common types, traits, and utilities shared across the crate.
//!
//! Error handling, binary readers/writers and geometry values used by the
//! providers, the codecs, the picture data family and the container.

// Submodule declarations
pub mod binary;
pub mod error;
pub mod geometry;

// Re-exports for convenience
pub use binary::{ByteOrder, ByteReader, ByteWriter};
pub use error::{Error, Result};
pub use geometry::{AffineTransform, Point, Rect, Size};
