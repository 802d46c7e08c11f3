//! Pictura - multi-representation picture values
//!
//! A [`Picture`] is one logical image stored in one or more encodings
//! (PNG, JPEG, GIF, SVG, EMF, nested pictures, composites, or bytes this
//! build cannot interpret). It selects the best encoding for display and
//! for printing, decodes lazily, and persists itself in a versioned,
//! endian-aware binary format so it can be stored and compared as a value.
//!
//! # Features
//!
//! - **Lazy decoding**: entries decode on first use, exactly once
//! - **Byte providers**: memory, shared buffers, host blobs, streams and files
//!   behind one windowed interface
//! - **Round-trip safety**: unknown entry kinds are kept and written back
//!   verbatim
//! - **Metadata**: EXIF/TIFF/GPS fields read without decoding pixels
//! - **Animation**: GIF timelines driven by an externally ticked [`Animator`]
//!
//! # Example - Reading a picture
//!
//! ```no_run
//! use pictura::Picture;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let picture = Picture::from_file("photo.pictura")?;
//! println!("{} encodings, {}x{}", picture.count_picture_data(), picture.width(), picture.height());
//!
//! if let Some(data) = picture.picture_data_for_display() {
//!     println!("Displaying {}", data.key());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Building and saving a picture
//!
//! ```no_run
//! use pictura::{Picture, PictureConfig, PictureData};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PictureConfig::global();
//! let png = PictureData::from_file(Arc::clone(&config), "photo.png")?;
//! let svg = PictureData::from_file(Arc::clone(&config), "photo.svg")?;
//!
//! let mut picture = Picture::with_config(config);
//! picture.append_picture_data(Arc::new(png), true);
//! picture.append_picture_data(Arc::new(svg), true);
//!
//! std::fs::write("photo.pictura", picture.value_bytes()?)?;
//! # Ok(())
//! # }
//! ```

/// Identity registry shared by one save pass
pub mod accumulator;

/// Frame timing for animated entries
pub mod animator;

/// Codec registry, format sniffing and the per-format helpers
pub mod codec;

/// Errors, binary readers/writers and geometry values
pub mod common;

/// Process-wide configuration and the platform bridge
pub mod config;

/// The picture data family: one encoding of an image
pub mod data;

/// Drawing surface abstraction and placement
pub mod draw;

/// Serialized picture format (headers, bag, block records)
pub mod format;

/// The picture container
pub mod picture;

/// Windowed byte sources
pub mod provider;

// Re-export commonly used types for convenience
pub use animator::Animator;
pub use codec::{PictureKind, PictureMetadata, Timeline};
pub use common::{Error, Rect, Result, Size};
pub use config::{PictureConfig, PlatformBridge, SelectionPolicy};
pub use data::{MetaOp, PictureData, VariantKind};
pub use draw::{DrawPurpose, DrawSettings, DrawingSurface, ScaleMode, SplitInfo};
pub use format::{ReadOptions, SaveOptions};
pub use picture::Picture;
pub use provider::{ByteRange, PictureDataProvider};
