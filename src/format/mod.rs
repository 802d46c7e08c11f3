//! Serialized picture format.
//!
//! ```text
//! +--------+-----+-----------------+------------+--------------+----------+
//! | header | bag | extension table | extra data | block records | payloads |
//! +--------+-----+-----------------+------------+--------------+----------+
//! ```
//!
//! The header comes in seven versions; V2 to V4 extend V1 with fixed legacy
//! fields, V5 to V7 restart after V1 and move every setting into the bag.
//! This crate always writes V7 in little-endian order and reads every
//! version in either byte order (the signature tells which).
//!
//! Block record offsets are relative to the start of the serialized
//! picture, so a picture can be embedded anywhere in a larger stream.

mod bag;
mod block;
mod header;
mod reader;
mod writer;

pub use bag::{Bag, BagValue};
pub use block::{BlockFlags, BlockRecord};
pub use header::{Header, MAX_HEADER_LEN};
pub use reader::{ReadPicture, read_picture};
pub use writer::write_picture;

#[cfg(test)]
pub(crate) use reader::tests::v7_be;

use crate::common::binary::{ByteOrder, read_u32_be, read_u32_le};
use crate::common::geometry::AffineTransform;
use crate::draw::SplitInfo;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `PCTV` in file order.
pub const SIGNATURE: u32 = u32::from_le_bytes(*b"PCTV");

/// Header version written by this crate.
pub const CURRENT_VERSION: u32 = 7;

/// Byte order announced by the signature at the start of `data`.
pub fn detect_order(data: &[u8]) -> Option<ByteOrder> {
    if read_u32_le(data, 0).is_ok_and(|s| s == SIGNATURE) {
        Some(ByteOrder::Little)
    } else if read_u32_be(data, 0).is_ok_and(|s| s == SIGNATURE) {
        Some(ByteOrder::Big)
    } else {
        None
    }
}

/// True when `data` starts with a picture container signature.
pub fn has_signature(data: &[u8]) -> bool {
    detect_order(data).is_some()
}

/// Options for reading a serialized picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Keep blocks and inputs this build cannot interpret as opaque entries
    /// instead of dropping or rejecting them
    pub allow_unknown_data: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            allow_unknown_data: true,
        }
    }
}

impl ReadOptions {
    pub fn strict() -> Self {
        Self {
            allow_unknown_data: false,
        }
    }
}

/// Options for writing a picture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Write a header even when the picture holds nothing
    pub even_if_empty: bool,
}

/// Legacy end-of-picture point and transfer mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicEnd {
    pub x: i32,
    pub y: i32,
    pub mode: u32,
}

/// Drawing settings stored with a picture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PictureSettings {
    pub pic_end: PicEnd,
    pub matrix: AffineTransform,
    pub split: SplitInfo,
}

/// Reference to the file a picture is loaded from instead of inline data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutsideRef {
    pub path: PathBuf,
    /// Resolve `path` against the configured base directory
    pub relative: bool,
}

/// Everything a serialized picture carries besides its entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PictureEnvelope {
    pub settings: PictureSettings,
    pub source_name: Option<String>,
    pub outside: Option<OutsideRef>,
    /// Tagged extension records, written back in order
    pub extensions: Vec<(u32, Bytes)>,
    /// Opaque host data
    pub extra_data: Bytes,
    /// Bag keys this build does not interpret
    pub extra_bag: Bag,
}

impl PictureEnvelope {
    /// True when nothing but entries would be written.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_orders() {
        assert_eq!(detect_order(b"PCTV\x07\0\0\0"), Some(ByteOrder::Little));
        assert_eq!(detect_order(b"VTCP\0\0\0\x07"), Some(ByteOrder::Big));
        assert_eq!(detect_order(b"PCT"), None);
        assert!(!has_signature(b"\x89PNG"));
    }
}
