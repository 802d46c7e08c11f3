//! Raster variant: PNG, JPEG, GIF, BMP, TIFF and WebP files.

use super::Decoded;
use crate::codec::{PictureKind, raster};
use bytes::Bytes;

/// Decode every frame; an undecodable file yields [`Decoded::Empty`].
pub(super) fn load(kind: PictureKind, bytes: Bytes) -> Decoded {
    match raster::decode(kind, &bytes) {
        Ok(frames) if !frames.is_empty() => Decoded::Raster { frames },
        Ok(_) => Decoded::Empty,
        Err(e) => {
            log::debug!("Failed to decode {:?} picture: {}", kind, e);
            Decoded::Empty
        },
    }
}
