//! Pictures derived from the display bitmap.

use super::Picture;
use crate::codec::{PictureKind, raster};
use crate::common::error::{Error, Result};
use crate::common::geometry::{Rect, Size};
use crate::data::PictureData;
use bytes::Bytes;
use image::RgbaImage;
use std::sync::Arc;

impl Picture {
    /// First frame of the display entry; only bitmaps qualify.
    fn source_raster(&self) -> Result<RgbaImage> {
        let data = self
            .picture_data_for_display()
            .ok_or_else(|| Error::NotFound("picture has no displayable entry".into()))?;
        if !data.is_raster() {
            return Err(Error::Unsupported(format!(
                "derived pictures need a bitmap, found {}",
                data.key()
            )));
        }
        data.raster(0)
            .ok_or_else(|| Error::DecodeError(format!("cannot decode {}", data.key())))
    }

    fn derived(&self, image: &RgbaImage) -> Result<Picture> {
        let png = raster::encode_png(image)?;
        let data = PictureData::with_kind(Arc::clone(&self.config), PictureKind::Png, Bytes::from(png));
        Ok(Picture::from_picture_data_with(Arc::clone(&self.config), Arc::new(data)))
    }

    /// PNG picture scaled to fit in `max_width × max_height`.
    pub fn thumbnail(&self, max_width: u32, max_height: u32) -> Result<Picture> {
        let image = self.source_raster()?;
        self.derived(&raster::fit_within(&image, Size::new(max_width, max_height)))
    }

    /// Grayscale PNG copy.
    pub fn to_grayscale(&self) -> Result<Picture> {
        let image = self.source_raster()?;
        self.derived(&raster::grayscale(&image))
    }

    /// PNG copy of the pixels inside `rect` (in pixel coordinates).
    pub fn sub_picture(&self, rect: Rect) -> Result<Picture> {
        let image = self.source_raster()?;
        let x = rect.x.max(0.0).floor() as u32;
        let y = rect.y.max(0.0).floor() as u32;
        let width = (rect.right().ceil() - x as f64).max(0.0) as u32;
        let height = (rect.bottom().ceil() - y as f64).max(0.0) as u32;
        self.derived(&raster::crop(&image, x, y, width, height)?)
    }
}
