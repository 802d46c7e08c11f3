//! Raster decoding and encoding through the `image` crate.
//!
//! Decoding produces RGBA frames. Animated GIFs keep every frame; the other
//! formats yield exactly one. Encoding always targets PNG, which is what
//! derived pictures (thumbnails, grayscale copies, crops) are stored as.

use crate::codec::PictureKind;
use crate::common::error::{Error, Result};
use crate::common::geometry::Size;
use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;

/// `image` format for a raster kind.
pub fn image_format(kind: PictureKind) -> Option<ImageFormat> {
    match kind {
        PictureKind::Png => Some(ImageFormat::Png),
        PictureKind::Jpeg => Some(ImageFormat::Jpeg),
        PictureKind::Gif => Some(ImageFormat::Gif),
        PictureKind::Bmp => Some(ImageFormat::Bmp),
        PictureKind::Tiff => Some(ImageFormat::Tiff),
        PictureKind::WebP => Some(ImageFormat::WebP),
        _ => None,
    }
}

fn require_format(kind: PictureKind) -> Result<ImageFormat> {
    image_format(kind)
        .ok_or_else(|| Error::Unsupported(format!("{:?} is not a raster format", kind)))
}

/// Read the pixel dimensions from the header without decoding pixels.
pub fn probe_size(kind: PictureKind, data: &[u8]) -> Result<Size> {
    let format = require_format(kind)?;
    let (width, height) = ImageReader::with_format(Cursor::new(data), format).into_dimensions()?;
    Ok(Size::new(width, height))
}

/// Decode every frame of the picture to RGBA.
pub fn decode(kind: PictureKind, data: &[u8]) -> Result<Vec<RgbaImage>> {
    let format = require_format(kind)?;
    if format == ImageFormat::Gif {
        let decoder = GifDecoder::new(Cursor::new(data))?;
        let frames = decoder.into_frames().collect_frames()?;
        if frames.is_empty() {
            return Err(Error::DecodeError("GIF has no frames".into()));
        }
        return Ok(frames.into_iter().map(|frame| frame.into_buffer()).collect());
    }

    let img = image::load_from_memory_with_format(data, format)?;
    Ok(vec![img.to_rgba8()])
}

/// Encode an RGBA image as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| Error::Other(format!("Failed to encode image: {}", e)))?;
    Ok(buffer.into_inner())
}

/// Scale to fit within `max` while keeping the aspect ratio.
///
/// Images already inside the box are returned unscaled.
pub fn fit_within(image: &RgbaImage, max: Size) -> RgbaImage {
    let (w, h) = image.dimensions();
    if max.is_empty() || (w <= max.width && h <= max.height) {
        return image.clone();
    }
    let ratio = f64::min(max.width as f64 / w as f64, max.height as f64 / h as f64);
    let nw = ((w as f64 * ratio).round() as u32).max(1);
    let nh = ((h as f64 * ratio).round() as u32).max(1);
    image::imageops::resize(image, nw, nh, FilterType::Lanczos3)
}

/// Luminance copy, alpha preserved.
pub fn grayscale(image: &RgbaImage) -> RgbaImage {
    DynamicImage::ImageRgba8(image.clone())
        .grayscale()
        .to_rgba8()
}

/// Copy the pixels of a sub-rectangle, clamped to the image.
pub fn crop(image: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> Result<RgbaImage> {
    let (w, h) = image.dimensions();
    if x >= w || y >= h || width == 0 || height == 0 {
        return Err(Error::OutOfRange {
            offset: x as u64,
            size: width as u64,
            available: w as u64,
        });
    }
    let width = width.min(w - x);
    let height = height.min(h - y);
    Ok(image::imageops::crop_imm(image, x, y, width, height).to_image())
}
