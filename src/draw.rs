//! Drawing contract between pictures and the host's graphics backend.
//!
//! The crate never rasterizes anything itself. Decoded raster frames, vector
//! documents and native metafiles are handed to a [`DrawingSurface`], which
//! the host implements on top of its own graphics context. This module only
//! computes where things go.

use crate::codec::PictureKind;
use crate::common::error::Result;
use crate::common::geometry::{AffineTransform, Rect, Size};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Upper bound on tiles produced by [`ScaleMode::Tile`]
const MAX_TILES: usize = 4096;

/// Pixel sampling used when scaling raster frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    Nearest,
    #[default]
    Smooth,
}

/// How the picture is placed in the destination rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScaleMode {
    /// Natural size at the destination origin
    None,
    /// Fill the destination, ignoring the aspect ratio
    #[default]
    Stretch,
    /// Largest aspect-preserving size that fits, centered
    Fit,
    /// Natural size, centered
    Center,
    /// Natural size, repeated from the destination origin
    Tile,
}

/// What the draw is for; print picks the print representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawPurpose {
    #[default]
    Display,
    Print,
}

/// Legacy tiling: the destination is cut into `rows × cols` cells and the
/// picture is drawn once per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitInfo {
    pub enabled: bool,
    pub rows: u32,
    pub cols: u32,
}

impl SplitInfo {
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self {
            enabled: true,
            rows,
            cols,
        }
    }

    /// True when splitting changes anything.
    pub fn is_active(&self) -> bool {
        self.enabled && self.rows.max(1) * self.cols.max(1) > 1
    }

    /// Grid cells of `dest`, row by row.
    pub fn cells(&self, dest: Rect) -> Vec<Rect> {
        if !self.is_active() {
            return vec![dest];
        }
        let rows = self.rows.max(1);
        let cols = self.cols.max(1);
        let w = dest.width / cols as f64;
        let h = dest.height / rows as f64;
        (0..rows)
            .flat_map(|r| {
                (0..cols).map(move |c| Rect::new(dest.x + c as f64 * w, dest.y + r as f64 * h, w, h))
            })
            .collect()
    }
}

/// Options for one draw call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawSettings {
    pub interpolation: Interpolation,
    /// 0.0 (transparent) to 1.0 (opaque)
    pub opacity: f32,
    /// Applied on top of the surface transform for the duration of the draw
    pub transform: AffineTransform,
    /// Frame of an animated picture
    pub frame: usize,
    pub scale_mode: ScaleMode,
    pub split: SplitInfo,
    pub purpose: DrawPurpose,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::default(),
            opacity: 1.0,
            transform: AffineTransform::IDENTITY,
            frame: 0,
            scale_mode: ScaleMode::default(),
            split: SplitInfo::default(),
            purpose: DrawPurpose::default(),
        }
    }
}

impl DrawSettings {
    pub fn for_print() -> Self {
        Self {
            purpose: DrawPurpose::Print,
            ..Self::default()
        }
    }

    pub fn with_frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_scale_mode(mut self, mode: ScaleMode) -> Self {
        self.scale_mode = mode;
        self
    }

    /// Settings for parts of a picture already placed by the outer draw:
    /// transform, opacity, split and scaling have been applied.
    pub(crate) fn nested(&self) -> Self {
        Self {
            transform: AffineTransform::IDENTITY,
            opacity: 1.0,
            split: SplitInfo::default(),
            scale_mode: ScaleMode::Stretch,
            ..self.clone()
        }
    }
}

/// Graphics backend supplied by the host.
pub trait DrawingSurface {
    /// Draw a decoded RGBA frame into `dest`.
    fn draw_raster(&mut self, image: &RgbaImage, dest: Rect, settings: &DrawSettings) -> Result<()>;

    /// Draw a vector document (SVG bytes) into `dest`.
    fn draw_vector(
        &mut self,
        kind: PictureKind,
        data: &[u8],
        dest: Rect,
        settings: &DrawSettings,
    ) -> Result<()>;

    /// Draw a native metafile the platform bridge could not handle.
    fn draw_native(
        &mut self,
        _kind: PictureKind,
        _data: &[u8],
        _dest: Rect,
        _settings: &DrawSettings,
    ) -> Result<()> {
        Ok(())
    }

    fn transform(&self) -> AffineTransform;

    fn set_transform(&mut self, transform: AffineTransform);

    /// Start a group composited with `opacity`.
    fn begin_layer(&mut self, opacity: f32);

    fn end_layer(&mut self);
}

/// Target rectangles for an image of `image_size` drawn into `dest`.
///
/// Empty images or destinations produce no rectangles.
pub fn layout(image_size: Size, dest: Rect, mode: ScaleMode) -> Vec<Rect> {
    if image_size.is_empty() || dest.is_empty() {
        return Vec::new();
    }
    let (w, h) = (image_size.width as f64, image_size.height as f64);
    match mode {
        ScaleMode::Stretch => vec![dest],
        ScaleMode::None => vec![Rect::new(dest.x, dest.y, w, h)],
        ScaleMode::Center => vec![Rect::new(
            dest.x + (dest.width - w) / 2.0,
            dest.y + (dest.height - h) / 2.0,
            w,
            h,
        )],
        ScaleMode::Fit => {
            let scale = f64::min(dest.width / w, dest.height / h);
            let (fw, fh) = (w * scale, h * scale);
            vec![Rect::new(
                dest.x + (dest.width - fw) / 2.0,
                dest.y + (dest.height - fh) / 2.0,
                fw,
                fh,
            )]
        },
        ScaleMode::Tile => {
            let cols = (dest.width / w).ceil() as usize;
            let rows = (dest.height / h).ceil() as usize;
            if cols.saturating_mul(rows) > MAX_TILES {
                log::warn!("Tiling {}x{} exceeds {} tiles, stretching instead", cols, rows, MAX_TILES);
                return vec![dest];
            }
            (0..rows)
                .flat_map(|r| {
                    (0..cols).map(move |c| Rect::new(dest.x + c as f64 * w, dest.y + r as f64 * h, w, h))
                })
                .collect()
        },
    }
}

/// Run `body` with the settings' transform and opacity applied, restoring
/// the surface state afterwards even when `body` fails.
pub(crate) fn with_settings<F>(
    surface: &mut dyn DrawingSurface,
    settings: &DrawSettings,
    body: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn DrawingSurface) -> Result<()>,
{
    let saved = surface.transform();
    let transformed = !settings.transform.is_identity();
    if transformed {
        surface.set_transform(settings.transform.then(&saved));
    }
    let layered = settings.opacity < 1.0;
    if layered {
        surface.begin_layer(settings.opacity.max(0.0));
    }

    let result = body(surface);

    if layered {
        surface.end_layer();
    }
    if transformed {
        surface.set_transform(saved);
    }
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One recorded surface call.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Raster { size: (u32, u32), dest: Rect, frame: usize },
        Vector { kind: PictureKind, len: usize, dest: Rect },
        Native { kind: PictureKind, dest: Rect },
        BeginLayer(f32),
        EndLayer,
    }

    /// Surface that records every call.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSurface {
        pub calls: Vec<Call>,
        pub transform: AffineTransform,
    }

    impl DrawingSurface for RecordingSurface {
        fn draw_raster(&mut self, image: &RgbaImage, dest: Rect, settings: &DrawSettings) -> Result<()> {
            self.calls.push(Call::Raster {
                size: image.dimensions(),
                dest,
                frame: settings.frame,
            });
            Ok(())
        }

        fn draw_vector(
            &mut self,
            kind: PictureKind,
            data: &[u8],
            dest: Rect,
            _settings: &DrawSettings,
        ) -> Result<()> {
            self.calls.push(Call::Vector {
                kind,
                len: data.len(),
                dest,
            });
            Ok(())
        }

        fn draw_native(
            &mut self,
            kind: PictureKind,
            _data: &[u8],
            dest: Rect,
            _settings: &DrawSettings,
        ) -> Result<()> {
            self.calls.push(Call::Native { kind, dest });
            Ok(())
        }

        fn transform(&self) -> AffineTransform {
            self.transform
        }

        fn set_transform(&mut self, transform: AffineTransform) {
            self.transform = transform;
        }

        fn begin_layer(&mut self, opacity: f32) {
            self.calls.push(Call::BeginLayer(opacity));
        }

        fn end_layer(&mut self) {
            self.calls.push(Call::EndLayer);
        }
    }

    #[test]
    fn test_layout_fit_centers() {
        let rects = layout(Size::new(200, 100), Rect::new(0.0, 0.0, 100.0, 100.0), ScaleMode::Fit);
        assert_eq!(rects, vec![Rect::new(0.0, 25.0, 100.0, 50.0)]);
    }

    #[test]
    fn test_layout_center_and_none() {
        let dest = Rect::new(10.0, 10.0, 100.0, 100.0);
        assert_eq!(
            layout(Size::new(20, 10), dest, ScaleMode::Center),
            vec![Rect::new(50.0, 55.0, 20.0, 10.0)]
        );
        assert_eq!(
            layout(Size::new(20, 10), dest, ScaleMode::None),
            vec![Rect::new(10.0, 10.0, 20.0, 10.0)]
        );
    }

    #[test]
    fn test_layout_tile_covers_destination() {
        let rects = layout(Size::new(30, 30), Rect::new(0.0, 0.0, 70.0, 40.0), ScaleMode::Tile);
        // 3 columns by 2 rows
        assert_eq!(rects.len(), 6);
        assert_eq!(rects[5], Rect::new(60.0, 30.0, 30.0, 30.0));
    }

    #[test]
    fn test_layout_empty() {
        assert!(layout(Size::ZERO, Rect::new(0.0, 0.0, 1.0, 1.0), ScaleMode::Stretch).is_empty());
    }

    #[test]
    fn test_split_cells() {
        let cells = SplitInfo::new(2, 2).cells(Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[3], Rect::new(50.0, 25.0, 50.0, 25.0));
        assert_eq!(SplitInfo::default().cells(Rect::new(0.0, 0.0, 1.0, 1.0)).len(), 1);
    }

    #[test]
    fn test_with_settings_restores_state() {
        let mut surface = RecordingSurface::default();
        let settings = DrawSettings {
            opacity: 0.5,
            transform: AffineTransform::translate(5.0, 0.0),
            ..DrawSettings::default()
        };
        with_settings(&mut surface, &settings, |s| {
            assert!(!s.transform().is_identity());
            Ok(())
        })
        .unwrap();
        assert!(surface.transform.is_identity());
        assert_eq!(surface.calls, vec![Call::BeginLayer(0.5), Call::EndLayer]);
    }
}
