//! Codec registry, format sniffing and header probes.
//!
//! A codec here is a description of an encoding (kind, mime type,
//! extensions, capabilities) plus the cheap header-level operations the
//! picture layer needs before deciding to decode anything:
//!
//! - [`sniff`]: identify bytes by their magic numbers
//! - [`probe_size`]: read the intrinsic size from the header
//! - [`metadata::extract`]: EXIF/TIFF/GPS and text metadata
//! - [`gif::walk`]: frame timeline of animated GIFs
//!
//! Full pixel decoding is delegated to the `image` crate in [`raster`].
//! Vector documents and native metafiles are never decoded here.

pub mod gif;
pub mod kind;
pub mod metadata;
pub mod metafile;
pub mod raster;
pub mod svg;

pub use gif::Timeline;
pub use kind::{Family, PictureKind};
pub use metadata::{MetadataValue, PictureMetadata};

use crate::common::error::{Error, Result};
use crate::common::geometry::Size;
use metafile::{EmfHeader, PictHeader, WmfPlaceableHeader};
use phf::phf_map;
use std::sync::Arc;

/// Built-in extension table (lowercase, no leading dot)
static EXTENSIONS: phf::Map<&'static str, PictureKind> = phf_map! {
    "png" => PictureKind::Png,
    "jpg" => PictureKind::Jpeg,
    "jpeg" => PictureKind::Jpeg,
    "jpe" => PictureKind::Jpeg,
    "jfif" => PictureKind::Jpeg,
    "gif" => PictureKind::Gif,
    "bmp" => PictureKind::Bmp,
    "dib" => PictureKind::Bmp,
    "tif" => PictureKind::Tiff,
    "tiff" => PictureKind::Tiff,
    "webp" => PictureKind::WebP,
    "svg" => PictureKind::Svg,
    "pmeta" => PictureKind::Meta,
    "pictura" => PictureKind::Picture,
    "emf" => PictureKind::Emf,
    "wmf" => PictureKind::Wmf,
    "pict" => PictureKind::Pict,
    "pct" => PictureKind::Pict,
    "pic" => PictureKind::Pict,
};

/// Mime spellings found in the wild, mapped to the canonical kind
static MIME_ALIASES: phf::Map<&'static str, PictureKind> = phf_map! {
    "image/jpg" => PictureKind::Jpeg,
    "image/pjpeg" => PictureKind::Jpeg,
    "image/x-png" => PictureKind::Png,
    "image/x-ms-bmp" => PictureKind::Bmp,
    "image/x-bmp" => PictureKind::Bmp,
    "image/tif" => PictureKind::Tiff,
    "image/svg" => PictureKind::Svg,
    "image/emf" => PictureKind::Emf,
    "image/wmf" => PictureKind::Wmf,
    "image/pict" => PictureKind::Pict,
};

/// Description of one encoding the picture layer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub kind: PictureKind,
    pub mime_type: String,
    /// Extensions without the leading dot, the first one preferred
    pub extensions: Vec<String>,
    pub family: Family,
    /// Whether entries of this codec can be drawn at all
    pub renderable: bool,
}

impl CodecInfo {
    fn builtin(kind: PictureKind) -> Self {
        let extensions = EXTENSIONS
            .entries()
            .filter(|(_, k)| **k == kind)
            .map(|(ext, _)| ext.to_string());
        // Preferred extension first
        let mut all = vec![kind.extension().to_string()];
        all.extend(extensions.filter(|e| e != kind.extension()));
        Self {
            kind,
            mime_type: kind.default_key(),
            extensions: all,
            family: kind.family(),
            renderable: !kind.is_opaque(),
        }
    }

    /// Case-insensitive extension match; a leading dot is ignored.
    pub fn has_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Set of known codecs: the built-ins plus host-registered opaque ones.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<CodecInfo>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Registry with every built-in kind.
    pub fn new() -> Self {
        Self {
            codecs: PictureKind::KNOWN
                .iter()
                .map(|&kind| Arc::new(CodecInfo::builtin(kind)))
                .collect(),
        }
    }

    /// Register a mime type whose payloads are kept but never rendered.
    ///
    /// Re-registering a known mime type returns the existing codec.
    pub fn register_opaque(&mut self, mime_type: &str, extensions: &[&str]) -> Arc<CodecInfo> {
        if let Some(existing) = self.by_mime(mime_type) {
            return existing;
        }
        let codec = Arc::new(CodecInfo {
            kind: PictureKind::Blob,
            mime_type: mime_type.to_ascii_lowercase(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            family: Family::Opaque,
            renderable: false,
        });
        self.codecs.push(Arc::clone(&codec));
        codec
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CodecInfo>> {
        self.codecs.iter()
    }

    pub fn by_kind(&self, kind: PictureKind) -> Option<Arc<CodecInfo>> {
        self.codecs.iter().find(|c| c.kind == kind).cloned()
    }

    /// Look up by mime type, accepting common aliases.
    pub fn by_mime(&self, mime_type: &str) -> Option<Arc<CodecInfo>> {
        let mime = mime_type.trim().to_ascii_lowercase();
        if let Some(codec) = self.codecs.iter().find(|c| c.mime_type == mime) {
            return Some(Arc::clone(codec));
        }
        MIME_ALIASES
            .get(mime.as_str())
            .and_then(|&kind| self.by_kind(kind))
    }

    /// Look up by file extension (with or without the dot).
    pub fn by_extension(&self, ext: &str) -> Option<Arc<CodecInfo>> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if let Some(&kind) = EXTENSIONS.get(ext.as_str()) {
            return self.by_kind(kind);
        }
        self.codecs.iter().find(|c| c.has_extension(&ext)).cloned()
    }

    /// Identify bytes and return the matching codec.
    pub fn sniff(&self, data: &[u8]) -> Option<Arc<CodecInfo>> {
        sniff(data).and_then(|kind| self.by_kind(kind))
    }
}

/// Bytes read from the head of a source to identify its kind.
///
/// Covers the XML prolog before an SVG root and the 512-byte PICT file
/// header.
pub const SNIFF_LEN: usize = 1024;

/// Identify an encoding from its leading bytes.
///
/// Strong signatures are checked first; the PICT and standard WMF checks
/// rely on a couple of header words and run last.
pub fn sniff(data: &[u8]) -> Option<PictureKind> {
    if crate::format::has_signature(data) {
        return Some(PictureKind::Picture);
    }
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(PictureKind::Png);
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(PictureKind::Jpeg);
    }
    if gif::is_gif(data) {
        return Some(PictureKind::Gif);
    }
    if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        return Some(PictureKind::Tiff);
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some(PictureKind::WebP);
    }
    if EmfHeader::is_emf(data) {
        return Some(PictureKind::Emf);
    }
    if WmfPlaceableHeader::is_placeable(data) {
        return Some(PictureKind::Wmf);
    }
    // BMP file header: "BM" followed by the file size and two reserved zeros
    if data.len() >= 14 && data.starts_with(b"BM") && data[6..10] == [0, 0, 0, 0] {
        return Some(PictureKind::Bmp);
    }
    if svg::is_svg(data) {
        return Some(PictureKind::Svg);
    }
    if WmfPlaceableHeader::is_standard(data) {
        return Some(PictureKind::Wmf);
    }
    if PictHeader::is_pict(data) {
        return Some(PictureKind::Pict);
    }
    None
}

/// Intrinsic size read from the header, without decoding.
pub fn probe_size(kind: PictureKind, data: &[u8]) -> Result<Size> {
    match kind {
        k if k.is_raster() => raster::probe_size(k, data),
        PictureKind::Svg => Ok(svg::probe(data)?.size()),
        PictureKind::Emf => Ok(EmfHeader::parse(data)?.size()),
        PictureKind::Wmf => Ok(WmfPlaceableHeader::parse(data)?.size()),
        PictureKind::Pict => Ok(PictHeader::parse(data)?.size()),
        other => Err(Error::Unsupported(format!(
            "No header probe for {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::metafile::tests::{emf_bytes, pict_v2_bytes, wmf_placeable_bytes};
    use crate::codec::raster::tests::png_bytes;

    #[test]
    fn test_sniff_builtin_signatures() {
        assert_eq!(sniff(&png_bytes(1, 1)), Some(PictureKind::Png));
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), Some(PictureKind::Jpeg));
        assert_eq!(sniff(b"GIF87a\x01\x00"), Some(PictureKind::Gif));
        assert_eq!(sniff(b"II*\0\x08\0\0\0"), Some(PictureKind::Tiff));
        assert_eq!(sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(PictureKind::WebP));
        assert_eq!(sniff(&emf_bytes(10, 10)), Some(PictureKind::Emf));
        assert_eq!(sniff(&wmf_placeable_bytes(10, 10, 1440)), Some(PictureKind::Wmf));
        assert_eq!(sniff(&pict_v2_bytes(10, 10)), Some(PictureKind::Pict));
        assert_eq!(sniff(b"<svg width='1' height='1'/>"), Some(PictureKind::Svg));
        assert_eq!(sniff(b"plain text"), None);
    }

    #[test]
    fn test_lookup_by_mime_and_extension() {
        let registry = CodecRegistry::new();
        assert_eq!(registry.by_mime("IMAGE/PNG").unwrap().kind, PictureKind::Png);
        assert_eq!(registry.by_mime("image/jpg").unwrap().kind, PictureKind::Jpeg);
        assert_eq!(registry.by_extension(".JPEG").unwrap().kind, PictureKind::Jpeg);
        assert_eq!(registry.by_extension("pct").unwrap().kind, PictureKind::Pict);
        assert!(registry.by_extension("doc").is_none());
        let jpeg = registry.by_kind(PictureKind::Jpeg).unwrap();
        assert_eq!(jpeg.extensions[0], "jpg");
        assert!(jpeg.has_extension("jfif"));
    }

    #[test]
    fn test_register_opaque() {
        let mut registry = CodecRegistry::new();
        let codec = registry.register_opaque("application/x-thumbs", &[".thm"]);
        assert!(!codec.renderable);
        assert_eq!(registry.by_extension("thm").unwrap().mime_type, "application/x-thumbs");
        // Second registration reuses the first
        let again = registry.register_opaque("application/x-thumbs", &[]);
        assert!(Arc::ptr_eq(&codec, &again));
    }

    #[test]
    fn test_probe_size_dispatch() {
        assert_eq!(probe_size(PictureKind::Png, &png_bytes(5, 4)).unwrap(), Size::new(5, 4));
        assert_eq!(
            probe_size(PictureKind::Svg, b"<svg width='10' height='20'/>").unwrap(),
            Size::new(10, 20)
        );
        assert_eq!(probe_size(PictureKind::Emf, &emf_bytes(9, 9)).unwrap(), Size::new(10, 10));
        assert!(probe_size(PictureKind::Blob, b"xx").is_err());
    }
}
