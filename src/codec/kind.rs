//! Picture kinds and their block tags.
//!
//! Every representation stored in a container is tagged with a four-character
//! code in its block record. The tag decides which picture data variant is
//! built on read; unknown tags are kept as opaque entries.

/// Build a block tag from four ASCII bytes (big-endian numeric value).
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

/// Broad family of a representation, deciding its capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Pixel formats decoded to RGBA frames
    Raster,
    /// Resolution independent documents handed to the surface undecoded
    Vector,
    /// Legacy platform metafiles rendered through the platform bridge
    Native,
    /// Combination of two child pictures
    Composite,
    /// A whole nested picture container
    Container,
    /// Bytes preserved without interpretation
    Opaque,
}

/// Concrete encoding of one representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureKind {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
    Svg,
    /// Composite of two child pictures
    Meta,
    /// Nested picture container
    Picture,
    /// Enhanced Metafile
    Emf,
    /// Windows Metafile
    Wmf,
    /// Macintosh PICT
    Pict,
    /// Opaque payload stored with its own key
    Blob,
    /// Tag this build does not know
    Unknown(u32),
}

impl PictureKind {
    /// Every kind this build knows, in registry order.
    pub const KNOWN: [PictureKind; 13] = [
        PictureKind::Png,
        PictureKind::Jpeg,
        PictureKind::Gif,
        PictureKind::Bmp,
        PictureKind::Tiff,
        PictureKind::WebP,
        PictureKind::Svg,
        PictureKind::Meta,
        PictureKind::Picture,
        PictureKind::Emf,
        PictureKind::Wmf,
        PictureKind::Pict,
        PictureKind::Blob,
    ];

    /// Block tag written in the container.
    pub const fn tag(&self) -> u32 {
        match self {
            Self::Png => fourcc(b"PNG "),
            Self::Jpeg => fourcc(b"JPEG"),
            Self::Gif => fourcc(b"GIF "),
            Self::Bmp => fourcc(b"BMP "),
            Self::Tiff => fourcc(b"TIFF"),
            Self::WebP => fourcc(b"WEBP"),
            Self::Svg => fourcc(b"SVG "),
            Self::Meta => fourcc(b"META"),
            Self::Picture => fourcc(b"VPIC"),
            Self::Emf => fourcc(b"EMF "),
            Self::Wmf => fourcc(b"WMF "),
            Self::Pict => fourcc(b"PICT"),
            Self::Blob => fourcc(b"BLOB"),
            Self::Unknown(tag) => *tag,
        }
    }

    /// Parse a block tag. Never fails: unknown tags map to [`PictureKind::Unknown`].
    pub fn from_tag(tag: u32) -> Self {
        Self::KNOWN
            .iter()
            .copied()
            .find(|kind| kind.tag() == tag)
            .unwrap_or(Self::Unknown(tag))
    }

    pub const fn family(&self) -> Family {
        match self {
            Self::Png | Self::Jpeg | Self::Gif | Self::Bmp | Self::Tiff | Self::WebP => {
                Family::Raster
            },
            Self::Svg => Family::Vector,
            Self::Meta => Family::Composite,
            Self::Picture => Family::Container,
            Self::Emf | Self::Wmf | Self::Pict => Family::Native,
            Self::Blob | Self::Unknown(_) => Family::Opaque,
        }
    }

    /// Canonical mime type, used as the entry key in a picture.
    ///
    /// Blob entries carry their own key and unknown tags get a synthetic one,
    /// so both return `None` here.
    pub const fn mime_type(&self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Gif => Some("image/gif"),
            Self::Bmp => Some("image/bmp"),
            Self::Tiff => Some("image/tiff"),
            Self::WebP => Some("image/webp"),
            Self::Svg => Some("image/svg+xml"),
            Self::Meta => Some("application/x-pictura-meta"),
            Self::Picture => Some("application/x-pictura"),
            Self::Emf => Some("image/x-emf"),
            Self::Wmf => Some("image/x-wmf"),
            Self::Pict => Some("image/x-pict"),
            Self::Blob | Self::Unknown(_) => None,
        }
    }

    /// Key used for an entry of this kind when no explicit key exists.
    pub fn default_key(&self) -> String {
        match self.mime_type() {
            Some(mime) => mime.to_string(),
            None => match self {
                Self::Unknown(tag) => format!("application/x-pictura-kind-{:08x}", tag),
                _ => "application/octet-stream".to_string(),
            },
        }
    }

    /// Preferred file extension.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::WebP => "webp",
            Self::Svg => "svg",
            Self::Meta => "pmeta",
            Self::Picture => "pictura",
            Self::Emf => "emf",
            Self::Wmf => "wmf",
            Self::Pict => "pict",
            Self::Blob | Self::Unknown(_) => "bin",
        }
    }

    pub const fn is_raster(&self) -> bool {
        matches!(self.family(), Family::Raster)
    }

    pub const fn is_opaque(&self) -> bool {
        matches!(self.family(), Family::Opaque)
    }

    /// Formats that may carry several frames.
    pub const fn is_animated_format(&self) -> bool {
        matches!(self, Self::Gif)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for kind in PictureKind::KNOWN {
            assert_eq!(PictureKind::from_tag(kind.tag()), kind);
        }
        assert_eq!(
            PictureKind::from_tag(0x1234_5678),
            PictureKind::Unknown(0x1234_5678)
        );
    }

    #[test]
    fn test_tag_is_readable_ascii() {
        assert_eq!(PictureKind::Png.tag().to_be_bytes(), *b"PNG ");
    }

    #[test]
    fn test_families() {
        assert_eq!(PictureKind::Jpeg.family(), Family::Raster);
        assert_eq!(PictureKind::Svg.family(), Family::Vector);
        assert_eq!(PictureKind::Wmf.family(), Family::Native);
        assert!(PictureKind::Unknown(7).is_opaque());
    }

    #[test]
    fn test_default_keys() {
        assert_eq!(PictureKind::Png.default_key(), "image/png");
        assert_eq!(
            PictureKind::Unknown(0xABCD).default_key(),
            "application/x-pictura-kind-0000abcd"
        );
    }
}
