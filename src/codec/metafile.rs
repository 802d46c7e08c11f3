// Legacy metafile header parsing (EMF, WMF, PICT)
//
// Only the headers are read here: enough to sniff the format and report the
// picture frame. Playing the records back is the platform bridge's job.
//
// References:
// - [MS-EMF] 2.3.4.2: EMR_HEADER
// - [MS-WMF] 2.3.2.3: META_PLACEABLE
// - Inside Macintosh: Imaging With QuickDraw, Appendix A

use crate::common::binary::{read_i16_be, read_i16_le, read_u16_be, read_u16_le, read_u32_le};
use crate::common::error::{Error, Result};
use crate::common::geometry::Size;
use zerocopy::FromBytes;
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// Points per inch used to express metafile frames as picture sizes
const POINTS_PER_INCH: i64 = 72;

/// Raw EMF header prefix for zerocopy parsing (44 bytes)
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawEmfHeader {
    /// Record type (must be 0x00000001)
    record_type: u32,
    /// Record size
    record_size: u32,
    bounds_left: i32,
    bounds_top: i32,
    bounds_right: i32,
    bounds_bottom: i32,
    /// Frame in .01 millimeter units
    frame_left: i32,
    frame_top: i32,
    frame_right: i32,
    frame_bottom: i32,
    /// Signature (must be 0x464D4520 " EMF")
    signature: u32,
}

/// EMF header information
#[derive(Debug, Clone)]
pub struct EmfHeader {
    /// Bounds of the metafile in device units (inclusive)
    pub bounds: (i32, i32, i32, i32),
    /// Frame rectangle in .01 millimeter units
    pub frame: (i32, i32, i32, i32),
}

impl EmfHeader {
    const SIGNATURE: u32 = 0x464D4520;

    /// Check the record type and the signature at offset 40.
    pub fn is_emf(data: &[u8]) -> bool {
        read_u32_le(data, 0).is_ok_and(|t| t == 1)
            && read_u32_le(data, 40).is_ok_and(|s| s == Self::SIGNATURE)
    }

    /// Parse EMF header from data
    pub fn parse(data: &[u8]) -> Result<Self> {
        // Struct fields are native-endian; the layout matches on the
        // little-endian hosts this is built for, the checks below reject others.
        let (raw, _) = RawEmfHeader::read_from_prefix(data)
            .map_err(|_| Error::ParseError("EMF header too short".into()))?;

        if raw.record_type != 0x00000001 {
            return Err(Error::ParseError(format!(
                "Invalid EMF header record type: 0x{:08X}",
                raw.record_type
            )));
        }
        if raw.signature != Self::SIGNATURE {
            return Err(Error::ParseError(format!(
                "Invalid EMF signature: 0x{:08X}",
                raw.signature
            )));
        }
        if (raw.record_size as usize) < 88 {
            return Err(Error::ParseError("EMF header record too small".into()));
        }

        Ok(Self {
            bounds: (
                raw.bounds_left,
                raw.bounds_top,
                raw.bounds_right,
                raw.bounds_bottom,
            ),
            frame: (
                raw.frame_left,
                raw.frame_top,
                raw.frame_right,
                raw.frame_bottom,
            ),
        })
    }

    /// Picture size from the inclusive device bounds
    pub fn size(&self) -> Size {
        let (left, top, right, bottom) = self.bounds;
        Size::new(
            (right as i64 - left as i64 + 1).max(0) as u32,
            (bottom as i64 - top as i64 + 1).max(0) as u32,
        )
    }
}

/// WMF placeable header (Aldus Placeable Metafile)
#[derive(Debug, Clone)]
pub struct WmfPlaceableHeader {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
    /// Logical units per inch
    pub inch: u16,
}

impl WmfPlaceableHeader {
    const PLACEABLE_KEY: u32 = 0x9AC6CDD7;

    /// Check if data starts with a placeable header
    pub fn is_placeable(data: &[u8]) -> bool {
        read_u32_le(data, 0).is_ok_and(|key| key == Self::PLACEABLE_KEY)
    }

    /// Standard (non placeable) header: type 1 or 2, header size 9 words
    pub fn is_standard(data: &[u8]) -> bool {
        matches!(read_u16_le(data, 0), Ok(1) | Ok(2)) && read_u16_le(data, 2).is_ok_and(|s| s == 9)
    }

    /// Parse placeable header from data
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 22 {
            return Err(Error::ParseError("WMF placeable header too short".into()));
        }
        if !Self::is_placeable(data) {
            return Err(Error::ParseError("Missing WMF placeable key".into()));
        }

        Ok(Self {
            left: read_i16_le(data, 6)?,
            top: read_i16_le(data, 8)?,
            right: read_i16_le(data, 10)?,
            bottom: read_i16_le(data, 12)?,
            inch: read_u16_le(data, 14)?,
        })
    }

    /// Picture size in points
    pub fn size(&self) -> Size {
        let inch = if self.inch == 0 { 1440 } else { self.inch as i64 };
        let width = (self.right as i64 - self.left as i64).abs() * POINTS_PER_INCH / inch;
        let height = (self.bottom as i64 - self.top as i64).abs() * POINTS_PER_INCH / inch;
        Size::new(width as u32, height as u32)
    }
}

/// PICT file version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictVersion {
    /// Version 1 (original format)
    V1,
    /// Version 2 (extended format)
    V2,
}

/// PICT file header
///
/// PICT files may have an optional 512-byte header (used by some applications)
/// followed by the actual PICT data.
#[derive(Debug, Clone)]
pub struct PictHeader {
    pub version: PictVersion,
    /// Picture frame (top, left, bottom, right)
    pub frame: (i16, i16, i16, i16),
    pub has_512_header: bool,
}

impl PictHeader {
    /// Find the picture start and version opcode, if any.
    fn locate(data: &[u8]) -> Option<(usize, PictVersion)> {
        for start in [0usize, 512] {
            let opcode_at = start + 10;
            // Version 2: 0x0011 0x02FF, version 1: 0x11 0x01
            if read_u16_be(data, opcode_at).is_ok_and(|op| op == 0x0011)
                && read_u16_be(data, opcode_at + 2).is_ok_and(|v| v == 0x02FF)
            {
                return Some((start, PictVersion::V2));
            }
            if data.get(opcode_at) == Some(&0x11) && data.get(opcode_at + 1) == Some(&0x01) {
                return Some((start, PictVersion::V1));
            }
        }
        None
    }

    pub fn is_pict(data: &[u8]) -> bool {
        Self::locate(data).is_some()
    }

    /// Parse PICT header from data
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (offset, version) = Self::locate(data)
            .ok_or_else(|| Error::ParseError("No PICT version opcode found".into()))?;

        // picSize (2 bytes) then picFrame (8 bytes), big-endian
        let top = read_i16_be(data, offset + 2)?;
        let left = read_i16_be(data, offset + 4)?;
        let bottom = read_i16_be(data, offset + 6)?;
        let right = read_i16_be(data, offset + 8)?;

        Ok(Self {
            version,
            frame: (top, left, bottom, right),
            has_512_header: offset == 512,
        })
    }

    pub fn width(&self) -> i16 {
        self.frame.3.saturating_sub(self.frame.1)
    }

    pub fn height(&self) -> i16 {
        self.frame.2.saturating_sub(self.frame.0)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width().max(0) as u32, self.height().max(0) as u32)
    }
}
