//! Picture metadata extraction.
//!
//! Reads EXIF/TIFF/GPS tags, PNG text chunks and GIF comments straight from
//! the encoded bytes. Nothing here decodes pixels, so querying metadata never
//! pays for a full image decode.

use crate::codec::PictureKind;
use crate::codec::gif;
use crate::common::binary::{ByteOrder, ByteReader, read_u32_be, read_u32_le};
use crate::common::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum entries read from a single IFD
const MAX_IFD_ENTRIES: u16 = 512;

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Reals(Vec<f64>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Real(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_reals(&self) -> Option<&[f64]> {
        match self {
            Self::Reals(v) => Some(v),
            _ => None,
        }
    }
}

/// Metadata bag of one representation, grouped the way EXIF groups it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PictureMetadata {
    /// TIFF/IFD0 tags (Make, Model, Orientation, ...)
    pub tiff: BTreeMap<String, MetadataValue>,
    /// Exif sub-IFD tags (DateTimeOriginal, ExposureTime, ...)
    pub exif: BTreeMap<String, MetadataValue>,
    /// GPS sub-IFD tags
    pub gps: BTreeMap<String, MetadataValue>,
    /// Free text (PNG text chunks, GIF comments)
    pub text: BTreeMap<String, MetadataValue>,
}

impl PictureMetadata {
    /// Check if the metadata contains any actual data.
    pub fn has_data(&self) -> bool {
        !(self.tiff.is_empty() && self.exif.is_empty() && self.gps.is_empty() && self.text.is_empty())
    }

    /// EXIF orientation (1..=8), if present.
    pub fn orientation(&self) -> Option<u16> {
        self.tiff
            .get("Orientation")
            .and_then(MetadataValue::as_integer)
            .map(|v| v as u16)
    }

    /// Capture date, falling back to the file modification date.
    pub fn date_time_original(&self) -> Option<NaiveDateTime> {
        self.exif
            .get("DateTimeOriginal")
            .or_else(|| self.tiff.get("DateTime"))
            .and_then(MetadataValue::as_text)
            .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), "%Y:%m:%d %H:%M:%S").ok())
    }

    /// Decimal (latitude, longitude) from the GPS group.
    pub fn gps_coordinates(&self) -> Option<(f64, f64)> {
        let to_decimal = |dms: &[f64]| -> Option<f64> {
            match dms {
                [d, m, s, ..] => Some(d + m / 60.0 + s / 3600.0),
                [d] => Some(*d),
                _ => None,
            }
        };
        let lat = to_decimal(self.gps.get("GPSLatitude")?.as_reals()?)?;
        let lon = to_decimal(self.gps.get("GPSLongitude")?.as_reals()?)?;
        let sign = |key: &str, negative: &str| {
            match self.gps.get(key).and_then(MetadataValue::as_text) {
                Some(r) if r.trim().eq_ignore_ascii_case(negative) => -1.0,
                _ => 1.0,
            }
        };
        Some((
            lat * sign("GPSLatitudeRef", "S"),
            lon * sign("GPSLongitudeRef", "W"),
        ))
    }

    fn merge(&mut self, other: PictureMetadata) {
        self.tiff.extend(other.tiff);
        self.exif.extend(other.exif);
        self.gps.extend(other.gps);
        self.text.extend(other.text);
    }
}

/// Extract metadata from encoded bytes of the given kind.
///
/// Formats without metadata support return an empty bag.
pub fn extract(kind: PictureKind, data: &[u8]) -> Result<PictureMetadata> {
    match kind {
        PictureKind::Jpeg => extract_jpeg(data),
        PictureKind::Tiff => parse_tiff(data),
        PictureKind::Png => extract_png(data),
        PictureKind::WebP => extract_webp(data),
        PictureKind::Gif => {
            let info = gif::walk(data)?;
            let mut meta = PictureMetadata::default();
            for (i, comment) in info.comments.into_iter().enumerate() {
                let key = if i == 0 {
                    "Comment".to_string()
                } else {
                    format!("Comment{}", i + 1)
                };
                meta.text.insert(key, MetadataValue::Text(comment));
            }
            Ok(meta)
        },
        _ => Ok(PictureMetadata::default()),
    }
}

fn extract_jpeg(data: &[u8]) -> Result<PictureMetadata> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(Error::InvalidFormat("Not a JPEG stream".into()));
    }
    let mut meta = PictureMetadata::default();
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        // Fill bytes and parameterless markers
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        // Start of scan: metadata segments are all before it
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > data.len() {
            break;
        }
        let segment = &data[pos + 4..end];
        if marker == 0xE1 && segment.starts_with(b"Exif\0\0") {
            match parse_tiff(&segment[6..]) {
                Ok(exif) => meta.merge(exif),
                Err(e) => log::debug!("Ignoring malformed Exif segment: {}", e),
            }
        } else if marker == 0xFE {
            meta.text.insert(
                "Comment".to_string(),
                MetadataValue::Text(String::from_utf8_lossy(segment).into_owned()),
            );
        }
        pos = end;
    }
    Ok(meta)
}

fn extract_png(data: &[u8]) -> Result<PictureMetadata> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if !data.starts_with(SIGNATURE) {
        return Err(Error::InvalidFormat("Not a PNG stream".into()));
    }
    let mut meta = PictureMetadata::default();
    let mut pos = SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = read_u32_be(data, pos)? as usize;
        let kind = &data[pos + 4..pos + 8];
        let start = pos + 8;
        let Some(end) = start.checked_add(len).filter(|&e| e + 4 <= data.len()) else {
            break;
        };
        let chunk = &data[start..end];
        match kind {
            b"tEXt" => {
                if let Some(sep) = memchr::memchr(0, chunk) {
                    let key: String = chunk[..sep].iter().map(|&b| b as char).collect();
                    let value: String = chunk[sep + 1..].iter().map(|&b| b as char).collect();
                    meta.text.insert(key, MetadataValue::Text(value));
                }
            },
            b"eXIf" => match parse_tiff(chunk) {
                Ok(exif) => meta.merge(exif),
                Err(e) => log::debug!("Ignoring malformed eXIf chunk: {}", e),
            },
            b"IEND" => break,
            _ => {},
        }
        pos = end + 4;
    }
    Ok(meta)
}

fn extract_webp(data: &[u8]) -> Result<PictureMetadata> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(Error::InvalidFormat("Not a WebP stream".into()));
    }
    let mut meta = PictureMetadata::default();
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let len = read_u32_le(data, pos + 4)? as usize;
        let start = pos + 8;
        let Some(end) = start.checked_add(len).filter(|&e| e <= data.len()) else {
            break;
        };
        if &data[pos..pos + 4] == b"EXIF" {
            let chunk = &data[start..end];
            // Some writers keep the JPEG-style prefix
            let chunk = chunk.strip_prefix(b"Exif\0\0").unwrap_or(chunk);
            if let Ok(exif) = parse_tiff(chunk) {
                meta.merge(exif);
            }
        }
        pos = end + (len & 1);
    }
    Ok(meta)
}

#[derive(Clone, Copy)]
enum Ifd {
    Tiff,
    Exif,
    Gps,
}

fn tag_name(ifd: Ifd, tag: u16) -> Option<&'static str> {
    let name = match (ifd, tag) {
        (Ifd::Tiff, 0x0100) => "ImageWidth",
        (Ifd::Tiff, 0x0101) => "ImageLength",
        (Ifd::Tiff, 0x010E) => "ImageDescription",
        (Ifd::Tiff, 0x010F) => "Make",
        (Ifd::Tiff, 0x0110) => "Model",
        (Ifd::Tiff, 0x0112) => "Orientation",
        (Ifd::Tiff, 0x011A) => "XResolution",
        (Ifd::Tiff, 0x011B) => "YResolution",
        (Ifd::Tiff, 0x0128) => "ResolutionUnit",
        (Ifd::Tiff, 0x0131) => "Software",
        (Ifd::Tiff, 0x0132) => "DateTime",
        (Ifd::Tiff, 0x013B) => "Artist",
        (Ifd::Tiff, 0x8298) => "Copyright",
        (Ifd::Exif, 0x829A) => "ExposureTime",
        (Ifd::Exif, 0x829D) => "FNumber",
        (Ifd::Exif, 0x8827) => "ISOSpeedRatings",
        (Ifd::Exif, 0x9003) => "DateTimeOriginal",
        (Ifd::Exif, 0x9004) => "DateTimeDigitized",
        (Ifd::Exif, 0x920A) => "FocalLength",
        (Ifd::Exif, 0xA002) => "PixelXDimension",
        (Ifd::Exif, 0xA003) => "PixelYDimension",
        (Ifd::Exif, 0xA434) => "LensModel",
        (Ifd::Gps, 0x0001) => "GPSLatitudeRef",
        (Ifd::Gps, 0x0002) => "GPSLatitude",
        (Ifd::Gps, 0x0003) => "GPSLongitudeRef",
        (Ifd::Gps, 0x0004) => "GPSLongitude",
        (Ifd::Gps, 0x0005) => "GPSAltitudeRef",
        (Ifd::Gps, 0x0006) => "GPSAltitude",
        (Ifd::Gps, 0x001D) => "GPSDateStamp",
        _ => return None,
    };
    Some(name)
}

/// Parse a TIFF structure (a TIFF file or the body of an Exif segment).
pub fn parse_tiff(data: &[u8]) -> Result<PictureMetadata> {
    let order = match data.get(0..4) {
        Some(b"II*\0") => ByteOrder::Little,
        Some(b"MM\0*") => ByteOrder::Big,
        _ => return Err(Error::InvalidFormat("Missing TIFF header".into())),
    };
    let mut reader = ByteReader::with_order(data, order);
    reader.seek(4)?;
    let ifd0 = reader.read_u32()? as usize;

    let mut meta = PictureMetadata::default();
    let mut visited = Vec::new();
    read_ifd(data, order, ifd0, Ifd::Tiff, &mut meta, &mut visited)?;
    Ok(meta)
}

fn read_ifd(
    data: &[u8],
    order: ByteOrder,
    offset: usize,
    ifd: Ifd,
    meta: &mut PictureMetadata,
    visited: &mut Vec<usize>,
) -> Result<()> {
    if visited.contains(&offset) {
        return Err(Error::CorruptedData("Cyclic TIFF IFD chain".into()));
    }
    visited.push(offset);

    let mut reader = ByteReader::with_order(data, order);
    reader.seek(offset)?;
    let count = reader.read_u16()?.min(MAX_IFD_ENTRIES);

    for _ in 0..count {
        let tag = reader.read_u16()?;
        let field_type = reader.read_u16()?;
        let value_count = reader.read_u32()? as usize;
        let value_pos = reader.position();
        reader.skip(4)?;

        // Sub-IFD pointers
        if matches!(ifd, Ifd::Tiff) && (tag == 0x8769 || tag == 0x8825) {
            let mut sub = ByteReader::with_order(data, order);
            sub.seek(value_pos)?;
            let sub_offset = sub.read_u32()? as usize;
            let sub_ifd = if tag == 0x8769 { Ifd::Exif } else { Ifd::Gps };
            if let Err(e) = read_ifd(data, order, sub_offset, sub_ifd, meta, visited) {
                log::debug!("Skipping unreadable sub-IFD 0x{:04X}: {}", tag, e);
            }
            continue;
        }

        let Some(name) = tag_name(ifd, tag) else {
            continue;
        };
        match read_value(data, order, field_type, value_count, value_pos) {
            Ok(Some(value)) => {
                let group = match ifd {
                    Ifd::Tiff => &mut meta.tiff,
                    Ifd::Exif => &mut meta.exif,
                    Ifd::Gps => &mut meta.gps,
                };
                group.insert(name.to_string(), value);
            },
            Ok(None) => {},
            Err(e) => log::debug!("Skipping unreadable TIFF tag {}: {}", name, e),
        }
    }
    Ok(())
}

fn read_value(
    data: &[u8],
    order: ByteOrder,
    field_type: u16,
    count: usize,
    value_pos: usize,
) -> Result<Option<MetadataValue>> {
    let unit = match field_type {
        1 | 2 | 7 => 1,
        3 => 2,
        4 | 9 => 4,
        5 | 10 => 8,
        _ => return Ok(None),
    };
    let total = unit * count;
    let mut reader = ByteReader::with_order(data, order);
    if total <= 4 {
        reader.seek(value_pos)?;
    } else {
        let mut at = ByteReader::with_order(data, order);
        at.seek(value_pos)?;
        reader.seek(at.read_u32()? as usize)?;
    }

    let value = match field_type {
        2 => {
            let raw = reader.read_bytes(count)?;
            let text = raw.split(|&b| b == 0).next().unwrap_or_default();
            MetadataValue::Text(String::from_utf8_lossy(text).into_owned())
        },
        1 | 7 if count == 1 => MetadataValue::Integer(reader.read_u8()? as i64),
        1 | 7 => return Ok(None),
        3 if count == 1 => MetadataValue::Integer(reader.read_u16()? as i64),
        4 if count == 1 => MetadataValue::Integer(reader.read_u32()? as i64),
        9 if count == 1 => MetadataValue::Integer(reader.read_i32()? as i64),
        3 | 4 | 9 => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(match field_type {
                    3 => reader.read_u16()? as f64,
                    4 => reader.read_u32()? as f64,
                    _ => reader.read_i32()? as f64,
                });
            }
            MetadataValue::Reals(values)
        },
        _ => {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                let (num, den) = if field_type == 5 {
                    (reader.read_u32()? as f64, reader.read_u32()? as f64)
                } else {
                    (reader.read_i32()? as f64, reader.read_i32()? as f64)
                };
                values.push(if den == 0.0 { 0.0 } else { num / den });
            }
            if values.len() == 1 {
                MetadataValue::Real(values[0])
            } else {
                MetadataValue::Reals(values)
            }
        },
    };
    Ok(Some(value))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Little-endian TIFF body with Make, Orientation, an Exif IFD carrying
    /// DateTimeOriginal and a GPS IFD carrying a southern latitude.
    pub(crate) fn tiff_body() -> Vec<u8> {
        let mut d = Vec::new();
        d.extend_from_slice(b"II*\0");
        d.extend_from_slice(&8u32.to_le_bytes());
        // IFD0 at 8: 4 entries
        let ifd0_len = 2 + 4 * 12 + 4;
        let make_off = 8 + ifd0_len;
        let exif_off = make_off + 6;
        let exif_len = 2 + 12 + 4;
        let date_off = exif_off + exif_len;
        let gps_off = date_off + 20;
        let entry = |d: &mut Vec<u8>, tag: u16, ty: u16, count: u32, value: u32| {
            d.extend_from_slice(&tag.to_le_bytes());
            d.extend_from_slice(&ty.to_le_bytes());
            d.extend_from_slice(&count.to_le_bytes());
            d.extend_from_slice(&value.to_le_bytes());
        };
        d.extend_from_slice(&4u16.to_le_bytes());
        entry(&mut d, 0x010F, 2, 6, make_off as u32);
        entry(&mut d, 0x0112, 3, 1, 6);
        entry(&mut d, 0x8769, 4, 1, exif_off as u32);
        entry(&mut d, 0x8825, 4, 1, gps_off as u32);
        d.extend_from_slice(&0u32.to_le_bytes());
        d.extend_from_slice(b"Canon\0");
        // Exif IFD
        d.extend_from_slice(&1u16.to_le_bytes());
        entry(&mut d, 0x9003, 2, 20, date_off as u32);
        d.extend_from_slice(&0u32.to_le_bytes());
        d.extend_from_slice(b"2021:06:01 12:30:45\0");
        // GPS IFD: ref (inline) + latitude (3 rationals)
        let lat_off = gps_off + 2 + 2 * 12 + 4;
        d.extend_from_slice(&2u16.to_le_bytes());
        entry(&mut d, 0x0001, 2, 2, u32::from_le_bytes(*b"S\0\0\0"));
        entry(&mut d, 0x0002, 5, 3, lat_off as u32);
        d.extend_from_slice(&0u32.to_le_bytes());
        for (num, den) in [(33u32, 1u32), (30, 1), (0, 1)] {
            d.extend_from_slice(&num.to_le_bytes());
            d.extend_from_slice(&den.to_le_bytes());
        }
        d
    }

    pub(crate) fn jpeg_with_exif() -> Vec<u8> {
        let body = tiff_body();
        let mut d = vec![0xFF, 0xD8, 0xFF, 0xE1];
        d.extend_from_slice(&((body.len() + 8) as u16).to_be_bytes());
        d.extend_from_slice(b"Exif\0\0");
        d.extend_from_slice(&body);
        d.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9]);
        d
    }

    #[test]
    fn test_jpeg_exif_extraction() {
        let meta = extract(PictureKind::Jpeg, &jpeg_with_exif()).unwrap();
        assert!(meta.has_data());
        assert_eq!(meta.tiff.get("Make").and_then(|v| v.as_text()), Some("Canon"));
        assert_eq!(meta.orientation(), Some(6));
        let date = meta.date_time_original().unwrap();
        assert_eq!(date.to_string(), "2021-06-01 12:30:45");
    }

    #[test]
    fn test_gps_partial_coordinates() {
        let meta = parse_tiff(&tiff_body()).unwrap();
        assert_eq!(
            meta.gps.get("GPSLatitude").and_then(|v| v.as_reals()),
            Some(&[33.0, 30.0, 0.0][..])
        );
        // No longitude recorded
        assert!(meta.gps_coordinates().is_none());
    }

    #[test]
    fn test_png_text_chunks() {
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        let text = b"Title\0Sunset";
        png.extend_from_slice(&(text.len() as u32).to_be_bytes());
        png.extend_from_slice(b"tEXt");
        png.extend_from_slice(text);
        png.extend_from_slice(&[0, 0, 0, 0]);
        png.extend_from_slice(&0u32.to_be_bytes());
        png.extend_from_slice(b"IEND");
        png.extend_from_slice(&[0, 0, 0, 0]);
        let meta = extract(PictureKind::Png, &png).unwrap();
        assert_eq!(meta.text.get("Title").and_then(|v| v.as_text()), Some("Sunset"));
    }

    #[test]
    fn test_cyclic_ifd_is_rejected() {
        let mut d = b"II*\0".to_vec();
        d.extend_from_slice(&8u32.to_le_bytes());
        d.extend_from_slice(&1u16.to_le_bytes());
        d.extend_from_slice(&0x8769u16.to_le_bytes());
        d.extend_from_slice(&4u16.to_le_bytes());
        d.extend_from_slice(&1u32.to_le_bytes());
        d.extend_from_slice(&8u32.to_le_bytes());
        d.extend_from_slice(&0u32.to_le_bytes());
        // The sub-IFD points back at IFD0; the walk stops instead of looping
        let meta = parse_tiff(&d).unwrap();
        assert!(!meta.has_data());
    }

    #[test]
    fn test_formats_without_metadata() {
        let meta = extract(PictureKind::Svg, b"<svg/>").unwrap();
        assert!(!meta.has_data());
    }
}
