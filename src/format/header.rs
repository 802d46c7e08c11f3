//! Versioned picture header.
//!
//! | Ver | Fields after V1                                   | Length |
//! |-----|---------------------------------------------------|--------|
//! | 1   | signature, version, count, total size             | 16     |
//! | 2   | pic end x/y i32, transfer mode u32                | 28     |
//! | 3   | V2 + 3x3 matrix (9 f64)                           | 100    |
//! | 4   | V3 + split enabled, rows, cols (u32)              | 112    |
//! | 5   | bag size                                          | 20     |
//! | 6   | bag size, extension table size                    | 24     |
//! | 7   | bag size, extension table size, extra data size   | 28     |

use super::{CURRENT_VERSION, PicEnd, SIGNATURE, detect_order};
use crate::common::binary::{ByteOrder, ByteReader, ByteWriter};
use crate::common::error::{Error, Result};
use crate::common::geometry::AffineTransform;
use crate::draw::SplitInfo;

const V1_LEN: usize = 16;

/// Longest header of any version (V4).
pub const MAX_HEADER_LEN: usize = 112;

/// Decoded header, normalized over all versions.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub order: ByteOrder,
    pub version: u32,
    /// Number of block records
    pub count: u32,
    /// Size of the whole serialized picture
    pub total_size: u32,
    pub pic_end: Option<PicEnd>,
    pub matrix: Option<AffineTransform>,
    pub split: Option<SplitInfo>,
    pub bag_size: u32,
    pub extensions_size: u32,
    pub extra_size: u32,
}

impl Header {
    /// Encoded length of a header of `version`.
    pub fn len_for(version: u32) -> Option<usize> {
        match version {
            1 => Some(V1_LEN),
            2 => Some(28),
            3 => Some(100),
            4 => Some(MAX_HEADER_LEN),
            5 => Some(20),
            6 => Some(24),
            7 => Some(28),
            _ => None,
        }
    }

    pub fn encoded_len(&self) -> usize {
        Self::len_for(self.version).unwrap_or(V1_LEN)
    }

    /// Offset of the first block record.
    pub fn records_offset(&self) -> u64 {
        self.encoded_len() as u64
            + self.bag_size as u64
            + self.extensions_size as u64
            + self.extra_size as u64
    }

    /// Current-version header for a picture of `count` entries.
    pub fn current(count: u32, total_size: u32, bag_size: u32, extensions_size: u32, extra_size: u32) -> Self {
        Self {
            order: ByteOrder::Little,
            version: CURRENT_VERSION,
            count,
            total_size,
            pic_end: None,
            matrix: None,
            split: None,
            bag_size,
            extensions_size,
            extra_size,
        }
    }

    /// Parse the header at the start of `data`.
    pub fn read(data: &[u8]) -> Result<Self> {
        let order = detect_order(data)
            .ok_or_else(|| Error::InvalidFormat("Missing picture signature".into()))?;
        let mut reader = ByteReader::with_order(data, order);
        reader.skip(4)?;
        let version = reader.read_u32()?;
        let len = Self::len_for(version).ok_or(Error::UnsupportedVersion(version))?;
        if data.len() < len {
            return Err(Error::CorruptedData(format!(
                "Picture header V{} needs {} bytes, got {}",
                version,
                len,
                data.len()
            )));
        }

        let mut header = Self {
            order,
            version,
            count: reader.read_u32()?,
            total_size: reader.read_u32()?,
            pic_end: None,
            matrix: None,
            split: None,
            bag_size: 0,
            extensions_size: 0,
            extra_size: 0,
        };

        if (2..=4).contains(&version) {
            header.pic_end = Some(PicEnd {
                x: reader.read_i32()?,
                y: reader.read_i32()?,
                mode: reader.read_u32()?,
            });
        }
        if (3..=4).contains(&version) {
            let mut m = [0.0; 9];
            for value in &mut m {
                *value = reader.read_f64()?;
            }
            // Old writers left the matrix zeroed when no transform was set
            header.matrix = Some(if m.iter().all(|v| *v == 0.0) {
                AffineTransform::IDENTITY
            } else {
                AffineTransform::from_matrix3(&m)
            });
        }
        if version == 4 {
            let enabled = reader.read_u32()? != 0;
            let rows = reader.read_u32()?;
            let cols = reader.read_u32()?;
            header.split = Some(SplitInfo { enabled, rows, cols });
        }
        if version >= 5 {
            header.bag_size = reader.read_u32()?;
        }
        if version >= 6 {
            header.extensions_size = reader.read_u32()?;
        }
        if version >= 7 {
            header.extra_size = reader.read_u32()?;
        }
        Ok(header)
    }

    /// Write as a little-endian V7 header.
    pub fn write(&self, out: &mut ByteWriter) {
        out.put_u32(SIGNATURE);
        out.put_u32(CURRENT_VERSION);
        out.put_u32(self.count);
        out.put_u32(self.total_size);
        out.put_u32(self.bag_size);
        out.put_u32(self.extensions_size);
        out.put_u32(self.extra_size);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Big-endian V4 header with a translation matrix and a 2x3 split.
    pub(crate) fn v4_be(count: u32, total_size: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&SIGNATURE.to_be_bytes());
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(&count.to_be_bytes());
        data.extend_from_slice(&total_size.to_be_bytes());
        data.extend_from_slice(&(-3i32).to_be_bytes());
        data.extend_from_slice(&9i32.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        for v in [1.0f64, 0.0, 0.0, 0.0, 1.0, 0.0, 10.0, 20.0, 1.0] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        for v in [1u32, 2, 3] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data
    }

    #[test]
    fn test_v7_roundtrip() {
        let mut out = ByteWriter::new();
        Header::current(2, 500, 10, 0, 4).write(&mut out);
        assert_eq!(out.len(), 28);
        let header = Header::read(out.as_slice()).unwrap();
        assert_eq!(header.version, 7);
        assert_eq!(header.count, 2);
        assert_eq!(header.total_size, 500);
        assert_eq!(header.records_offset(), 28 + 10 + 4);
        assert!(header.matrix.is_none());
    }

    #[test]
    fn test_legacy_big_endian_v4() {
        let data = v4_be(0, 112);
        let header = Header::read(&data).unwrap();
        assert_eq!(header.order, ByteOrder::Big);
        assert_eq!(header.encoded_len(), 112);
        assert_eq!(
            header.pic_end,
            Some(PicEnd {
                x: -3,
                y: 9,
                mode: 1
            })
        );
        assert_eq!(header.matrix, Some(AffineTransform::translate(10.0, 20.0)));
        assert_eq!(header.split, Some(SplitInfo::new(2, 3)));
    }

    #[test]
    fn test_v1_and_unknown_versions() {
        let mut v1 = Vec::new();
        v1.extend_from_slice(b"PCTV");
        for v in [1u32, 0, 16] {
            v1.extend_from_slice(&v.to_le_bytes());
        }
        let header = Header::read(&v1).unwrap();
        assert_eq!(header.records_offset(), 16);

        v1[4] = 42;
        assert!(matches!(Header::read(&v1), Err(Error::UnsupportedVersion(42))));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            Header::read(b"PCTV\x07\0\0\0\0\0\0\0"),
            Err(Error::CorruptedData(_))
        ));
    }
}
