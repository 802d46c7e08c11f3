//! Block records: one fixed 32-byte descriptor per entry.

use crate::common::binary::{ByteOrder, ByteReader, ByteWriter};
use crate::common::error::Result;
use bitflags::bitflags;

bitflags! {
    /// Capability flags stored with each block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockFlags: u32 {
        /// Resolution independent content
        const VECTOR = 0x0001;
        /// Pixel content
        const RASTER = 0x0002;
        /// Cannot be drawn
        const NON_RENDERABLE = 0x0004;
    }
}

/// Descriptor of one entry.
///
/// `width`/`height` are the intrinsic size known when the picture was
/// written (0 when unknown); `data_offset` is relative to the start of the
/// serialized picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub tag: u32,
    pub flags: BlockFlags,
    pub h_res: u32,
    pub v_res: u32,
    pub width: i32,
    pub height: i32,
    pub data_offset: u32,
    pub data_size: u32,
}

impl BlockRecord {
    pub const LEN: usize = 32;

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            tag: reader.read_u32()?,
            // Unknown bits survive a round trip
            flags: BlockFlags::from_bits_retain(reader.read_u32()?),
            h_res: reader.read_u32()?,
            v_res: reader.read_u32()?,
            width: reader.read_i32()?,
            height: reader.read_i32()?,
            data_offset: reader.read_u32()?,
            data_size: reader.read_u32()?,
        })
    }

    /// Parse `count` consecutive records.
    pub fn read_all(data: &[u8], count: usize, order: ByteOrder) -> Result<Vec<Self>> {
        let mut reader = ByteReader::with_order(data, order);
        (0..count).map(|_| Self::read(&mut reader)).collect()
    }

    pub fn write(&self, out: &mut ByteWriter) {
        out.put_u32(self.tag);
        out.put_u32(self.flags.bits());
        out.put_u32(self.h_res);
        out.put_u32(self.v_res);
        out.put_i32(self.width);
        out.put_i32(self.height);
        out.put_u32(self.data_offset);
        out.put_u32(self.data_size);
    }

    /// End of the payload, relative to the picture start.
    pub fn data_end(&self) -> u64 {
        self.data_offset as u64 + self.data_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PictureKind;

    #[test]
    fn test_record_layout() {
        let record = BlockRecord {
            tag: PictureKind::Png.tag(),
            flags: BlockFlags::RASTER,
            h_res: 72,
            v_res: 96,
            width: 10,
            height: -1,
            data_offset: 60,
            data_size: 5,
        };
        let mut out = ByteWriter::new();
        record.write(&mut out);
        assert_eq!(out.len(), BlockRecord::LEN);
        assert_eq!(&out.as_slice()[0..4], &PictureKind::Png.tag().to_le_bytes());

        let records = BlockRecord::read_all(out.as_slice(), 1, ByteOrder::Little).unwrap();
        assert_eq!(records, vec![record]);
        assert_eq!(record.data_end(), 65);
    }

    #[test]
    fn test_unknown_flag_bits_retained() {
        let mut out = ByteWriter::new();
        out.put_u32(1);
        out.put_u32(0x8000_0004);
        for _ in 0..6 {
            out.put_u32(0);
        }
        let record = BlockRecord::read_all(out.as_slice(), 1, ByteOrder::Little).unwrap()[0];
        assert!(record.flags.contains(BlockFlags::NON_RENDERABLE));
        assert_eq!(record.flags.bits(), 0x8000_0004);
    }

    #[test]
    fn test_short_input() {
        assert!(BlockRecord::read_all(&[0; 40], 2, ByteOrder::Little).is_err());
    }
}
