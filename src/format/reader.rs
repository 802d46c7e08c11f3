//! Reading serialized pictures.
//!
//! Entries are built over sub-range windows of the input provider, so
//! payloads that are never used are never copied out of their source.

use super::bag::{Bag, apply_legacy};
use super::block::{BlockFlags, BlockRecord};
use super::header::{Header, MAX_HEADER_LEN};
use super::{PictureEnvelope, ReadOptions, has_signature};
use crate::accumulator::Accumulator;
use crate::codec::{self, Family, PictureKind};
use crate::common::binary::{ByteOrder, ByteReader};
use crate::common::error::{Error, Result};
use crate::common::geometry::Size;
use crate::config::PictureConfig;
use crate::data::{PictureData, Resolution, VariantKind};
use crate::provider::{ByteRange, PictureDataProvider};
use bytes::Bytes;
use std::sync::Arc;

/// Key of the blob holding a whole picture this build cannot read.
const UNREADABLE_PICTURE_KEY: &str = "application/x-pictura";

/// Key of the blob holding unrecognized input.
const UNKNOWN_INPUT_KEY: &str = "application/octet-stream";

/// Result of reading one picture.
#[derive(Debug, Default)]
pub struct ReadPicture {
    pub envelope: PictureEnvelope,
    /// Entries in stored order
    pub entries: Vec<Arc<PictureData>>,
    /// Bytes consumed from the input
    pub total_size: u64,
}

/// Read the picture at the start of `provider`.
///
/// Input without a container signature is sniffed as a plain image file
/// and becomes a one-entry picture.
pub fn read_picture(
    config: &Arc<PictureConfig>,
    provider: &Arc<PictureDataProvider>,
    options: &ReadOptions,
) -> Result<ReadPicture> {
    provider.throw_last_error()?;
    let available = provider.data_size64();
    if available == 0 {
        return Ok(ReadPicture::default());
    }
    let head = provider.read_range(0, (available as usize).min(MAX_HEADER_LEN))?;

    if !has_signature(&head) {
        let sniffed = provider.read_range(0, (available as usize).min(codec::SNIFF_LEN))?;
        return read_plain(config, provider, &sniffed, options);
    }

    let header = match Header::read(&head) {
        Ok(header) => header,
        Err(Error::UnsupportedVersion(version)) if options.allow_unknown_data => {
            log::warn!("Keeping picture with unsupported header version {} as opaque data", version);
            return whole_input_blob(config, provider, UNREADABLE_PICTURE_KEY);
        },
        Err(e) => return Err(e),
    };

    let total_size = if header.total_size == 0 {
        available
    } else {
        header.total_size as u64
    };
    if total_size > available {
        return Err(Error::CorruptedData(format!(
            "Picture declares {} bytes but only {} are available",
            total_size, available
        )));
    }
    let order = header.order;

    let mut envelope = PictureEnvelope::default();
    apply_legacy(&mut envelope, header.pic_end, header.matrix, header.split);

    let mut pos = header.encoded_len() as u64;
    let bag = provider.read_range(pos, header.bag_size as usize)?;
    Bag::read(&bag, order)?.apply_to(&mut envelope);
    pos += header.bag_size as u64;

    let table = provider.read_range(pos, header.extensions_size as usize)?;
    envelope.extensions = read_extensions(&table, order)?;
    pos += header.extensions_size as u64;

    envelope.extra_data = provider.read_range(pos, header.extra_size as usize)?;
    pos += header.extra_size as u64;

    let records_len = (header.count as usize)
        .checked_mul(BlockRecord::LEN)
        .ok_or_else(|| Error::CorruptedData("Block count overflows".into()))?;
    let records = provider.read_range(pos, records_len)?;
    let records = BlockRecord::read_all(&records, header.count as usize, order)?;

    let mut acc = Accumulator::new();
    let mut entries = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if record.data_end() > total_size {
            log::warn!(
                "Skipping block {} ({:08x}): payload {}..{} lies outside the picture",
                index,
                record.tag,
                record.data_offset,
                record.data_end()
            );
            continue;
        }
        if let Some(entry) = build_entry(config, provider, record, order, &mut acc, options) {
            entries.push(Arc::new(entry));
        }
    }

    Ok(ReadPicture {
        envelope,
        entries,
        total_size,
    })
}

fn build_entry(
    config: &Arc<PictureConfig>,
    provider: &Arc<PictureDataProvider>,
    record: &BlockRecord,
    order: ByteOrder,
    acc: &mut Accumulator,
    options: &ReadOptions,
) -> Option<PictureData> {
    let window = Arc::new(PictureDataProvider::sub_range(
        provider,
        ByteRange::new(record.data_offset as u64, record.data_size as u64),
    ));
    let kind = PictureKind::from_tag(record.tag);
    let data = match kind {
        PictureKind::Unknown(tag) => {
            if !options.allow_unknown_data {
                log::warn!("Skipping block of unknown kind {:08x}", tag);
                return None;
            }
            PictureData::opaque(Arc::clone(config), tag, record.flags, window)
        },
        // Flagged by the writer as not drawable: kept, never selected
        _ if record.flags.contains(BlockFlags::NON_RENDERABLE)
            && matches!(kind.family(), Family::Raster | Family::Vector | Family::Native) =>
        {
            PictureData::opaque(Arc::clone(config), record.tag, record.flags, window)
        },
        _ => {
            let mut data = PictureData::from_provider_in(Arc::clone(config), kind, window, order, acc);
            let degraded = data.variant_kind() == VariantKind::Opaque && kind != PictureKind::Blob;
            if degraded && !options.allow_unknown_data {
                log::warn!("Skipping unreadable {:?} block", kind);
                return None;
            }
            // Composites stay parsed so later child references still resolve
            if record.flags.contains(BlockFlags::NON_RENDERABLE) {
                data.suppress();
            }
            data
        },
    };
    if record.width > 0 && record.height > 0 {
        data.set_declared_size(Some(Size::new(record.width as u32, record.height as u32)));
    }
    if record.h_res > 0 && record.v_res > 0 {
        data.set_resolution(Resolution {
            horizontal: record.h_res,
            vertical: record.v_res,
        });
    }
    Some(data)
}

fn read_extensions(data: &[u8], order: ByteOrder) -> Result<Vec<(u32, Bytes)>> {
    let mut reader = ByteReader::with_order(data, order);
    let mut extensions = Vec::new();
    while reader.remaining() > 0 {
        let tag = reader.read_u32()?;
        let len = reader.read_u32()? as usize;
        extensions.push((tag, Bytes::copy_from_slice(reader.read_bytes(len)?)));
    }
    Ok(extensions)
}

/// Input without a container signature.
fn read_plain(
    config: &Arc<PictureConfig>,
    provider: &Arc<PictureDataProvider>,
    head: &[u8],
    options: &ReadOptions,
) -> Result<ReadPicture> {
    match codec::sniff(head) {
        Some(kind) => {
            let data = PictureData::from_provider(Arc::clone(config), kind, Arc::clone(provider));
            Ok(ReadPicture {
                envelope: PictureEnvelope::default(),
                entries: vec![Arc::new(data)],
                total_size: provider.data_size64(),
            })
        },
        None if options.allow_unknown_data => whole_input_blob(config, provider, UNKNOWN_INPUT_KEY),
        None => Err(Error::InvalidFormat("Not a picture nor a recognized image file".into())),
    }
}

fn whole_input_blob(
    config: &Arc<PictureConfig>,
    provider: &Arc<PictureDataProvider>,
    key: &str,
) -> Result<ReadPicture> {
    let bytes = provider.to_bytes()?;
    let total_size = bytes.len() as u64;
    Ok(ReadPicture {
        envelope: PictureEnvelope::default(),
        entries: vec![Arc::new(PictureData::blob(Arc::clone(config), key, bytes))],
        total_size,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::raster::tests::png_bytes;
    use crate::format::SIGNATURE;

    fn config() -> Arc<PictureConfig> {
        Arc::new(PictureConfig::default())
    }

    fn provider(data: Vec<u8>) -> Arc<PictureDataProvider> {
        Arc::new(PictureDataProvider::from_bytes(Bytes::from(data), ByteRange::ALL))
    }

    /// Big-endian V7 picture with one entry per `(tag, flags, payload)`.
    pub(crate) fn v7_be(blocks: &[(u32, u32, &[u8])]) -> Vec<u8> {
        let records_at = 28usize;
        let payload_at = records_at + blocks.len() * BlockRecord::LEN;
        let total = payload_at + blocks.iter().map(|b| b.2.len()).sum::<usize>();

        let mut out = Vec::new();
        for v in [SIGNATURE, 7, blocks.len() as u32, total as u32, 0, 0, 0] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        let mut offset = payload_at;
        for (tag, flags, payload) in blocks {
            for v in [*tag, *flags, 72, 72, 0, 0, offset as u32, payload.len() as u32] {
                out.extend_from_slice(&v.to_be_bytes());
            }
            offset += payload.len();
        }
        for (_, _, payload) in blocks {
            out.extend_from_slice(payload);
        }
        out
    }

    #[test]
    fn test_big_endian_blocks() {
        let png = png_bytes(3, 2);
        let data = v7_be(&[(PictureKind::Png.tag(), BlockFlags::RASTER.bits(), &png)]);
        let read = read_picture(&config(), &provider(data), &ReadOptions::default()).unwrap();
        assert_eq!(read.entries.len(), 1);
        assert_eq!(read.entries[0].kind(), PictureKind::Png);
        assert_eq!(read.entries[0].width(), 3);
    }

    #[test]
    fn test_unknown_tag_policy() {
        let data = v7_be(&[(0x5858_5858, 0x10, b"opaque!")]);
        let kept = read_picture(&config(), &provider(data.clone()), &ReadOptions::default()).unwrap();
        assert_eq!(kept.entries.len(), 1);
        assert!(!kept.entries[0].is_renderable());
        assert_eq!(kept.entries[0].tag(), 0x5858_5858);
        assert_eq!(kept.entries[0].flags().bits(), 0x10);

        let strict = read_picture(&config(), &provider(data), &ReadOptions::strict()).unwrap();
        assert!(strict.entries.is_empty());
    }

    #[test]
    fn test_non_renderable_flag_is_honored() {
        let svg: &[u8] = b"<svg width='10' height='10'/>";
        let data = v7_be(&[(PictureKind::Svg.tag(), (BlockFlags::VECTOR | BlockFlags::NON_RENDERABLE).bits(), svg)]);
        let read = read_picture(&config(), &provider(data), &ReadOptions::default()).unwrap();
        let entry = &read.entries[0];
        assert!(!entry.is_renderable());
        assert_eq!(entry.key(), "image/svg+xml");
        assert_eq!(entry.bytes().unwrap().as_ref(), svg);
    }

    #[test]
    fn test_plain_image_input() {
        let read = read_picture(&config(), &provider(png_bytes(5, 5)), &ReadOptions::default()).unwrap();
        assert_eq!(read.entries.len(), 1);
        assert_eq!(read.entries[0].key(), "image/png");

        let junk = read_picture(&config(), &provider(b"plain text".to_vec()), &ReadOptions::default()).unwrap();
        assert_eq!(junk.entries[0].key(), UNKNOWN_INPUT_KEY);
        assert!(read_picture(&config(), &provider(b"plain text".to_vec()), &ReadOptions::strict()).is_err());
    }

    #[test]
    fn test_plain_svg_with_prolog() {
        let mut svg = b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n".to_vec();
        svg.extend_from_slice(
            b"<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \
              \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n",
        );
        svg.extend_from_slice(b"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"40\" height=\"30\"/>");
        assert!(svg.len() > MAX_HEADER_LEN);

        let read = read_picture(&config(), &provider(svg), &ReadOptions::default()).unwrap();
        assert_eq!(read.entries.len(), 1);
        let entry = &read.entries[0];
        assert_eq!(entry.kind(), PictureKind::Svg);
        assert!(entry.is_renderable());
        assert_eq!(entry.size_hint(), Size::new(40, 30));
    }

    #[test]
    fn test_plain_pict_with_file_header() {
        use crate::codec::metafile::tests::pict_v2_bytes;

        let mut pict = vec![0u8; 512];
        pict.extend_from_slice(&pict_v2_bytes(20, 30));
        let read = read_picture(&config(), &provider(pict), &ReadOptions::default()).unwrap();
        assert_eq!(read.entries.len(), 1);
        let entry = &read.entries[0];
        assert_eq!(entry.kind(), PictureKind::Pict);
        assert!(entry.is_renderable());
        assert_eq!(entry.size_hint(), Size::new(30, 20));
    }

    #[test]
    fn test_future_version() {
        let mut data = b"PCTV".to_vec();
        for v in [99u32, 0, 16] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let kept = read_picture(&config(), &provider(data.clone()), &ReadOptions::default()).unwrap();
        assert_eq!(kept.entries[0].key(), UNREADABLE_PICTURE_KEY);
        assert_eq!(kept.entries[0].bytes().unwrap().as_ref(), data.as_slice());
        assert!(matches!(
            read_picture(&config(), &provider(data), &ReadOptions::strict()),
            Err(Error::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_out_of_range_block_skipped() {
        let mut data = v7_be(&[(PictureKind::Png.tag(), 0, b"abc")]);
        // Payload size of the first record
        let at = 28 + 28;
        data[at..at + 4].copy_from_slice(&1000u32.to_be_bytes());
        let read = read_picture(&config(), &provider(data), &ReadOptions::default()).unwrap();
        assert!(read.entries.is_empty());
    }

    #[test]
    fn test_truncated_picture() {
        let mut data = v7_be(&[(PictureKind::Png.tag(), 0, b"abc")]);
        data.truncate(40);
        assert!(read_picture(&config(), &provider(data), &ReadOptions::default()).is_err());
    }
}
