//! Writing pictures in the current (V7, little-endian) layout.

use super::bag::Bag;
use super::block::BlockRecord;
use super::header::Header;
use super::{PictureEnvelope, SaveOptions};
use crate::accumulator::Accumulator;
use crate::common::binary::ByteWriter;
use crate::common::error::{Error, Result};
use crate::data::PictureData;
use std::sync::Arc;

const HEADER_LEN: usize = 28;

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidFormat(format!("{} exceeds 4 GiB: {} bytes", what, value)))
}

/// Serialize a picture.
///
/// All entries share one accumulator, so composite children that appear
/// several times are written once. A picture with no entries and no
/// outside reference produces no bytes unless `even_if_empty` is set.
pub fn write_picture(
    envelope: &PictureEnvelope,
    entries: &[Arc<PictureData>],
    options: &SaveOptions,
) -> Result<Vec<u8>> {
    if entries.is_empty() && envelope.outside.is_none() && !options.even_if_empty {
        return Ok(Vec::new());
    }

    let mut bag = ByteWriter::new();
    Bag::from_envelope(envelope).write(&mut bag)?;

    let mut extensions = ByteWriter::new();
    for (tag, bytes) in &envelope.extensions {
        extensions.put_u32(*tag);
        extensions.put_u32(to_u32(bytes.len(), "Extension record")?);
        extensions.put_bytes(bytes);
    }

    let mut acc = Accumulator::new();
    let mut payloads = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut payload = ByteWriter::new();
        entry.save(&mut payload, &mut acc)?;
        payloads.push(payload.into_inner());
    }

    let records_at = HEADER_LEN + bag.len() + extensions.len() + envelope.extra_data.len();
    let payloads_at = records_at + entries.len() * BlockRecord::LEN;
    let total = payloads_at + payloads.iter().map(Vec::len).sum::<usize>();
    let total = to_u32(total, "Picture")?;

    let mut out = ByteWriter::with_capacity(total as usize);
    Header::current(
        entries.len() as u32,
        total,
        bag.len() as u32,
        extensions.len() as u32,
        to_u32(envelope.extra_data.len(), "Extra data")?,
    )
    .write(&mut out);
    out.put_bytes(bag.as_slice());
    out.put_bytes(extensions.as_slice());
    out.put_bytes(&envelope.extra_data);

    let mut offset = payloads_at;
    for (entry, payload) in entries.iter().zip(&payloads) {
        let size = entry.declared_size().unwrap_or_else(|| entry.size_hint());
        let resolution = entry.resolution();
        BlockRecord {
            tag: entry.tag(),
            flags: entry.flags(),
            h_res: resolution.horizontal,
            v_res: resolution.vertical,
            width: size.width.min(i32::MAX as u32) as i32,
            height: size.height.min(i32::MAX as u32) as i32,
            data_offset: offset as u32,
            data_size: payload.len() as u32,
        }
        .write(&mut out);
        offset += payload.len();
    }
    for payload in &payloads {
        out.put_bytes(payload);
    }
    log::debug!("Serialized picture: {} entries, {} bytes", entries.len(), total);
    Ok(out.into_inner())
}
