//! Bytes kept without interpretation: blobs and blocks of unknown kinds.
//!
//! A blob payload starts with its key (`len u16` + UTF-8) so arbitrary
//! mime types survive a round trip. Unknown tags are written back as read.

use crate::common::binary::{ByteOrder, ByteReader, ByteWriter};
use crate::common::error::{Error, Result};
use crate::provider::{ByteRange, PictureDataProvider};
use std::sync::Arc;

/// Split a blob payload into its key and a window over the remaining bytes.
pub(super) fn split_blob(
    provider: &Arc<PictureDataProvider>,
    order: ByteOrder,
) -> Result<(String, Arc<PictureDataProvider>)> {
    let head = provider.read_range(0, provider.data_size().min(2))?;
    let key_len = ByteReader::with_order(&head, order).read_u16()? as usize;
    let key = provider.read_range(2, key_len)?;
    let key = std::str::from_utf8(&key)
        .map_err(|_| Error::CorruptedData("Blob key is not valid UTF-8".into()))?
        .to_string();
    let start = 2 + key_len as u64;
    let payload = PictureDataProvider::sub_range(
        provider,
        ByteRange::new(start, provider.data_size64() - start),
    );
    Ok((key, Arc::new(payload)))
}

pub(super) fn write_key(out: &mut ByteWriter, key: &str) -> Result<()> {
    let len = u16::try_from(key.len())
        .map_err(|_| Error::InvalidFormat(format!("Blob key too long: {} bytes", key.len())))?;
    out.put_u16(len);
    out.put_bytes(key.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_blob() {
        let provider = Arc::new(PictureDataProvider::from_static(b"\x03\x00a/bPAYLOAD", ByteRange::ALL));
        let (key, payload) = split_blob(&provider, ByteOrder::Little).unwrap();
        assert_eq!(key, "a/b");
        assert_eq!(payload.to_bytes().unwrap().as_ref(), b"PAYLOAD");

        let big = Arc::new(PictureDataProvider::from_static(b"\x00\x01xZ", ByteRange::ALL));
        let (key, payload) = split_blob(&big, ByteOrder::Big).unwrap();
        assert_eq!(key, "x");
        assert_eq!(payload.data_size(), 1);
    }

    #[test]
    fn test_truncated_key() {
        let provider = Arc::new(PictureDataProvider::from_static(b"\x09\x00ab", ByteRange::ALL));
        assert!(split_blob(&provider, ByteOrder::Little).is_err());
    }

    #[test]
    fn test_key_too_long() {
        let mut out = ByteWriter::new();
        assert!(write_key(&mut out, &"k".repeat(70_000)).is_err());
        write_key(&mut out, "ok").unwrap();
        assert_eq!(out.as_slice(), b"\x02\x00ok");
    }
}
