//! Byte sources behind a provider.

use crate::common::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

/// Growable byte buffer shared with the caller (a "handle").
pub type SharedBuffer = Arc<Mutex<BytesMut>>;

/// Readable and seekable stream.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Random-access blob object owned by the host.
pub trait BlobSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy bytes starting at `offset` into `buf`, returning the count copied.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

impl BlobSource for Vec<u8> {
    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        copy_from_slice(self, offset, buf)
    }
}

impl BlobSource for Bytes {
    fn len(&self) -> u64 {
        Bytes::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        copy_from_slice(self, offset, buf)
    }
}

fn copy_from_slice(data: &[u8], offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    Ok(n)
}

/// Which kind of source a provider wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Immutable in-memory bytes
    Memory,
    /// Growable buffer shared with the caller
    Buffer,
    /// Host blob object
    Blob,
    /// Sequential stream
    Stream,
    /// File on disk, opened per read
    File,
    /// Window over another provider
    SubRange,
}

pub(crate) enum Source {
    Memory { bytes: Bytes, owned: bool },
    Buffer(SharedBuffer),
    Blob(Arc<dyn BlobSource>),
    Stream(Mutex<Box<dyn ReadSeek + Send>>),
    File(PathBuf),
    SubRange(Arc<super::PictureDataProvider>),
}

impl Source {
    pub(crate) fn kind(&self) -> ProviderKind {
        match self {
            Self::Memory { .. } => ProviderKind::Memory,
            Self::Buffer(_) => ProviderKind::Buffer,
            Self::Blob(_) => ProviderKind::Blob,
            Self::Stream(_) => ProviderKind::Stream,
            Self::File(_) => ProviderKind::File,
            Self::SubRange(_) => ProviderKind::SubRange,
        }
    }

    /// Total bytes available from the underlying source.
    pub(crate) fn total_len(&self) -> Result<u64> {
        match self {
            Self::Memory { bytes, .. } => Ok(bytes.len() as u64),
            Self::Buffer(buffer) => Ok(buffer.lock().len() as u64),
            Self::Blob(blob) => Ok(blob.len()),
            Self::Stream(stream) => {
                let mut stream = stream.lock();
                let len = stream.seek(SeekFrom::End(0))?;
                stream.seek(SeekFrom::Start(0))?;
                Ok(len)
            },
            Self::File(path) => Ok(std::fs::metadata(path)?.len()),
            Self::SubRange(parent) => {
                if !parent.is_valid() {
                    return Err(Error::InvalidProvider("Parent provider is invalid".into()));
                }
                Ok(parent.data_size64())
            },
        }
    }

    /// Whether reads are zero-copy slices of stable memory.
    pub(crate) fn is_direct(&self) -> bool {
        match self {
            Self::Memory { .. } => true,
            Self::SubRange(parent) => parent.source.is_direct(),
            _ => false,
        }
    }

    /// Read exactly `len` bytes at absolute `offset` of the underlying source.
    pub(crate) fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes> {
        match self {
            Self::Memory { bytes, .. } => {
                let start = offset as usize;
                Ok(bytes.slice(start..start + len))
            },
            Self::Buffer(buffer) => {
                let buffer = buffer.lock();
                let start = offset as usize;
                let end = start + len;
                if end > buffer.len() {
                    return Err(Error::OutOfRange {
                        offset,
                        size: len as u64,
                        available: buffer.len() as u64,
                    });
                }
                Ok(Bytes::copy_from_slice(&buffer[start..end]))
            },
            Self::Blob(blob) => {
                let mut out = vec![0u8; len];
                let mut filled = 0;
                while filled < len {
                    let n = blob.read_at(offset + filled as u64, &mut out[filled..])?;
                    if n == 0 {
                        return Err(Error::CorruptedData("Blob ended early".into()));
                    }
                    filled += n;
                }
                Ok(Bytes::from(out))
            },
            Self::Stream(stream) => {
                let mut stream = stream.lock();
                stream.seek(SeekFrom::Start(offset))?;
                let mut out = vec![0u8; len];
                stream.read_exact(&mut out)?;
                Ok(Bytes::from(out))
            },
            Self::File(path) => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(offset))?;
                let mut out = vec![0u8; len];
                file.read_exact(&mut out)?;
                Ok(Bytes::from(out))
            },
            Self::SubRange(parent) => parent.read_range(offset, len),
        }
    }

    pub(crate) fn is_owned(&self) -> bool {
        match self {
            Self::Memory { owned, .. } => *owned,
            Self::Buffer(_) | Self::Blob(_) | Self::Stream(_) => false,
            Self::File(_) | Self::SubRange(_) => true,
        }
    }
}
