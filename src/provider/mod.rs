//! Uniform access to the bytes of one picture representation.
//!
//! A [`PictureDataProvider`] wraps a byte range of some source (memory,
//! shared buffer, host blob, stream, file, or another provider) and offers
//! two access modes:
//!
//! - sequential copies with [`get_data`](PictureDataProvider::get_data) and
//!   [`read_range`](PictureDataProvider::read_range)
//! - direct access through a [`DirectAccess`] guard, which materializes a
//!   cached copy for sources that have no stable memory
//!
//! Construction never fails. An unusable source yields a provider whose
//! [`is_valid`](PictureDataProvider::is_valid) is false; errors are recorded
//! and polled with [`last_error`](PictureDataProvider::last_error) rather than
//! returned, and [`throw_last_error`](PictureDataProvider::throw_last_error)
//! escalates them when the caller wants a `Result`.
//!
//! # Example
//!
//! ```
//! use pictura::provider::{ByteRange, PictureDataProvider};
//!
//! let provider = PictureDataProvider::from_static(b"GIF89a....", ByteRange::ALL);
//! assert!(provider.is_valid());
//! let head = provider.begin_direct_access().unwrap();
//! assert_eq!(&head[..6], b"GIF89a");
//! ```

mod source;

pub use source::{BlobSource, ProviderKind, ReadSeek, SharedBuffer};

use crate::codec::CodecInfo;
use crate::common::error::{Error, Result};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use source::Source;
use std::fmt;
use std::io::{Read, Seek};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Window into a source: `offset` plus an optional `size` (rest of source
/// when `None`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub size: Option<u64>,
}

impl ByteRange {
    /// The whole source.
    pub const ALL: ByteRange = ByteRange {
        offset: 0,
        size: None,
    };

    pub const fn new(offset: u64, size: u64) -> Self {
        Self {
            offset,
            size: Some(size),
        }
    }

    /// From `offset` to the end of the source.
    pub const fn from(offset: u64) -> Self {
        Self { offset, size: None }
    }

    fn resolve(&self, total: u64) -> Result<(u64, u64)> {
        let size = match self.size {
            Some(size) => size,
            None => total.saturating_sub(self.offset),
        };
        match self.offset.checked_add(size) {
            Some(end) if self.offset <= total && end <= total => Ok((self.offset, size)),
            _ => Err(Error::OutOfRange {
                offset: self.offset,
                size,
                available: total,
            }),
        }
    }
}

/// Codec association of a provider.
#[derive(Debug, Clone, Default)]
enum DecoderRef {
    #[default]
    None,
    /// Not owned; the registry keeps the codec alive
    Weak(Weak<CodecInfo>),
    /// Retained by the provider
    Strong(Arc<CodecInfo>),
}

/// Byte-range source for one picture representation.
pub struct PictureDataProvider {
    source: Source,
    /// Offset of the window in the source
    offset: u64,
    /// Size of the window
    size: u64,
    valid: bool,
    last_error: Mutex<Option<Error>>,
    decoder: RwLock<DecoderRef>,
    /// Open direct-access sessions
    lock_count: AtomicUsize,
    /// Serializes session begin/end and cache materialization
    access: Mutex<()>,
    cache: RwLock<Option<Bytes>>,
    keep_cache: AtomicBool,
}

impl fmt::Debug for PictureDataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureDataProvider")
            .field("kind", &self.kind())
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("valid", &self.valid)
            .field("lock_count", &self.lock_count())
            .finish()
    }
}

impl PictureDataProvider {
    fn with_source(source: Source, range: ByteRange) -> Self {
        let resolved = source.total_len().and_then(|total| range.resolve(total));
        let (offset, size, valid, error) = match resolved {
            Ok((offset, size)) => (offset, size, true, None),
            Err(e) => {
                log::debug!("Invalid {:?} provider: {}", source.kind(), e);
                (range.offset, 0, false, Some(e))
            },
        };
        Self {
            source,
            offset,
            size,
            valid,
            last_error: Mutex::new(error),
            decoder: RwLock::new(DecoderRef::None),
            lock_count: AtomicUsize::new(0),
            access: Mutex::new(()),
            cache: RwLock::new(None),
            keep_cache: AtomicBool::new(false),
        }
    }

    /// Shared in-memory bytes (not copied).
    pub fn from_bytes(bytes: Bytes, range: ByteRange) -> Self {
        Self::with_source(
            Source::Memory {
                bytes,
                owned: false,
            },
            range,
        )
    }

    /// Static bytes (not copied).
    pub fn from_static(bytes: &'static [u8], range: ByteRange) -> Self {
        Self::from_bytes(Bytes::from_static(bytes), range)
    }

    /// Copy the bytes in; the provider owns the copy.
    pub fn from_slice(data: &[u8], range: ByteRange) -> Self {
        Self::with_source(
            Source::Memory {
                bytes: Bytes::copy_from_slice(data),
                owned: true,
            },
            range,
        )
    }

    /// Growable buffer shared with the caller.
    ///
    /// The window is fixed at construction; growing the buffer later does
    /// not extend it.
    pub fn from_buffer(buffer: SharedBuffer, range: ByteRange) -> Self {
        Self::with_source(Source::Buffer(buffer), range)
    }

    pub fn from_blob(blob: Arc<dyn BlobSource>, range: ByteRange) -> Self {
        Self::with_source(Source::Blob(blob), range)
    }

    /// Seekable stream. Reads seek to the requested position each time.
    pub fn from_stream<R>(stream: R, range: ByteRange) -> Self
    where
        R: Read + Seek + Send + 'static,
    {
        Self::with_source(Source::Stream(Mutex::new(Box::new(stream))), range)
    }

    /// File on disk, reopened for every read.
    pub fn from_file(path: impl Into<PathBuf>, range: ByteRange) -> Self {
        Self::with_source(Source::File(path.into()), range)
    }

    /// Window over another provider; offsets are relative to the parent's window.
    pub fn sub_range(parent: &Arc<PictureDataProvider>, range: ByteRange) -> Self {
        let provider = Self::with_source(Source::SubRange(Arc::clone(parent)), range);
        provider.keep_cache.store(parent.keeps_cache(), Ordering::Relaxed);
        provider
    }

    pub fn kind(&self) -> ProviderKind {
        self.source.kind()
    }

    /// Provider this window reads through.
    pub fn parent(&self) -> Option<&Arc<PictureDataProvider>> {
        match &self.source {
            Source::SubRange(parent) => Some(parent),
            _ => None,
        }
    }

    /// Whether the provider owns its bytes (or reads them from a path).
    pub fn owns_data(&self) -> bool {
        self.source.is_owned()
    }

    /// Whether every byte is held in memory this provider copied in, so
    /// reads never reach another source.
    pub fn is_self_contained(&self) -> bool {
        self.kind() == ProviderKind::Memory && self.owns_data()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Offset of this window in its source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size in bytes, 0 when invalid.
    pub fn data_size(&self) -> usize {
        usize::try_from(self.data_size64()).unwrap_or(usize::MAX)
    }

    /// Size in bytes, 0 when invalid.
    pub fn data_size64(&self) -> u64 {
        if self.valid { self.size } else { 0 }
    }

    pub fn last_error(&self) -> Option<Error> {
        self.last_error.lock().clone()
    }

    pub fn clear_last_error(&self) {
        *self.last_error.lock() = None;
    }

    /// Turn the recorded error (or invalidity) into a `Result`.
    pub fn throw_last_error(&self) -> Result<()> {
        match self.last_error() {
            Some(e) => Err(e),
            None if !self.valid => Err(Error::InvalidProvider("Provider is not valid".into())),
            None => Ok(()),
        }
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            *self.last_error.lock() = Some(e.clone());
        }
        result
    }

    /// Copy bytes at `offset` (relative to the window) into `buf`.
    ///
    /// Returns the number of bytes copied; 0 on failure with the error
    /// recorded for [`last_error`](Self::last_error).
    pub fn get_data(&self, buf: &mut [u8], offset: u64) -> usize {
        let available = self.data_size64().saturating_sub(offset);
        let len = (buf.len() as u64).min(available) as usize;
        if len == 0 {
            if !buf.is_empty() {
                let _ = self.record::<()>(Err(self.range_error(offset, buf.len())));
            }
            return 0;
        }
        match self.read_range(offset, len) {
            Ok(bytes) => {
                buf[..len].copy_from_slice(&bytes);
                len
            },
            Err(_) => 0,
        }
    }

    fn range_error(&self, offset: u64, len: usize) -> Error {
        if !self.valid {
            return Error::InvalidProvider("Provider is not valid".into());
        }
        Error::OutOfRange {
            offset,
            size: len as u64,
            available: self.size,
        }
    }

    /// Read `len` bytes at `offset` (relative to the window).
    ///
    /// Memory-backed providers and open caches return zero-copy slices.
    pub fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        let in_range = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.size);
        if !self.valid || !in_range {
            return self.record(Err(self.range_error(offset, len)));
        }
        if let Some(cache) = self.cache.read().as_ref() {
            let start = offset as usize;
            return Ok(cache.slice(start..start + len));
        }
        self.record(self.source.read_exact_at(self.offset + offset, len))
    }

    /// Whole window as bytes.
    pub fn to_bytes(&self) -> Result<Bytes> {
        self.read_range(0, self.data_size())
    }

    pub fn keeps_cache(&self) -> bool {
        self.keep_cache.load(Ordering::Relaxed)
    }

    /// Keep the materialized copy after the last direct-access session ends.
    pub fn set_keep_cache(&self, keep: bool) {
        self.keep_cache.store(keep, Ordering::Relaxed);
        if !keep && self.lock_count() == 0 {
            let _guard = self.access.lock();
            if self.lock_count() == 0 {
                *self.cache.write() = None;
            }
        }
    }

    /// Number of open direct-access sessions.
    pub fn lock_count(&self) -> usize {
        self.lock_count.load(Ordering::Acquire)
    }

    /// Whether a materialized copy is currently held.
    pub fn has_cache(&self) -> bool {
        self.cache.read().is_some()
    }

    /// Start a direct-access session.
    ///
    /// Sessions nest: every guard counts, and the cached copy of a sequential
    /// source lives until the last guard is dropped. Returns `None` when the
    /// provider is invalid or the source cannot be read.
    pub fn begin_direct_access(&self) -> Option<DirectAccess<'_>> {
        if !self.valid {
            return None;
        }
        let _guard = self.access.lock();
        let bytes = if self.source.is_direct() {
            self.read_range(0, self.data_size()).ok()?
        } else {
            let cached = self.cache.read().clone();
            match cached {
                Some(bytes) => bytes,
                None => {
                    log::trace!("Materializing {} bytes of {:?} provider", self.size, self.kind());
                    let bytes = self
                        .record(self.source.read_exact_at(self.offset, self.data_size()))
                        .ok()?;
                    *self.cache.write() = Some(bytes.clone());
                    bytes
                },
            }
        };
        let count = self.lock_count.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("Direct access begin (sessions: {})", count);
        Some(DirectAccess {
            provider: self,
            bytes,
        })
    }

    fn end_direct_access(&self) {
        let _guard = self.access.lock();
        let previous = self.lock_count.fetch_sub(1, Ordering::AcqRel);
        log::trace!("Direct access end (sessions: {})", previous - 1);
        if previous == 1 && !self.keeps_cache() {
            *self.cache.write() = None;
        }
    }

    /// Associate a codec without owning it.
    pub fn set_decoder(&self, codec: &Arc<CodecInfo>) {
        *self.decoder.write() = DecoderRef::Weak(Arc::downgrade(codec));
    }

    /// Associate a codec and keep it alive.
    pub fn retain_decoder(&self, codec: Arc<CodecInfo>) {
        *self.decoder.write() = DecoderRef::Strong(codec);
    }

    /// Associated codec, if any and still alive.
    pub fn decoder(&self) -> Option<Arc<CodecInfo>> {
        match &*self.decoder.read() {
            DecoderRef::None => None,
            DecoderRef::Weak(weak) => weak.upgrade(),
            DecoderRef::Strong(codec) => Some(Arc::clone(codec)),
        }
    }
}

/// Open direct-access session; derefs to the provider's bytes.
///
/// Dropping the guard ends the session.
pub struct DirectAccess<'a> {
    provider: &'a PictureDataProvider,
    bytes: Bytes,
}

impl DirectAccess<'_> {
    /// Cheap shared handle to the same bytes, usable after the session.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

impl Deref for DirectAccess<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for DirectAccess<'_> {
    fn drop(&mut self) {
        self.provider.end_direct_access();
    }
}
