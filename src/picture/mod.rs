//! The picture container.
//!
//! A [`Picture`] is one logical image available in one or more encodings,
//! each stored as a [`PictureData`] under its key (a mime type or a
//! synthetic identifier). It behaves like a database value: it has a
//! serialized form (the value source) that is rebuilt lazily after
//! mutations, clones cheaply, and compares by its serialized bytes.
//!
//! # Example
//!
//! ```
//! use pictura::picture::Picture;
//!
//! let mut picture = Picture::new();
//! assert!(picture.is_pict_empty());
//! assert_eq!(picture.data_size().unwrap(), 0);
//! picture.set_empty();
//! assert_eq!(picture.count_picture_data(), 0);
//! ```
//!
//! A picture is not internally synchronized beyond its entries: mutators
//! take `&mut self`, and sharing one instance between threads requires the
//! caller's own locking.

mod derive;
mod outside;
mod select;
mod value;


use crate::codec::{PictureKind, PictureMetadata};
use crate::common::error::{Error, Result};
use crate::common::geometry::{AffineTransform, Rect, Size};
use crate::config::PictureConfig;
use crate::data::PictureData;
use crate::draw::{DrawPurpose, DrawSettings, DrawingSurface, SplitInfo};
use crate::format::{self, PicEnd, PictureEnvelope, ReadOptions, ReadPicture};
use crate::provider::{ByteRange, PictureDataProvider};
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

type Entries = IndexMap<String, Arc<PictureData>>;

/// Where the serialized form currently lives.
#[derive(Clone)]
enum ValueSource {
    Bytes(Bytes),
    /// Window over the input the picture was read from
    Window(Arc<PictureDataProvider>),
}

#[derive(Clone, Default)]
struct Inner {
    entries: Entries,
    /// Cached selections; `None` means not computed yet
    display: Option<Option<String>>,
    printing: Option<Option<String>>,
    envelope: PictureEnvelope,
    value: Option<ValueSource>,
    dirty: bool,
    /// Serialized input not parsed yet
    pending: Option<Arc<PictureDataProvider>>,
    /// Entries must be loaded from the outside file
    outside_pending: bool,
}

impl Inner {
    fn invalidate(&mut self) {
        self.display = None;
        self.printing = None;
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.invalidate();
    }

    /// Add read entries; the first entry of a key wins.
    /// Build the map from an attached value source not read yet.
    fn parse_pending(&mut self, config: &Arc<PictureConfig>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        log::debug!("Building picture map from attached value source");
        match format::read_picture(config, &pending, &ReadOptions::default()) {
            Ok(read) => {
                self.envelope = read.envelope;
                self.insert_all(read.entries);
                self.outside_pending = self.envelope.outside.is_some();
            },
            Err(e) => log::warn!("Unreadable picture value source: {}", e),
        }
    }

    fn insert_all(&mut self, entries: Vec<Arc<PictureData>>) {
        for data in entries {
            let key = data.key().to_string();
            if self.entries.contains_key(&key) {
                log::warn!("Ignoring duplicate picture entry {}", key);
                continue;
            }
            self.entries.insert(key, data);
        }
        self.invalidate();
    }
}

/// One logical image in one or more encodings.
pub struct Picture {
    config: Arc<PictureConfig>,
    inner: RwLock<Inner>,
}

impl Clone for Picture {
    /// Copy the entry map; entries themselves are shared.
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            inner: RwLock::new(self.inner.read().clone()),
        }
    }
}

impl fmt::Debug for Picture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Picture")
            .field("keys", &inner.entries.keys().collect::<Vec<_>>())
            .field("outside", &inner.envelope.outside)
            .field("dirty", &inner.dirty)
            .field("pending", &inner.pending.is_some())
            .finish()
    }
}

impl Default for Picture {
    fn default() -> Self {
        Self::new()
    }
}

impl Picture {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Empty picture using the global configuration.
    pub fn new() -> Self {
        Self::with_config(PictureConfig::global())
    }

    pub fn with_config(config: Arc<PictureConfig>) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                value: Some(ValueSource::Bytes(Bytes::new())),
                ..Inner::default()
            }),
        }
    }

    fn from_read(config: Arc<PictureConfig>, read: ReadPicture, origin: Option<ValueSource>) -> Self {
        let mut inner = Inner {
            envelope: read.envelope,
            dirty: origin.is_none(),
            value: origin,
            ..Inner::default()
        };
        inner.insert_all(read.entries);
        inner.outside_pending = inner.envelope.outside.is_some();
        Self {
            config,
            inner: RwLock::new(inner),
        }
    }

    /// Parse serialized picture bytes, or a plain image file, with the
    /// global configuration.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        Self::from_bytes_with(PictureConfig::global(), bytes, &ReadOptions::default())
    }

    pub fn from_bytes_with(
        config: Arc<PictureConfig>,
        bytes: impl Into<Bytes>,
        options: &ReadOptions,
    ) -> Result<Self> {
        let provider = Arc::new(PictureDataProvider::from_bytes(bytes.into(), ByteRange::ALL));
        Self::from_provider_with(config, provider, options)
    }

    /// Attach serialized bytes without parsing them. The entry map is built
    /// on first access; an unreadable input then yields an empty picture.
    pub fn from_bytes_lazy(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let value = format::has_signature(&bytes).then(|| ValueSource::Bytes(bytes.clone()));
        let inner = Inner {
            dirty: value.is_none(),
            value,
            pending: Some(Arc::new(PictureDataProvider::from_bytes(bytes, ByteRange::ALL))),
            ..Inner::default()
        };
        Self {
            config: PictureConfig::global(),
            inner: RwLock::new(inner),
        }
    }

    /// Read from a seekable stream. Entries read their payloads from the
    /// stream on demand.
    pub fn from_reader<R>(reader: R) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        let provider = Arc::new(PictureDataProvider::from_stream(reader, ByteRange::ALL));
        Self::from_provider(provider)
    }

    /// Read a serialized picture or an image file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let provider = Arc::new(PictureDataProvider::from_file(path.as_ref(), ByteRange::ALL));
        Self::from_provider(provider)
    }

    pub fn from_provider(provider: Arc<PictureDataProvider>) -> Result<Self> {
        Self::from_provider_with(PictureConfig::global(), provider, &ReadOptions::default())
    }

    pub fn from_provider_with(
        config: Arc<PictureConfig>,
        provider: Arc<PictureDataProvider>,
        options: &ReadOptions,
    ) -> Result<Self> {
        let read = format::read_picture(&config, &provider, options)?;
        let head = provider.read_range(0, provider.data_size().min(4))?;
        // Plain image input has no serialized form yet
        let origin = format::has_signature(&head).then(|| {
            let window = PictureDataProvider::sub_range(&provider, ByteRange::new(0, read.total_size));
            ValueSource::Window(Arc::new(window))
        });
        Ok(Self::from_read(config, read, origin))
    }

    /// One-entry picture using the entry's configuration.
    pub fn from_picture_data(data: Arc<PictureData>) -> Self {
        let config = Arc::clone(data.config());
        Self::from_picture_data_with(config, data)
    }

    pub fn from_picture_data_with(config: Arc<PictureConfig>, data: Arc<PictureData>) -> Self {
        let mut picture = Self::with_config(config);
        picture.append_picture_data(data, true);
        picture
    }

    /// Picture holding a native metafile (EMF, WMF or PICT).
    pub fn from_native(kind: PictureKind, bytes: impl Into<Bytes>) -> Result<Self> {
        if !matches!(kind, PictureKind::Emf | PictureKind::Wmf | PictureKind::Pict) {
            return Err(Error::Unsupported(format!("{:?} is not a native picture format", kind)));
        }
        let config = PictureConfig::global();
        let data = PictureData::with_kind(Arc::clone(&config), kind, bytes.into());
        Ok(Self::from_picture_data_with(config, Arc::new(data)))
    }

    pub fn config(&self) -> &Arc<PictureConfig> {
        &self.config
    }

    /// Parse pending input and load outside files before the map is used.
    fn realize(&self) {
        {
            let inner = self.inner.read();
            if inner.pending.is_none() && !inner.outside_pending {
                return;
            }
        }
        let mut inner = self.inner.write();
        inner.parse_pending(&self.config);
        if inner.outside_pending {
            inner.outside_pending = false;
            if let Some(outside) = inner.envelope.outside.clone() {
                match outside::load(&self.config, &outside) {
                    Ok(entries) => {
                        inner.entries.clear();
                        inner.insert_all(entries);
                    },
                    Err(e) => log::warn!("Cannot load outside picture {}: {}", outside.path.display(), e),
                }
            }
        }
    }

    fn with_entries<T>(&self, f: impl FnOnce(&Entries) -> T) -> T {
        self.realize();
        f(&self.inner.read().entries)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert `data` under its key.
    ///
    /// When the key exists, `replace` decides: `false` leaves the map
    /// untouched and returns `false`. Appending to a picture in outside-file
    /// mode makes the inline map the source of truth again.
    pub fn append_picture_data(&mut self, data: Arc<PictureData>, replace: bool) -> bool {
        self.realize();
        let inner = self.inner.get_mut();
        let key = data.key().to_string();
        if !replace && inner.entries.contains_key(&key) {
            return false;
        }
        if inner.envelope.outside.take().is_some() {
            log::debug!("Outside reference dropped by inline append");
        }
        inner.entries.insert(key, data);
        inner.mark_dirty();
        true
    }

    /// Remove the entry stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Arc<PictureData>> {
        self.realize();
        let inner = self.inner.get_mut();
        let removed = inner.entries.shift_remove(key);
        if removed.is_some() {
            inner.mark_dirty();
        }
        removed
    }

    /// Replace the whole content with a single entry.
    pub fn set_picture_data(&mut self, data: Arc<PictureData>) {
        self.set_empty();
        self.append_picture_data(data, true);
    }

    /// Drop every entry, setting and outside reference.
    pub fn set_empty(&mut self) {
        let inner = self.inner.get_mut();
        inner.entries.clear();
        inner.envelope = PictureEnvelope::default();
        inner.pending = None;
        inner.outside_pending = false;
        inner.mark_dirty();
    }

    fn update_envelope(&mut self, f: impl FnOnce(&mut PictureEnvelope)) {
        self.realize();
        let inner = self.inner.get_mut();
        f(&mut inner.envelope);
        inner.mark_dirty();
    }

    pub fn set_matrix(&mut self, matrix: AffineTransform) {
        self.update_envelope(|e| e.settings.matrix = matrix);
    }

    pub fn set_split_info(&mut self, split: SplitInfo) {
        self.update_envelope(|e| e.settings.split = split);
    }

    pub fn set_pic_end(&mut self, pic_end: PicEnd) {
        self.update_envelope(|e| e.settings.pic_end = pic_end);
    }

    pub fn set_extra_data(&mut self, data: impl Into<Bytes>) {
        let data = data.into();
        self.update_envelope(|e| e.extra_data = data);
    }

    /// Append a tagged extension record.
    pub fn add_extension(&mut self, tag: u32, data: impl Into<Bytes>) {
        let data = data.into();
        self.update_envelope(|e| e.extensions.push((tag, data)));
    }

    pub fn set_source_name(&mut self, name: Option<String>) {
        self.update_envelope(|e| e.source_name = name);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn count_picture_data(&self) -> usize {
        self.with_entries(|entries| entries.len())
    }

    pub fn is_pict_empty(&self) -> bool {
        self.count_picture_data() == 0
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.with_entries(|entries| entries.keys().cloned().collect())
    }

    /// Entry stored under exactly `key`.
    pub fn picture_data_by_identifier(&self, key: &str) -> Option<Arc<PictureData>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    /// Entry for a mime type; aliases such as `image/jpg` are understood.
    pub fn picture_data_by_mime_type(&self, mime_type: &str) -> Option<Arc<PictureData>> {
        let canonical = self.config.codecs.by_mime(mime_type).map(|c| c.mime_type.clone());
        self.with_entries(|entries| {
            entries
                .iter()
                .find(|(key, _)| {
                    key.eq_ignore_ascii_case(mime_type)
                        || canonical.as_deref().is_some_and(|c| key.eq_ignore_ascii_case(c))
                })
                .map(|(_, data)| Arc::clone(data))
        })
    }

    /// Entry whose encoding uses the file extension `ext` (with or without
    /// the leading dot).
    pub fn picture_data_by_extension(&self, ext: &str) -> Option<Arc<PictureData>> {
        let ext = ext.trim_start_matches('.');
        let codec = self.config.codecs.by_extension(ext)?;
        self.with_entries(|entries| {
            entries
                .values()
                .find(|data| {
                    data.key().eq_ignore_ascii_case(&codec.mime_type)
                        || (data.kind() == codec.kind && !codec.kind.is_opaque())
                })
                .cloned()
        })
    }

    pub fn nth_picture_data(&self, index: usize) -> Option<Arc<PictureData>> {
        self.with_entries(|entries| entries.get_index(index).map(|(_, data)| Arc::clone(data)))
    }

    fn cached_selection(&self, purpose: DrawPurpose) -> Option<Arc<PictureData>> {
        self.realize();
        {
            let inner = self.inner.read();
            let cached = match purpose {
                DrawPurpose::Display => &inner.display,
                DrawPurpose::Print => &inner.printing,
            };
            if let Some(key) = cached {
                return key.as_ref().and_then(|k| inner.entries.get(k).cloned());
            }
        }
        let key = {
            let inner = self.inner.read();
            match purpose {
                DrawPurpose::Display => select::for_display(&inner.entries, &self.config.selection),
                DrawPurpose::Print => select::for_printing(&inner.entries, &self.config.selection),
            }
        };
        let mut inner = self.inner.write();
        let data = key.as_ref().and_then(|k| inner.entries.get(k).cloned());
        match purpose {
            DrawPurpose::Display => inner.display = Some(key),
            DrawPurpose::Print => inner.printing = Some(key),
        }
        data
    }

    /// Entry drawn on screen, if any entry is renderable.
    pub fn picture_data_for_display(&self) -> Option<Arc<PictureData>> {
        self.cached_selection(DrawPurpose::Display)
    }

    /// Entry used for printing, if any entry is renderable.
    pub fn picture_data_for_printing(&self) -> Option<Arc<PictureData>> {
        self.cached_selection(DrawPurpose::Print)
    }

    /// Size of the display entry without decoding it.
    pub fn size(&self) -> Size {
        self.picture_data_for_display()
            .map(|data| data.size_hint())
            .unwrap_or_default()
    }

    pub fn width(&self) -> u32 {
        self.size().width
    }

    pub fn height(&self) -> u32 {
        self.size().height
    }

    /// Bounds of the picture at the origin.
    pub fn coords(&self) -> Rect {
        Rect::from_size(self.size())
    }

    /// Metadata of the display entry.
    pub fn metadata(&self) -> Arc<PictureMetadata> {
        self.picture_data_for_display()
            .map(|data| data.metadata())
            .unwrap_or_default()
    }

    pub fn matrix(&self) -> AffineTransform {
        self.envelope(|e| e.settings.matrix)
    }

    pub fn split_info(&self) -> SplitInfo {
        self.envelope(|e| e.settings.split)
    }

    pub fn pic_end(&self) -> PicEnd {
        self.envelope(|e| e.settings.pic_end)
    }

    pub fn extra_data(&self) -> Bytes {
        self.envelope(|e| e.extra_data.clone())
    }

    pub fn extensions(&self) -> Vec<(u32, Bytes)> {
        self.envelope(|e| e.extensions.clone())
    }

    pub fn source_name(&self) -> Option<String> {
        self.envelope(|e| e.source_name.clone())
    }

    fn envelope<T>(&self, f: impl FnOnce(&PictureEnvelope) -> T) -> T {
        self.realize();
        f(&self.inner.read().envelope)
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// Draw into `dest`. The picture's own matrix is applied before the
    /// settings' transform, and its split info is used unless the settings
    /// carry an active one.
    pub fn draw(
        &self,
        surface: &mut dyn DrawingSurface,
        dest: Rect,
        settings: &DrawSettings,
    ) -> Result<()> {
        let data = match settings.purpose {
            DrawPurpose::Display => self.picture_data_for_display(),
            DrawPurpose::Print => self.picture_data_for_printing(),
        };
        let Some(data) = data else {
            return Ok(());
        };
        let stored = self.envelope(|e| e.settings);
        let mut effective = settings.clone();
        effective.transform = stored.matrix.then(&settings.transform);
        if !effective.split.is_active() {
            effective.split = stored.split;
        }
        data.draw(surface, dest, &effective)
    }

    /// Draw the print representation.
    pub fn print(
        &self,
        surface: &mut dyn DrawingSurface,
        dest: Rect,
        settings: &DrawSettings,
    ) -> Result<()> {
        let settings = DrawSettings {
            purpose: DrawPurpose::Print,
            ..settings.clone()
        };
        self.draw(surface, dest, &settings)
    }
}
