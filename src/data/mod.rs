//! One encoding of a logical image.
//!
//! A [`PictureData`] owns the provider of its bytes and lazily materializes
//! the decoded form on first use. The set of variants is closed:
//!
//! | Variant  | Kinds                            | Renderable | Vector | Raster |
//! |----------|----------------------------------|------------|--------|--------|
//! | Bitmap   | PNG, JPEG, GIF, BMP, TIFF, WebP  | yes        | no     | yes    |
//! | Vector   | SVG                              | yes        | yes    | no     |
//! | Meta     | composite of two pictures        | yes        | yes    | no     |
//! | Embedded | a whole nested picture           | nested     | nested | nested |
//! | Native   | EMF, WMF, PICT                   | yes        | yes    | no     |
//! | Opaque   | blobs and unknown block kinds    | no         | no     | no     |
//!
//! Embedded entries report the capabilities of the nested picture's display
//! choice.
//!
//! Two independent lazy slots exist per instance: the decoded form (forced
//! by [`bounds`](PictureData::bounds), draws and native handles) and the
//! metadata bag. Reading metadata never decodes pixels. A failed decode
//! leaves zero bounds and turns draws into no-ops; nothing is raised.

mod bitmap;
mod embedded;
pub(crate) mod lazy;
mod meta;
mod native;
mod opaque;
mod vector;

pub use meta::MetaOp;

use crate::accumulator::Accumulator;
use crate::codec::{self, CodecInfo, PictureKind, PictureMetadata, Timeline, gif};
use crate::common::binary::{ByteOrder, ByteWriter};
use crate::common::error::{Error, Result};
use crate::common::geometry::{Rect, Size};
use crate::config::{NativeHandle, PictureConfig};
use crate::draw::{self, DrawSettings, DrawingSurface};
use crate::format::BlockFlags;
use crate::picture::Picture;
use crate::provider::{ByteRange, PictureDataProvider};
use bytes::Bytes;
use image::RgbaImage;
use lazy::LoadSlot;
use meta::MetaComposite;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Variant family of a [`PictureData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Bitmap,
    Vector,
    Meta,
    Embedded,
    Native,
    Opaque,
}

/// Horizontal and vertical resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub horizontal: u32,
    pub vertical: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            horizontal: 72,
            vertical: 72,
        }
    }
}

pub(crate) enum Variant {
    Bitmap,
    Vector,
    Native,
    Meta(MetaComposite),
    Embedded,
    /// `keyed` payloads start with their entry key
    Opaque { tag: u32, flags: BlockFlags, keyed: bool },
}

impl Variant {
    /// Same variant over copied bytes; composites hold children instead.
    fn raw_copy(&self) -> Option<Variant> {
        match self {
            Self::Bitmap => Some(Self::Bitmap),
            Self::Vector => Some(Self::Vector),
            Self::Native => Some(Self::Native),
            Self::Embedded => Some(Self::Embedded),
            Self::Opaque { tag, flags, keyed } => Some(Self::Opaque {
                tag: *tag,
                flags: *flags,
                keyed: *keyed,
            }),
            Self::Meta(_) => None,
        }
    }
}

/// Materialized form of a representation.
pub(crate) enum Decoded {
    Raster { frames: Vec<RgbaImage> },
    Vector { bytes: Bytes, size: Size },
    Native {
        bytes: Bytes,
        handle: Option<NativeHandle>,
        size: Size,
    },
    Meta { size: Size },
    Embedded { picture: Picture },
    /// Nothing to draw: opaque payloads and failed decodes
    Empty,
}

impl Decoded {
    fn size(&self) -> Size {
        match self {
            Self::Raster { frames } => frames
                .first()
                .map(|f| Size::new(f.width(), f.height()))
                .unwrap_or_default(),
            Self::Vector { size, .. } | Self::Native { size, .. } | Self::Meta { size } => *size,
            Self::Embedded { picture } => picture.size(),
            Self::Empty => Size::ZERO,
        }
    }
}

/// One encoding of a logical image.
pub struct PictureData {
    config: Arc<PictureConfig>,
    kind: PictureKind,
    key: String,
    variant: Variant,
    provider: RwLock<Option<Arc<PictureDataProvider>>>,
    /// Size recorded in the container block, trusted before decoding
    declared: RwLock<Option<Size>>,
    resolution: RwLock<Resolution>,
    /// Stored with `NON_RENDERABLE`: kept typed, never drawn or selected
    suppressed: bool,
    decoded: LoadSlot<Decoded>,
    metadata: LoadSlot<PictureMetadata>,
}

impl fmt::Debug for PictureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureData")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("variant", &self.variant_kind())
            .field("loaded", &self.decoded.is_loaded())
            .finish()
    }
}

impl PictureData {
    fn build(
        config: Arc<PictureConfig>,
        kind: PictureKind,
        key: String,
        variant: Variant,
        provider: Option<Arc<PictureDataProvider>>,
    ) -> Self {
        if let Some(provider) = &provider {
            if config.keep_cache {
                provider.set_keep_cache(true);
            }
            if provider.decoder().is_none() {
                if let Some(codec) = config.codecs.by_kind(kind) {
                    provider.set_decoder(&codec);
                }
            }
        }
        Self {
            config,
            kind,
            key,
            variant,
            provider: RwLock::new(provider),
            declared: RwLock::new(None),
            resolution: RwLock::new(Resolution::default()),
            suppressed: false,
            decoded: LoadSlot::new(),
            metadata: LoadSlot::new(),
        }
    }

    /// Build the variant matching `kind` over `provider`.
    ///
    /// Never fails: a composite payload that cannot be parsed is kept as an
    /// opaque entry carrying the same tag.
    pub fn from_provider(
        config: Arc<PictureConfig>,
        kind: PictureKind,
        provider: Arc<PictureDataProvider>,
    ) -> Self {
        Self::from_provider_in(config, kind, provider, ByteOrder::Little, &mut Accumulator::new())
    }

    pub(crate) fn from_provider_in(
        config: Arc<PictureConfig>,
        kind: PictureKind,
        provider: Arc<PictureDataProvider>,
        order: ByteOrder,
        acc: &mut Accumulator,
    ) -> Self {
        let key = kind.default_key();
        let variant = match kind {
            k if k.is_raster() => Variant::Bitmap,
            PictureKind::Svg => Variant::Vector,
            PictureKind::Emf | PictureKind::Wmf | PictureKind::Pict => Variant::Native,
            PictureKind::Picture => Variant::Embedded,
            PictureKind::Meta => match meta::parse(&config, &provider, order, acc) {
                Ok(composite) => Variant::Meta(composite),
                Err(e) => {
                    log::warn!("Keeping unreadable composite payload as opaque data: {}", e);
                    return Self::opaque(config, kind.tag(), BlockFlags::NON_RENDERABLE, provider);
                },
            },
            PictureKind::Blob => match opaque::split_blob(&provider, order) {
                Ok((key, payload)) => {
                    return Self::build(
                        config,
                        kind,
                        key,
                        Variant::Opaque {
                            tag: kind.tag(),
                            flags: BlockFlags::NON_RENDERABLE,
                            keyed: true,
                        },
                        Some(payload),
                    );
                },
                Err(e) => {
                    log::warn!("Keeping blob with unreadable key as unknown data: {}", e);
                    return Self::opaque(config, kind.tag(), BlockFlags::NON_RENDERABLE, provider);
                },
            },
            _ => return Self::opaque(config, kind.tag(), BlockFlags::NON_RENDERABLE, provider),
        };
        Self::build(config, kind, key, variant, Some(provider))
    }

    /// Opaque entry whose tag, flags and bytes are written back verbatim.
    pub(crate) fn opaque(
        config: Arc<PictureConfig>,
        tag: u32,
        flags: BlockFlags,
        provider: Arc<PictureDataProvider>,
    ) -> Self {
        let kind = PictureKind::from_tag(tag);
        let variant = Variant::Opaque {
            tag,
            flags,
            keyed: false,
        };
        Self::build(config, kind, kind.default_key(), variant, Some(provider))
    }

    /// Representation of `kind` over in-memory bytes.
    pub fn with_kind(config: Arc<PictureConfig>, kind: PictureKind, bytes: Bytes) -> Self {
        let provider = Arc::new(PictureDataProvider::from_bytes(bytes, ByteRange::ALL));
        Self::from_provider(config, kind, provider)
    }

    /// Sniff `bytes` and build the matching representation with the global
    /// configuration.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        let kind = codec::sniff(&bytes)
            .ok_or_else(|| Error::InvalidFormat("Unrecognized picture data".into()))?;
        Ok(Self::with_kind(PictureConfig::global(), kind, bytes))
    }

    /// File-backed representation; the kind comes from the content, then the
    /// extension.
    pub fn from_file(config: Arc<PictureConfig>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let provider = Arc::new(PictureDataProvider::from_file(path, ByteRange::ALL));
        provider.throw_last_error()?;
        let head = provider.read_range(0, provider.data_size().min(codec::SNIFF_LEN))?;
        let kind = codec::sniff(&head)
            .or_else(|| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(|ext| config.codecs.by_extension(ext))
                    .map(|codec| codec.kind)
            })
            .ok_or_else(|| Error::InvalidFormat(format!("Unrecognized picture file {}", path.display())))?;
        Ok(Self::from_provider(config, kind, provider))
    }

    /// Opaque payload stored under its own key (usually a mime type).
    pub fn blob(config: Arc<PictureConfig>, key: impl Into<String>, bytes: Bytes) -> Self {
        let provider = Arc::new(PictureDataProvider::from_bytes(bytes, ByteRange::ALL));
        let variant = Variant::Opaque {
            tag: PictureKind::Blob.tag(),
            flags: BlockFlags::NON_RENDERABLE,
            keyed: true,
        };
        Self::build(config, PictureKind::Blob, key.into(), variant, Some(provider))
    }

    /// Entry whose payload is a whole picture.
    pub fn from_picture(picture: Picture) -> Self {
        let config = Arc::clone(picture.config());
        let mut data = Self::build(
            config,
            PictureKind::Picture,
            PictureKind::Picture.default_key(),
            Variant::Embedded,
            None,
        );
        data.decoded = LoadSlot::loaded(Decoded::Embedded { picture });
        data
    }

    /// Composite of two pictures.
    ///
    /// Children that are not embedded pictures are wrapped in a one-entry
    /// picture first. Passing the same `Arc` twice shares the child, which
    /// is then written once.
    pub fn meta(
        config: Arc<PictureConfig>,
        op: MetaOp,
        first: Option<Arc<PictureData>>,
        second: Option<Arc<PictureData>>,
    ) -> Self {
        let composite = MetaComposite::new(op, first, second);
        Self::build(
            config,
            PictureKind::Meta,
            PictureKind::Meta.default_key(),
            Variant::Meta(composite),
            None,
        )
    }

    pub fn config(&self) -> &Arc<PictureConfig> {
        &self.config
    }

    pub fn kind(&self) -> PictureKind {
        self.kind
    }

    /// Key of this entry in a picture (mime type or synthetic identifier).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Block tag written for this entry.
    pub fn tag(&self) -> u32 {
        match &self.variant {
            Variant::Opaque { tag, .. } => *tag,
            _ => self.kind.tag(),
        }
    }

    pub fn variant_kind(&self) -> VariantKind {
        match &self.variant {
            Variant::Bitmap => VariantKind::Bitmap,
            Variant::Vector => VariantKind::Vector,
            Variant::Native => VariantKind::Native,
            Variant::Meta(_) => VariantKind::Meta,
            Variant::Embedded => VariantKind::Embedded,
            Variant::Opaque { .. } => VariantKind::Opaque,
        }
    }

    /// Codec associated with the bytes, if any.
    pub fn codec(&self) -> Option<Arc<CodecInfo>> {
        self.provider()
            .and_then(|p| p.decoder())
            .or_else(|| self.config.codecs.by_mime(&self.key))
    }

    pub fn provider(&self) -> Option<Arc<PictureDataProvider>> {
        self.provider.read().clone()
    }

    /// Swap the byte source; the decoded form and metadata are dropped.
    pub fn replace_provider(&self, provider: PictureDataProvider) {
        *self.provider.write() = Some(Arc::new(provider));
        self.reset();
    }

    /// Keep the entry but never draw or select it.
    pub(crate) fn suppress(&mut self) {
        self.suppressed = true;
    }

    /// Children of a composite entry; empty for every other variant.
    pub fn children(&self) -> Vec<Arc<PictureData>> {
        match &self.variant {
            Variant::Meta(composite) => {
                let (first, second) = composite.children();
                first.into_iter().chain(second).cloned().collect()
            },
            _ => Vec::new(),
        }
    }

    /// Copy the bytes of every source this entry reads from into memory it
    /// owns, composite children included.
    pub fn detach(&self) -> Result<()> {
        for child in self.children() {
            child.detach()?;
        }
        match self.provider() {
            Some(provider) if !provider.is_self_contained() => {
                let bytes = provider.to_bytes()?;
                self.replace_provider(PictureDataProvider::from_slice(&bytes, ByteRange::ALL));
            },
            _ => {},
        }
        Ok(())
    }

    /// Block flags written for this entry.
    pub fn flags(&self) -> BlockFlags {
        if let Variant::Opaque { flags, .. } = &self.variant {
            return *flags;
        }
        let mut flags = BlockFlags::empty();
        flags.set(BlockFlags::VECTOR, self.is_vector());
        flags.set(BlockFlags::RASTER, self.is_raster());
        flags.set(BlockFlags::NON_RENDERABLE, !self.is_renderable());
        flags
    }

    fn nested_display(&self) -> Option<Arc<PictureData>> {
        match &*self.load() {
            Decoded::Embedded { picture } => picture.picture_data_for_display(),
            _ => None,
        }
    }

    pub fn is_renderable(&self) -> bool {
        if self.suppressed {
            return false;
        }
        match &self.variant {
            Variant::Opaque { .. } => false,
            Variant::Embedded => self.nested_display().is_some_and(|d| d.is_renderable()),
            _ => true,
        }
    }

    pub fn is_vector(&self) -> bool {
        match &self.variant {
            Variant::Vector | Variant::Meta(_) | Variant::Native => true,
            Variant::Embedded => self.nested_display().is_some_and(|d| d.is_vector()),
            Variant::Bitmap | Variant::Opaque { .. } => false,
        }
    }

    pub fn is_raster(&self) -> bool {
        match &self.variant {
            Variant::Bitmap => true,
            Variant::Embedded => self.nested_display().is_some_and(|d| d.is_raster()),
            _ => false,
        }
    }

    pub fn resolution(&self) -> Resolution {
        *self.resolution.read()
    }

    pub fn set_resolution(&self, resolution: Resolution) {
        *self.resolution.write() = resolution;
    }

    /// Size recorded by the container block, if any.
    pub fn declared_size(&self) -> Option<Size> {
        *self.declared.read()
    }

    pub fn set_declared_size(&self, size: Option<Size>) {
        *self.declared.write() = size.filter(|s| !s.is_empty());
    }

    /// Payload bytes of raw variants (the encoded file).
    pub fn bytes(&self) -> Result<Bytes> {
        let provider = self
            .provider()
            .ok_or_else(|| Error::InvalidProvider("Picture data has no provider".into()))?;
        provider.throw_last_error()?;
        match provider.begin_direct_access() {
            Some(access) => Ok(access.bytes()),
            None => Err(provider
                .last_error()
                .unwrap_or_else(|| Error::InvalidProvider("Provider refused direct access".into()))),
        }
    }

    pub(crate) fn load(&self) -> Arc<Decoded> {
        self.decoded.get_or_load(|| {
            log::debug!("Loading {} ({:?})", self.key, self.variant_kind());
            match &self.variant {
                Variant::Bitmap => self.bytes_or_empty(|bytes| bitmap::load(self.kind, bytes)),
                Variant::Vector => self.bytes_or_empty(vector::load),
                Variant::Native => {
                    self.bytes_or_empty(|bytes| native::load(&self.config, self.kind, bytes))
                },
                Variant::Meta(composite) => composite.load(),
                Variant::Embedded => match self.provider() {
                    Some(provider) => embedded::load(&self.config, provider),
                    None => Decoded::Empty,
                },
                Variant::Opaque { .. } => Decoded::Empty,
            }
        })
    }

    fn bytes_or_empty<F>(&self, load: F) -> Decoded
    where
        F: FnOnce(Bytes) -> Decoded,
    {
        match self.bytes() {
            Ok(bytes) => load(bytes),
            Err(e) => {
                log::debug!("No bytes for {}: {}", self.key, e);
                Decoded::Empty
            },
        }
    }

    /// Whether the decoded form is currently materialized.
    pub fn is_loaded(&self) -> bool {
        self.decoded.is_loaded()
    }

    /// Number of decodes performed so far.
    pub fn decode_count(&self) -> usize {
        self.decoded.load_count()
    }

    /// Drop the decoded form and metadata; the next access loads again.
    ///
    /// Entries built directly from an in-memory picture have nothing to
    /// reload from and keep their picture.
    pub fn reset(&self) {
        if matches!(self.variant, Variant::Embedded) && self.provider().is_none() {
            return;
        }
        self.decoded.reset();
        self.metadata.reset();
    }

    /// Bounds after loading; zero when the bytes could not be decoded.
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.load().size())
    }

    pub fn width(&self) -> u32 {
        self.load().size().width
    }

    pub fn height(&self) -> u32 {
        self.load().size().height
    }

    /// Best known size without decoding pixels: the loaded size, the
    /// declared size, or a header probe.
    pub fn size_hint(&self) -> Size {
        if let Some(decoded) = self.decoded.peek() {
            return decoded.size();
        }
        if let Some(size) = self.declared_size() {
            return size;
        }
        match &self.variant {
            Variant::Opaque { .. } => Size::ZERO,
            Variant::Meta(composite) => composite.size_hint(),
            // Parsing the nested container decodes nothing
            Variant::Embedded => self.load().size(),
            _ => self
                .provider()
                .and_then(|p| p.read_range(0, p.data_size()).ok())
                .and_then(|bytes| codec::probe_size(self.kind, &bytes).ok())
                .unwrap_or_default(),
        }
    }

    /// Frame timeline of animated formats.
    pub fn timeline(&self) -> Option<Timeline> {
        match &self.variant {
            Variant::Bitmap if self.kind.is_animated_format() => {
                let bytes = self.bytes().ok()?;
                gif::walk(&bytes).ok().map(|info| info.timeline)
            },
            Variant::Embedded => self.nested_display()?.timeline(),
            _ => None,
        }
    }

    /// Number of frames; 1 for still pictures, 0 for opaque data.
    pub fn frame_count(&self) -> usize {
        if !self.is_renderable() {
            return 0;
        }
        self.timeline().map_or(1, |t| t.frame_count().max(1))
    }

    /// Decoded RGBA frame; `frame` wraps around the frame count.
    pub fn raster(&self, frame: usize) -> Option<RgbaImage> {
        match &*self.load() {
            Decoded::Raster { frames } if !frames.is_empty() => {
                Some(frames[frame % frames.len()].clone())
            },
            Decoded::Embedded { picture } => picture.picture_data_for_display()?.raster(frame),
            _ => None,
        }
    }

    /// Handle created by the platform bridge for native metafiles.
    pub fn native_handle(&self) -> Option<NativeHandle> {
        match &*self.load() {
            Decoded::Native { handle, .. } => handle.clone(),
            _ => None,
        }
    }

    /// Metadata bag, loaded independently of the pixels.
    pub fn metadata(&self) -> Arc<PictureMetadata> {
        self.metadata.get_or_load(|| match &self.variant {
            Variant::Bitmap => match self.bytes() {
                Ok(bytes) => codec::metadata::extract(self.kind, &bytes).unwrap_or_else(|e| {
                    log::debug!("No metadata for {}: {}", self.key, e);
                    PictureMetadata::default()
                }),
                Err(_) => PictureMetadata::default(),
            },
            Variant::Embedded => self
                .nested_display()
                .map(|d| (*d.metadata()).clone())
                .unwrap_or_default(),
            _ => PictureMetadata::default(),
        })
    }

    /// Draw into `dest`. Non-renderable or undecodable data draws nothing.
    pub fn draw(
        &self,
        surface: &mut dyn DrawingSurface,
        dest: Rect,
        settings: &DrawSettings,
    ) -> Result<()> {
        if !self.is_renderable() {
            return Ok(());
        }
        let decoded = self.load();
        let size = decoded.size();
        if size.is_empty() {
            return Ok(());
        }
        draw::with_settings(surface, settings, |surface| {
            let nested = settings.nested();
            for cell in settings.split.cells(dest) {
                for target in draw::layout(size, cell, settings.scale_mode) {
                    self.draw_decoded(&decoded, surface, target, settings, &nested)?;
                }
            }
            Ok(())
        })
    }

    fn draw_decoded(
        &self,
        decoded: &Decoded,
        surface: &mut dyn DrawingSurface,
        target: Rect,
        settings: &DrawSettings,
        nested: &DrawSettings,
    ) -> Result<()> {
        match decoded {
            Decoded::Raster { frames } => {
                let frame = &frames[settings.frame % frames.len()];
                surface.draw_raster(frame, target, settings)
            },
            Decoded::Vector { bytes, .. } => surface.draw_vector(self.kind, bytes, target, settings),
            Decoded::Native {
                handle: Some(handle),
                ..
            } => self.config.bridge.draw_native(handle, surface, target, settings),
            Decoded::Native { bytes, .. } => surface.draw_native(self.kind, bytes, target, settings),
            Decoded::Meta { .. } => match &self.variant {
                Variant::Meta(composite) => composite.draw(surface, target, nested),
                _ => Ok(()),
            },
            Decoded::Embedded { picture } => picture.draw(surface, target, nested),
            Decoded::Empty => Ok(()),
        }
    }

    /// Serialize this representation's payload.
    pub fn save(&self, out: &mut ByteWriter, acc: &mut Accumulator) -> Result<()> {
        match &self.variant {
            Variant::Meta(composite) => composite.save(out, acc),
            Variant::Embedded => {
                out.put_bytes(&self.embedded_bytes()?);
                Ok(())
            },
            Variant::Opaque { keyed: true, .. } => {
                opaque::write_key(out, &self.key)?;
                out.put_bytes(&self.bytes()?);
                Ok(())
            },
            _ => {
                out.put_bytes(&self.bytes()?);
                Ok(())
            },
        }
    }

    /// Size [`save`](Self::save) would write, registering composite children
    /// in `acc` the same way.
    pub fn data_size(&self, acc: &mut Accumulator) -> Result<u64> {
        let raw = || -> Result<u64> {
            let provider = self
                .provider()
                .ok_or_else(|| Error::InvalidProvider("Picture data has no provider".into()))?;
            provider.throw_last_error()?;
            Ok(provider.data_size64())
        };
        match &self.variant {
            Variant::Meta(composite) => composite.data_size(acc),
            Variant::Embedded => Ok(self.embedded_bytes()?.len() as u64),
            Variant::Opaque { keyed: true, .. } => {
                Ok(2 + self.key.len() as u64 + raw()?)
            },
            _ => raw(),
        }
    }

    /// Nested container bytes of an embedded entry.
    pub(crate) fn embedded_bytes(&self) -> Result<Bytes> {
        match self.decoded.peek().as_deref() {
            Some(Decoded::Embedded { picture }) => picture.value_bytes(),
            _ => self.bytes(),
        }
    }

    /// Nested picture of an embedded entry.
    pub fn picture(&self) -> Option<Picture> {
        match &*self.load() {
            Decoded::Embedded { picture } => Some(picture.clone()),
            _ => None,
        }
    }

    /// Independent copy with the same content.
    pub fn duplicate(&self) -> Result<PictureData> {
        let mut copy = match &self.variant {
            Variant::Meta(composite) => Self::build(
                Arc::clone(&self.config),
                self.kind,
                self.key.clone(),
                Variant::Meta(composite.duplicate()?),
                None,
            ),
            Variant::Embedded if self.provider().is_none() => match &*self.load() {
                Decoded::Embedded { picture } => Self::from_picture(picture.deep_clone()?),
                _ => return Err(Error::InvalidProvider("Embedded picture is missing".into())),
            },
            variant => {
                let variant = variant
                    .raw_copy()
                    .ok_or_else(|| Error::Other(format!("Cannot copy {} as raw bytes", self.key)))?;
                let bytes = self.bytes()?;
                let provider = Arc::new(PictureDataProvider::from_slice(&bytes, ByteRange::ALL));
                Self::build(
                    Arc::clone(&self.config),
                    self.kind,
                    self.key.clone(),
                    variant,
                    Some(provider),
                )
            },
        };
        copy.set_declared_size(self.declared_size());
        copy.set_resolution(self.resolution());
        copy.suppressed = self.suppressed;
        Ok(copy)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::gif::tests::animated_gif;
    use crate::codec::metadata::tests::jpeg_with_exif;
    use crate::codec::metafile::tests::emf_bytes;
    use crate::codec::raster::tests::png_bytes;
    use crate::draw::tests::{Call, RecordingSurface};

    pub(crate) fn config() -> Arc<PictureConfig> {
        Arc::new(PictureConfig::default())
    }

    pub(crate) fn png_data(width: u32, height: u32) -> PictureData {
        PictureData::with_kind(config(), PictureKind::Png, Bytes::from(png_bytes(width, height)))
    }

    #[test]
    fn test_lazy_load_runs_once() {
        let data = png_data(6, 4);
        assert!(!data.is_loaded());
        for _ in 0..10 {
            assert_eq!(data.width(), 6);
            assert_eq!(data.height(), 4);
        }
        assert_eq!(data.decode_count(), 1);
        assert_eq!(data.bounds(), Rect::new(0.0, 0.0, 6.0, 4.0));
    }

    #[test]
    fn test_size_hint_does_not_decode() {
        let data = png_data(9, 2);
        assert_eq!(data.size_hint(), Size::new(9, 2));
        assert_eq!(data.decode_count(), 0);

        data.set_declared_size(Some(Size::new(100, 50)));
        assert_eq!(data.size_hint(), Size::new(100, 50));
    }

    #[test]
    fn test_failed_decode_degrades() {
        let data = PictureData::with_kind(config(), PictureKind::Jpeg, Bytes::from_static(b"\xFF\xD8\xFF junk"));
        assert!(data.is_renderable());
        assert_eq!(data.bounds(), Rect::ZERO);
        let mut surface = RecordingSurface::default();
        data.draw(&mut surface, Rect::new(0.0, 0.0, 10.0, 10.0), &DrawSettings::default())
            .unwrap();
        assert!(surface.calls.is_empty());
    }

    #[test]
    fn test_reset_and_replace_provider() {
        let data = png_data(3, 3);
        assert_eq!(data.width(), 3);
        data.replace_provider(PictureDataProvider::from_slice(&png_bytes(5, 1), ByteRange::ALL));
        assert!(!data.is_loaded());
        assert_eq!(data.width(), 5);
        assert_eq!(data.decode_count(), 2);
    }

    #[test]
    fn test_capabilities() {
        let png = png_data(1, 1);
        assert!(png.is_raster() && !png.is_vector() && png.is_renderable());
        assert_eq!(png.flags(), BlockFlags::RASTER);

        let svg = PictureData::with_kind(config(), PictureKind::Svg, Bytes::from_static(b"<svg width='4' height='2'/>"));
        assert!(svg.is_vector() && !svg.is_raster());
        assert_eq!(svg.width(), 4);

        let blob = PictureData::blob(config(), "application/x-custom", Bytes::from_static(b"??"));
        assert!(!blob.is_renderable());
        assert_eq!(blob.variant_kind(), VariantKind::Opaque);
        assert_eq!(blob.bounds(), Rect::ZERO);
        assert_eq!(blob.frame_count(), 0);
    }

    #[test]
    fn test_native_reports_header_bounds() {
        let data = PictureData::with_kind(config(), PictureKind::Emf, Bytes::from(emf_bytes(19, 9)));
        assert!(data.is_vector());
        assert_eq!(data.bounds(), Rect::new(0.0, 0.0, 20.0, 10.0));
        assert!(data.native_handle().is_none());

        let mut surface = RecordingSurface::default();
        data.draw(&mut surface, Rect::new(0.0, 0.0, 20.0, 10.0), &DrawSettings::default())
            .unwrap();
        assert_eq!(
            surface.calls,
            vec![Call::Native {
                kind: PictureKind::Emf,
                dest: Rect::new(0.0, 0.0, 20.0, 10.0)
            }]
        );
    }

    #[test]
    fn test_gif_timeline_and_frames() {
        let data = PictureData::from_bytes(animated_gif(&[10, 20], Some(0))).unwrap();
        assert_eq!(data.kind(), PictureKind::Gif);
        let timeline = data.timeline().unwrap();
        assert_eq!(timeline.delays_ms, vec![100, 200]);
        assert_eq!(data.frame_count(), 2);
        // Timeline walk does not decode
        assert_eq!(data.decode_count(), 0);
    }

    #[test]
    fn test_metadata_without_decode() {
        let data = PictureData::with_kind(config(), PictureKind::Jpeg, Bytes::from(jpeg_with_exif()));
        assert_eq!(data.metadata().orientation(), Some(6));
        assert!(!data.is_loaded());
    }

    #[test]
    fn test_draw_raster_with_scale_mode() {
        let data = png_data(20, 10);
        let mut surface = RecordingSurface::default();
        let settings = DrawSettings::default().with_scale_mode(crate::draw::ScaleMode::Fit);
        data.draw(&mut surface, Rect::new(0.0, 0.0, 40.0, 40.0), &settings).unwrap();
        assert_eq!(
            surface.calls,
            vec![Call::Raster {
                size: (20, 10),
                dest: Rect::new(0.0, 10.0, 40.0, 20.0),
                frame: 0
            }]
        );
    }

    #[test]
    fn test_save_blob_prefixes_key() {
        let blob = PictureData::blob(config(), "x/y", Bytes::from_static(b"abc"));
        let mut out = ByteWriter::new();
        let mut acc = Accumulator::new();
        blob.save(&mut out, &mut acc).unwrap();
        assert_eq!(out.as_slice(), b"\x03\x00x/yabc");
        assert_eq!(blob.data_size(&mut acc).unwrap(), 8);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let data = png_data(2, 3);
        data.set_resolution(Resolution {
            horizontal: 300,
            vertical: 300,
        });
        let copy = data.duplicate().unwrap();
        assert!(!Arc::ptr_eq(&data.provider().unwrap(), &copy.provider().unwrap()));
        assert_eq!(copy.resolution().horizontal, 300);
        assert_eq!(copy.bytes().unwrap(), data.bytes().unwrap());
        assert_eq!(copy.width(), 2);
    }

    #[test]
    fn test_from_file_sniffs_content() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        std::io::Write::write_all(&mut file, &png_bytes(4, 4)).unwrap();
        let data = PictureData::from_file(config(), file.path()).unwrap();
        assert_eq!(data.kind(), PictureKind::Png);
        assert_eq!(data.width(), 4);
        assert!(PictureData::from_file(config(), "/missing/file.png").is_err());
    }
}
