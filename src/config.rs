//! Process-wide picture configuration.
//!
//! A [`PictureConfig`] bundles the codec registry, the platform bridge used
//! for native metafiles, the representation selection policy and a few
//! behavioral switches. Pictures capture an `Arc<PictureConfig>` when they
//! are constructed and keep it for their whole life.
//!
//! # Initialization order
//!
//! Call [`PictureConfig::install`] once at startup, before the first picture
//! is built. Installing later is allowed but only affects pictures created
//! afterwards. There is no explicit teardown: the old configuration goes
//! away when the last picture holding it is dropped.

use crate::codec::{CodecRegistry, PictureKind};
use crate::common::error::{Error, Result};
use crate::common::geometry::Rect;
use crate::draw::{DrawSettings, DrawingSurface};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

static GLOBAL: Lazy<RwLock<Arc<PictureConfig>>> =
    Lazy::new(|| RwLock::new(Arc::new(PictureConfig::default())));

/// Handle to a loaded native picture (metafile) owned by a platform bridge.
#[derive(Clone)]
pub struct NativeHandle {
    pub kind: PictureKind,
    inner: Arc<dyn Any + Send + Sync>,
}

impl NativeHandle {
    pub fn new<T: Any + Send + Sync>(kind: PictureKind, value: T) -> Self {
        Self {
            kind,
            inner: Arc::new(value),
        }
    }

    /// Borrow the bridge-specific payload.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Platform services for legacy native formats (EMF, WMF, PICT).
///
/// A host that can play metafiles installs its own bridge; the default
/// [`NullBridge`] loads nothing, so native entries still report their header
/// bounds but draw through [`DrawingSurface::draw_native`] only.
pub trait PlatformBridge: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Turn metafile bytes into a native handle. `Ok(None)` means the
    /// bridge does not handle this kind.
    fn load_native(&self, kind: PictureKind, data: &[u8]) -> Result<Option<NativeHandle>>;

    /// Play a handle previously returned by [`load_native`](Self::load_native).
    fn draw_native(
        &self,
        handle: &NativeHandle,
        surface: &mut dyn DrawingSurface,
        dest: Rect,
        settings: &DrawSettings,
    ) -> Result<()>;
}

/// Bridge that supports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBridge;

impl PlatformBridge for NullBridge {
    fn name(&self) -> &str {
        "null"
    }

    fn load_native(&self, _kind: PictureKind, _data: &[u8]) -> Result<Option<NativeHandle>> {
        Ok(None)
    }

    fn draw_native(
        &self,
        handle: &NativeHandle,
        _surface: &mut dyn DrawingSurface,
        _dest: Rect,
        _settings: &DrawSettings,
    ) -> Result<()> {
        Err(Error::Unsupported(format!(
            "No platform bridge for {:?}",
            handle.kind
        )))
    }
}

/// How a picture chooses among its representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Print the first renderable vector entry when there is one
    pub print_prefers_vector: bool,
    /// Display the richest renderable raster entry when there is one
    pub display_prefers_raster: bool,
    /// Mime types ranked for display ties, best first; unlisted types rank last
    pub display_order: Vec<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            print_prefers_vector: true,
            display_prefers_raster: true,
            display_order: [
                "image/png",
                "image/webp",
                "image/tiff",
                "image/jpeg",
                "image/gif",
                "image/bmp",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl SelectionPolicy {
    /// Tie-break rank of a mime type (lower is better).
    pub fn display_rank(&self, mime_type: &str) -> usize {
        self.display_order
            .iter()
            .position(|m| m.eq_ignore_ascii_case(mime_type))
            .unwrap_or(self.display_order.len())
    }
}

/// Settings shared by every picture built with it.
#[derive(Clone)]
pub struct PictureConfig {
    pub codecs: CodecRegistry,
    pub bridge: Arc<dyn PlatformBridge>,
    pub selection: SelectionPolicy,
    /// Directory that relative outside-file paths resolve against
    pub base_dir: Option<PathBuf>,
    /// Keep a provider's materialized copy after its last direct-access session
    pub keep_cache: bool,
}

impl Default for PictureConfig {
    fn default() -> Self {
        Self {
            codecs: CodecRegistry::new(),
            bridge: Arc::new(NullBridge),
            selection: SelectionPolicy::default(),
            base_dir: None,
            keep_cache: false,
        }
    }
}

impl fmt::Debug for PictureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureConfig")
            .field("codecs", &self.codecs.iter().count())
            .field("bridge", &self.bridge.name())
            .field("selection", &self.selection)
            .field("base_dir", &self.base_dir)
            .field("keep_cache", &self.keep_cache)
            .finish()
    }
}

impl PictureConfig {
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn PlatformBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_keep_cache(mut self, keep: bool) -> Self {
        self.keep_cache = keep;
        self
    }

    /// The configuration new pictures pick up by default.
    pub fn global() -> Arc<PictureConfig> {
        Arc::clone(&GLOBAL.read())
    }

    /// Replace the process-wide configuration, returning the previous one.
    pub fn install(config: PictureConfig) -> Arc<PictureConfig> {
        let config = Arc::new(config);
        log::debug!("Installing picture configuration (bridge: {})", config.bridge.name());
        std::mem::replace(&mut *GLOBAL.write(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_rank() {
        let policy = SelectionPolicy::default();
        assert!(policy.display_rank("image/png") < policy.display_rank("image/jpeg"));
        assert_eq!(policy.display_rank("image/x-foo"), policy.display_order.len());
    }

    #[test]
    fn test_builder() {
        let config = PictureConfig::default()
            .with_base_dir("/tmp/pictures")
            .with_keep_cache(true);
        assert_eq!(config.base_dir, Some(PathBuf::from("/tmp/pictures")));
        assert!(config.keep_cache);
        assert_eq!(config.bridge.name(), "null");
    }

    #[test]
    fn test_null_bridge_loads_nothing() {
        let bridge = NullBridge;
        assert!(bridge.load_native(PictureKind::Emf, b"").unwrap().is_none());
    }

    #[test]
    fn test_native_handle_downcast() {
        let handle = NativeHandle::new(PictureKind::Wmf, 42u32);
        assert_eq!(handle.downcast_ref::<u32>(), Some(&42));
        assert!(handle.downcast_ref::<String>().is_none());
    }
}
