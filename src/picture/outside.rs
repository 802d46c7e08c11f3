//! Outside-file mode: the entries live in a file referenced by path.

use super::Picture;
use crate::common::error::{Error, Result};
use crate::config::PictureConfig;
use crate::data::PictureData;
use crate::format::{self, OutsideRef, ReadOptions};
use crate::provider::{ByteRange, PictureDataProvider};
use std::path::PathBuf;
use std::sync::Arc;

/// Absolute location of the referenced file.
pub(super) fn resolve(config: &PictureConfig, outside: &OutsideRef) -> PathBuf {
    match (&config.base_dir, outside.relative) {
        (Some(base), true) => base.join(&outside.path),
        _ => outside.path.clone(),
    }
}

/// Read the entries of the referenced file: a serialized picture or a
/// plain image file.
pub(super) fn load(config: &Arc<PictureConfig>, outside: &OutsideRef) -> Result<Vec<Arc<PictureData>>> {
    let path = resolve(config, outside);
    if !path.is_file() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    log::debug!("Loading outside picture {}", path.display());
    let provider = Arc::new(PictureDataProvider::from_file(&path, ByteRange::ALL));
    provider.throw_last_error()?;
    let read = format::read_picture(config, &provider, &ReadOptions::default())?;
    if read.envelope.outside.is_some() {
        log::warn!("Nested outside reference in {} ignored", path.display());
    }
    Ok(read.entries)
}

impl Picture {
    /// Make the file at `path` the source of the entries.
    ///
    /// The inline map is dropped; the file is read on the next access.
    /// A `relative` path is resolved against
    /// [`PictureConfig::base_dir`].
    pub fn set_outside_path(&mut self, path: impl Into<PathBuf>, relative: bool) {
        let inner = self.inner.get_mut();
        // Settings of a value source not read yet stay with the picture
        inner.parse_pending(&self.config);
        inner.entries.clear();
        inner.envelope.outside = Some(OutsideRef {
            path: path.into(),
            relative,
        });
        inner.outside_pending = true;
        inner.mark_dirty();
    }

    /// Keep the current entries inline and drop the file reference.
    pub fn clear_outside_path(&mut self) {
        self.realize();
        let inner = self.inner.get_mut();
        if inner.envelope.outside.take().is_some() {
            inner.mark_dirty();
        }
    }

    pub fn outside_path(&self) -> Option<OutsideRef> {
        self.envelope(|e| e.outside.clone())
    }

    /// Read the referenced file again, replacing the entries.
    pub fn reload_from_outside_path(&mut self) -> Result<()> {
        self.realize();
        let outside = self.inner.get_mut().envelope.outside.clone();
        let outside = outside.ok_or_else(|| Error::NotFound("picture has no outside path".into()))?;
        let entries = load(&self.config, &outside)?;
        let inner = self.inner.get_mut();
        inner.entries.clear();
        inner.insert_all(entries);
        Ok(())
    }
}
