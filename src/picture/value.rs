//! Value contract: serialized form, dirty tracking, copies and comparison.

use super::{Picture, ValueSource};
use crate::accumulator::Accumulator;
use crate::common::error::Result;
use crate::data::PictureData;
use crate::format::{self, SaveOptions};
use bytes::Bytes;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::io::Write;
use std::sync::Arc;

impl Picture {
    /// Whether the serialized form is stale.
    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    /// Serialize the current map and settings.
    ///
    /// In outside-file mode the entries live in the referenced file and are
    /// not written.
    pub fn save(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        let (envelope, entries) = {
            self.realize();
            let inner = self.inner.read();
            let entries: Vec<Arc<PictureData>> = if inner.envelope.outside.is_some() {
                Vec::new()
            } else {
                inner.entries.values().cloned().collect()
            };
            (inner.envelope.clone(), entries)
        };
        format::write_picture(&envelope, &entries, options)
    }

    /// The serialized form, rebuilt first when dirty.
    pub fn value_bytes(&self) -> Result<Bytes> {
        {
            let inner = self.inner.read();
            if !inner.dirty {
                match &inner.value {
                    Some(ValueSource::Bytes(bytes)) => return Ok(bytes.clone()),
                    Some(ValueSource::Window(provider)) => return provider.to_bytes(),
                    None => {},
                }
            }
        }
        let bytes = Bytes::from(self.save(&SaveOptions::default())?);
        let mut inner = self.inner.write();
        inner.value = Some(ValueSource::Bytes(bytes.clone()));
        inner.dirty = false;
        Ok(bytes)
    }

    /// Rebuild the serialized form if it is stale.
    pub fn flush(&self) -> Result<()> {
        if self.is_dirty() {
            self.value_bytes()?;
        }
        Ok(())
    }

    /// Length of the serialized form.
    pub fn space(&self) -> Result<u64> {
        {
            let inner = self.inner.read();
            if let (false, Some(ValueSource::Window(provider))) = (inner.dirty, &inner.value) {
                return Ok(provider.data_size64());
            }
        }
        Ok(self.value_bytes()?.len() as u64)
    }

    /// Write the serialized form; returns the number of bytes written.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let bytes = self.value_bytes()?;
        out.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Payload bytes of all entries, shared composite children counted once.
    pub fn data_size(&self) -> Result<u64> {
        self.realize();
        let entries: Vec<Arc<PictureData>> = self.inner.read().entries.values().cloned().collect();
        let mut acc = Accumulator::new();
        entries.iter().try_fold(0u64, |total, data| Ok(total + data.data_size(&mut acc)?))
    }

    /// Copy with independent entries. A plain [`Clone`] shares them.
    pub fn deep_clone(&self) -> Result<Picture> {
        self.realize();
        let mut inner = self.inner.read().clone();
        for data in inner.entries.values_mut() {
            *data = Arc::new(data.duplicate()?);
        }
        if let Some(ValueSource::Window(provider)) = &inner.value {
            inner.value = Some(ValueSource::Bytes(Bytes::copy_from_slice(&provider.to_bytes()?)));
        }
        inner.invalidate();
        Ok(Picture {
            config: Arc::clone(&self.config),
            inner: RwLock::new(inner),
        })
    }

    /// Cut every tie to the source the picture was read from.
    ///
    /// The serialized form and every entry that reads from a borrowed
    /// source (caller buffer, blob or stream) are copied into memory.
    pub fn detach(&mut self) -> Result<()> {
        self.realize();
        let inner = self.inner.get_mut();
        if let Some(ValueSource::Window(provider)) = &inner.value {
            inner.value = Some(ValueSource::Bytes(Bytes::copy_from_slice(&provider.to_bytes()?)));
        }
        for data in inner.entries.values() {
            data.detach()?;
        }
        Ok(())
    }

    /// Order by serialized bytes.
    pub fn compare_to(&self, other: &Picture) -> Result<Ordering> {
        Ok(self.value_bytes()?.cmp(&other.value_bytes()?))
    }
}

impl PartialEq for Picture {
    /// Equal when both serialized forms are available and identical.
    fn eq(&self, other: &Self) -> bool {
        matches!(self.compare_to(other), Ok(Ordering::Equal))
    }
}
