//! Identity registry for one save or size pass.
//!
//! Composite entries consult the accumulator before writing a child picture:
//! the first registration of a given [`PictureData`] instance writes its
//! bytes and receives an index, later occurrences only store that index.
//! The reader rebuilds the same list in the same order, so indices resolve
//! back to shared instances.

use crate::data::PictureData;
use std::sync::Arc;

/// Ordered list of picture data instances seen in the current pass.
///
/// Identity is pointer identity (`Arc::as_ptr`), never content. Entries are
/// retained for the accumulator's lifetime, so an address cannot be reused
/// by another instance mid-pass.
#[derive(Debug, Default)]
pub struct Accumulator {
    entries: Vec<Arc<PictureData>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `data` if it was already registered.
    pub fn find(&self, data: &Arc<PictureData>) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| std::ptr::eq(Arc::as_ptr(entry), Arc::as_ptr(data)))
    }

    /// Register `data`, returning its index. Registering twice returns the
    /// first index.
    pub fn add(&mut self, data: &Arc<PictureData>) -> usize {
        if let Some(index) = self.find(data) {
            return index;
        }
        self.entries.push(Arc::clone(data));
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Arc<PictureData>> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn blob(byte: u8) -> Arc<PictureData> {
        Arc::new(PictureData::blob(
            crate::config::PictureConfig::global(),
            "application/x-test",
            Bytes::from(vec![byte; 4]),
        ))
    }

    #[test]
    fn test_identity_not_content() {
        let mut acc = Accumulator::new();
        let a = blob(1);
        let b = blob(1);
        assert_eq!(acc.add(&a), 0);
        assert_eq!(acc.add(&b), 1);
        assert_eq!(acc.add(&a), 0);
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.find(&b), Some(1));
        assert!(Arc::ptr_eq(acc.get(0).unwrap(), &a));
        assert!(acc.get(2).is_none());
    }

    #[test]
    fn test_empty() {
        let acc = Accumulator::new();
        assert!(acc.is_empty());
        assert!(acc.find(&blob(0)).is_none());
    }
}
