//! Load-once slot with an atomic fast path.
//!
//! State moves `Unloaded -> Loading -> Loaded` under a mutex; once loaded,
//! readers only perform an acquire load of the state and clone an `Arc`.
//! [`LoadSlot::reset`] moves back to `Unloaded`.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

const UNLOADED: u8 = 0;
const LOADING: u8 = 1;
const LOADED: u8 = 2;

pub(crate) struct LoadSlot<T> {
    state: AtomicU8,
    crit: Mutex<()>,
    value: RwLock<Option<Arc<T>>>,
    loads: AtomicUsize,
}

impl<T> Default for LoadSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LoadSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(UNLOADED),
            crit: Mutex::new(()),
            value: RwLock::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Slot that starts out loaded with `value`. Does not count as a load.
    pub(crate) fn loaded(value: T) -> Self {
        let slot = Self::new();
        *slot.value.write() = Some(Arc::new(value));
        slot.state.store(LOADED, Ordering::Release);
        slot
    }

    fn fast(&self) -> Option<Arc<T>> {
        if self.state.load(Ordering::Acquire) == LOADED {
            self.value.read().clone()
        } else {
            None
        }
    }

    /// Return the value, running `load` first if needed.
    ///
    /// Concurrent callers block on the first loader and then share its
    /// result; `load` runs at most once per reset.
    pub(crate) fn get_or_load<F>(&self, load: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.fast() {
            return value;
        }
        let _guard = self.crit.lock();
        if let Some(value) = self.fast() {
            return value;
        }
        self.state.store(LOADING, Ordering::Release);
        let value = Arc::new(load());
        self.loads.fetch_add(1, Ordering::Relaxed);
        *self.value.write() = Some(Arc::clone(&value));
        self.state.store(LOADED, Ordering::Release);
        value
    }

    /// Current value without loading.
    pub(crate) fn peek(&self) -> Option<Arc<T>> {
        self.fast()
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.state.load(Ordering::Acquire) == LOADED
    }

    /// Drop the value; the next access loads again.
    pub(crate) fn reset(&self) {
        let _guard = self.crit.lock();
        self.state.store(UNLOADED, Ordering::Release);
        *self.value.write() = None;
    }

    /// Number of times `load` actually ran.
    pub(crate) fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_loads_once() {
        let slot = LoadSlot::new();
        assert!(slot.peek().is_none());
        for _ in 0..5 {
            assert_eq!(*slot.get_or_load(|| 7), 7);
        }
        assert_eq!(slot.load_count(), 1);
        assert!(slot.is_loaded());
    }

    #[test]
    fn test_reset_reloads() {
        let slot = LoadSlot::new();
        slot.get_or_load(|| 1);
        slot.reset();
        assert!(!slot.is_loaded());
        assert_eq!(*slot.get_or_load(|| 2), 2);
        assert_eq!(slot.load_count(), 2);
    }

    #[test]
    fn test_concurrent_first_load() {
        let slot = Arc::new(LoadSlot::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || *slot.get_or_load(|| 42u32))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(slot.load_count(), 1);
    }

    #[test]
    fn test_preloaded() {
        let slot = LoadSlot::loaded("ready");
        assert_eq!(*slot.get_or_load(|| "never"), "ready");
        assert_eq!(slot.load_count(), 0);
    }
}
