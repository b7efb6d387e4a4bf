use crate::common::{CanonicalKey, STORE_CLOSED_MESSAGE};
use crate::errors::{ErrorKind, KvsError, KvsResult};
use crate::store::{BackendProvider, EntryIterator, KeyIterator, ValueIterator};
use crossbeam_skiplist::SkipMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Transient backend kept entirely in process memory.
///
/// Entries live in a lock-free skip list ordered by canonical key bytes.
/// Nothing survives a process restart. Cloning is cheap and shares the same
/// map.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend {
            inner: Arc::new(MemoryBackendInner::default()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.backing_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.backing_map.is_empty()
    }
}

impl BackendProvider for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &CanonicalKey) -> KvsResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: CanonicalKey, value: Vec<u8>) -> KvsResult<()> {
        self.inner.put(key, value)
    }

    fn remove(&self, key: &CanonicalKey) -> KvsResult<()> {
        self.inner.remove(key)
    }

    fn keys(&self) -> KvsResult<KeyIterator<'_>> {
        self.inner.check_opened()?;
        let iter = self
            .inner
            .backing_map
            .iter()
            .map(|entry| Ok(entry.key().clone()));
        Ok(KeyIterator::from_iter(iter))
    }

    fn contains_key(&self, key: &CanonicalKey) -> KvsResult<bool> {
        self.inner.check_opened()?;
        Ok(self
            .inner
            .backing_map
            .get(key)
            .is_some_and(|entry| !entry.value().is_empty()))
    }

    fn values(&self) -> KvsResult<ValueIterator<'_>> {
        self.inner.check_opened()?;
        let iter = self
            .inner
            .backing_map
            .iter()
            .map(|entry| Ok(entry.value().clone()));
        Ok(ValueIterator::from_iter(iter))
    }

    fn entries(&self) -> KvsResult<EntryIterator<'_>> {
        self.inner.check_opened()?;
        let iter = self
            .inner
            .backing_map
            .iter()
            .map(|entry| Ok((entry.key().clone(), entry.value().clone())));
        Ok(EntryIterator::from_iter(iter))
    }

    fn clear(&self) -> KvsResult<()> {
        self.inner.check_opened()?;
        self.inner.backing_map.clear();
        Ok(())
    }

    fn close(&self) -> KvsResult<()> {
        self.inner.close();
        Ok(())
    }
}

#[derive(Default)]
struct MemoryBackendInner {
    backing_map: SkipMap<CanonicalKey, Vec<u8>>,
    closed: AtomicBool,
}

impl MemoryBackendInner {
    fn check_opened(&self) -> KvsResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("Memory backend is closed");
            return Err(KvsError::new(
                STORE_CLOSED_MESSAGE,
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn get(&self, key: &CanonicalKey) -> KvsResult<Option<Vec<u8>>> {
        self.check_opened()?;
        Ok(self
            .backing_map
            .get(key)
            .map(|entry| entry.value().clone()))
    }

    fn put(&self, key: CanonicalKey, value: Vec<u8>) -> KvsResult<()> {
        self.check_opened()?;
        self.backing_map.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &CanonicalKey) -> KvsResult<()> {
        self.check_opened()?;
        match self.backing_map.remove(key) {
            Some(_) => Ok(()),
            None => Err(KvsError::new(
                &format!("Key {} not found", key),
                ErrorKind::NotFound,
            )),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            self.backing_map.clear();
            log::debug!("Memory backend closed");
        }
    }
}
