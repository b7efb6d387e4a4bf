use crate::common::CanonicalKey;
use crate::errors::KvsResult;
use crate::store::{
    EntryIterator, FetchingEntryProvider, FetchingValueProvider, KeyIterator, ValueIterator,
};

/// Contract between the [`Kvs`](crate::kvs::Kvs) facade and a storage engine.
///
/// Only `get`, `put`, `remove` and `keys` are required. Every other method has
/// a fallback built on the required four, so an engine that lacks a native
/// capability still behaves uniformly. Adapters override a fallback whenever
/// the engine can do better.
///
/// Keys are already canonical and values are already encoded when they reach a
/// backend. An empty stored value is treated as absent by the facade.
///
/// # Implementing an external store
///
/// ```rust,ignore
/// struct Remote { /* ... */ }
///
/// impl BackendProvider for Remote {
///     fn get(&self, key: &CanonicalKey) -> KvsResult<Option<Vec<u8>>> { /* ... */ }
///     fn put(&self, key: CanonicalKey, value: Vec<u8>) -> KvsResult<()> { /* ... */ }
///     fn remove(&self, key: &CanonicalKey) -> KvsResult<()> { /* ... */ }
///     fn keys(&self) -> KvsResult<KeyIterator<'_>> { /* ... */ }
/// }
///
/// let store = Kvs::open(Database::External(Arc::new(Remote::new())))?;
/// ```
pub trait BackendProvider: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str {
        "external"
    }

    /// Returns the encoded value stored under `key`.
    fn get(&self, key: &CanonicalKey) -> KvsResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: CanonicalKey, value: Vec<u8>) -> KvsResult<()>;

    /// Removes `key`.
    ///
    /// A backend may report a missing key with an error of kind
    /// [`NotFound`](crate::errors::ErrorKind::NotFound); callers treat it as
    /// success.
    fn remove(&self, key: &CanonicalKey) -> KvsResult<()>;

    /// Walks all keys in backend order.
    fn keys(&self) -> KvsResult<KeyIterator<'_>>;

    /// Returns `true` if `key` holds a non-empty value.
    fn contains_key(&self, key: &CanonicalKey) -> KvsResult<bool> {
        Ok(self.get(key)?.is_some_and(|value| !value.is_empty()))
    }

    /// Walks all encoded values in key order.
    fn values(&self) -> KvsResult<ValueIterator<'_>> {
        let keys = self.keys()?;
        Ok(ValueIterator::new(FetchingValueProvider::new(self, keys)))
    }

    /// Walks all (key, encoded value) pairs in key order.
    fn entries(&self) -> KvsResult<EntryIterator<'_>> {
        let keys = self.keys()?;
        Ok(EntryIterator::new(FetchingEntryProvider::new(self, keys)))
    }

    /// Flushes pending writes to durable storage.
    fn sync(&self) -> KvsResult<()> {
        Ok(())
    }

    /// Reclaims space, where the engine supports it.
    fn optimize(&self) -> KvsResult<()> {
        Ok(())
    }

    /// Removes every entry.
    ///
    /// The fallback snapshots the key set first, removes each key and then
    /// asks the engine to reclaim space.
    fn clear(&self) -> KvsResult<()> {
        let keys = self.keys()?.collect::<KvsResult<Vec<_>>>()?;
        for key in keys.iter() {
            match self.remove(key) {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        self.optimize()
    }

    /// Releases the engine's resources.
    fn close(&self) -> KvsResult<()> {
        Ok(())
    }
}
