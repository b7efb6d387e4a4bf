use crate::codec::ValueCodec;
use crate::common::{Key, STORE_CLOSED_MESSAGE};
use crate::errors::{ErrorKind, KvsError, KvsResult};
use crate::kvs_builder::{Database, KvsBuilder};
use crate::store::{BackendProvider, Items, KeyIterator, MemoryBackend, Values};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The active backend of a store.
///
/// Owned backends are created by the store and closed by it. External ones
/// are supplied by the caller, who keeps responsibility for closing them.
pub(crate) enum BackendHandle {
    Owned(Box<dyn BackendProvider>),
    External(Arc<dyn BackendProvider>),
}

impl BackendHandle {
    fn provider(&self) -> &dyn BackendProvider {
        match self {
            BackendHandle::Owned(backend) => backend.as_ref(),
            BackendHandle::External(backend) => backend.as_ref(),
        }
    }

    fn is_owned(&self) -> bool {
        matches!(self, BackendHandle::Owned(_))
    }
}

/// A dictionary-like key-value store over an interchangeable backend.
///
/// Keys of many types are accepted and normalized to a [`CanonicalKey`]
/// before they reach the backend (see [`Key`]). Values are any serde
/// serializable type; they go through the store's [`ValueCodec`] on the way
/// in and out.
///
/// Missing data is never an error: reads of a missing key return `None`,
/// deleting a missing key succeeds, and storing `None` deletes the key.
///
/// The store is closed when it goes out of scope. Closing syncs the backend
/// first. After an explicit [`close`](Kvs::close) every operation other than
/// `close` and `is_closed` fails with
/// [`StoreAlreadyClosed`](ErrorKind::StoreAlreadyClosed).
///
/// Iterators returned by [`keys`](Kvs::keys), [`values`](Kvs::values) and
/// [`items`](Kvs::items) borrow the store, so it cannot be mutated or closed
/// while one of them is alive.
///
/// # Examples
///
/// ```rust,ignore
/// use kvs::Kvs;
///
/// let mut store = Kvs::in_memory();
/// store.set("a", &1)?;
/// store.set("b", "two")?;
/// assert!(store.contains("a")?);
/// assert_eq!(store.get::<i32>("a")?, Some(1));
///
/// store.delete("a")?;
/// let items: Vec<(CanonicalKey, String)> = store.items()?.collect::<KvsResult<_>>()?;
/// assert_eq!(items, vec![(CanonicalKey::from("b"), "two".to_string())]);
/// ```
///
/// [`CanonicalKey`]: crate::common::CanonicalKey
pub struct Kvs {
    backend: Option<BackendHandle>,
    codec: ValueCodec,
}

impl Kvs {
    pub(crate) fn new(backend: BackendHandle, codec: ValueCodec) -> Kvs {
        Kvs {
            backend: Some(backend),
            codec,
        }
    }

    /// Returns a builder to configure and open a store.
    pub fn builder() -> KvsBuilder {
        KvsBuilder::new()
    }

    /// Opens a store on `database` with default settings.
    ///
    /// `":memory:"` selects the transient backend, any other text is a path to
    /// a persistent store which is created if missing.
    pub fn open(database: impl Into<Database>) -> KvsResult<Kvs> {
        KvsBuilder::new().database(database).open()
    }

    /// Creates an empty transient store with the default codec.
    pub fn in_memory() -> Kvs {
        Kvs::new(
            BackendHandle::Owned(Box::new(MemoryBackend::new())),
            ValueCodec::default(),
        )
    }

    /// Wraps a caller-supplied backend.
    ///
    /// The store syncs the backend when it is closed but never closes it.
    pub fn with_backend(backend: Arc<dyn BackendProvider>, codec: ValueCodec) -> Kvs {
        Kvs::new(BackendHandle::External(backend), codec)
    }

    fn provider(&self) -> KvsResult<&dyn BackendProvider> {
        match &self.backend {
            Some(handle) => Ok(handle.provider()),
            None => {
                log::error!("Operation on a closed store");
                Err(KvsError::new(
                    STORE_CLOSED_MESSAGE,
                    ErrorKind::StoreAlreadyClosed,
                ))
            }
        }
    }

    /// The active backend.
    pub fn backend(&self) -> KvsResult<&dyn BackendProvider> {
        self.provider()
    }

    /// The codec used for every stored value.
    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Returns the value stored under `key`, or `None` if there is none.
    pub fn get<V: DeserializeOwned>(&self, key: impl Into<Key>) -> KvsResult<Option<V>> {
        let backend = self.provider()?;
        let key = key.into().normalize()?;
        match backend.get(&key)? {
            Some(bytes) if !bytes.is_empty() => self.codec.loads(&bytes).map(Some),
            _ => Ok(None),
        }
    }

    /// Stores `value` under `key`.
    ///
    /// Storing an absent value (`None` or `()`) deletes the key instead.
    pub fn set<V: Serialize + ?Sized>(&mut self, key: impl Into<Key>, value: &V) -> KvsResult<()> {
        if self.codec.is_absent(value) {
            return self.delete(key);
        }

        let backend = self.provider()?;
        let key = key.into().normalize()?;
        let bytes = self.codec.dumps(value)?;
        backend.put(key, bytes)
    }

    /// Same as [`set`](Kvs::set).
    pub fn put<V: Serialize + ?Sized>(&mut self, key: impl Into<Key>, value: &V) -> KvsResult<()> {
        self.set(key, value)
    }

    /// Removes `key`. Removing a missing key succeeds.
    pub fn delete(&mut self, key: impl Into<Key>) -> KvsResult<()> {
        let backend = self.provider()?;
        let key = key.into().normalize()?;
        match backend.remove(&key) {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn contains(&self, key: impl Into<Key>) -> KvsResult<bool> {
        let backend = self.provider()?;
        let key = key.into().normalize()?;
        backend.contains_key(&key)
    }

    /// Removes `key` and returns the value it held.
    pub fn pop<V: DeserializeOwned>(&mut self, key: impl Into<Key>) -> KvsResult<Option<V>> {
        let key = key.into().normalize()?;
        let value = self.get(&key)?;
        self.delete(key)?;
        Ok(value)
    }

    /// Walks the canonical keys of all entries.
    pub fn keys(&self) -> KvsResult<KeyIterator<'_>> {
        self.provider()?.keys()
    }

    /// Walks all stored values, decoding each one as `V`.
    pub fn values<V: DeserializeOwned>(&self) -> KvsResult<Values<'_, V>> {
        let values = self.provider()?.values()?;
        Ok(Values::new(values, &self.codec))
    }

    /// Walks all entries, decoding each value as `V`.
    pub fn items<V: DeserializeOwned>(&self) -> KvsResult<Items<'_, V>> {
        let entries = self.provider()?.entries()?;
        Ok(Items::new(entries, &self.codec))
    }

    /// Removes every entry.
    pub fn clear(&mut self) -> KvsResult<()> {
        self.provider()?.clear()
    }

    /// Flushes pending writes to durable storage.
    pub fn sync(&self) -> KvsResult<()> {
        let backend = self.provider()?;
        log::debug!("Syncing {} store", backend.name());
        backend.sync()
    }

    /// Asks the backend to reclaim space.
    pub fn optimize(&mut self) -> KvsResult<()> {
        let backend = self.provider()?;
        log::debug!("Optimizing {} store", backend.name());
        backend.optimize()
    }

    /// Call-style access: reads `key` when `value` is `None`, stores it
    /// otherwise.
    ///
    /// Returns the stored value on a read and `None` on a write.
    pub fn call<V>(&mut self, key: impl Into<Key>, value: Option<V>) -> KvsResult<Option<V>>
    where
        V: Serialize + DeserializeOwned,
    {
        match value {
            None => self.get(key),
            Some(value) => {
                self.set(key, &value)?;
                Ok(None)
            }
        }
    }

    /// Reads the entry named `name`.
    ///
    /// By-name access never resolves to a method of the store, so an entry
    /// named `"keys"` or `"close"` is read like any other.
    pub fn attr<V: DeserializeOwned>(&self, name: &str) -> KvsResult<Option<V>> {
        self.get(name)
    }

    /// Stores `value` in the entry named `name`.
    pub fn set_attr<V: Serialize + ?Sized>(&mut self, name: &str, value: &V) -> KvsResult<()> {
        self.set(name, value)
    }

    /// Removes the entry named `name`.
    pub fn del_attr(&mut self, name: &str) -> KvsResult<()> {
        self.delete(name)
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    /// Syncs and releases the backend.
    ///
    /// Owned backends are closed as well; external ones are only synced. The
    /// backend is released even if syncing fails, and the first error is
    /// returned. Calling `close` again is a no-op.
    pub fn close(&mut self) -> KvsResult<()> {
        let Some(handle) = self.backend.take() else {
            return Ok(());
        };

        let backend = handle.provider();
        let synced = backend.sync();
        let closed = if handle.is_owned() {
            backend.close()
        } else {
            Ok(())
        };
        log::debug!("Closed {} store", backend.name());
        drop(handle);

        synced.and(closed)
    }
}

impl Drop for Kvs {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("Failed to close store: {}", err);
        }
    }
}

impl Debug for Kvs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let backend = self
            .backend
            .as_ref()
            .map(|handle| handle.provider().name());
        f.debug_struct("Kvs")
            .field("backend", &backend)
            .field("codec", &self.codec)
            .finish()
    }
}
