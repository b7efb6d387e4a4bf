use super::config::FjallConfig;
use super::wrapper::to_kvs_error;
use crate::common::{CanonicalKey, STORE_CLOSED_MESSAGE};
use crate::errors::{ErrorKind, KvsError, KvsResult};
use crate::store::{
    BackendProvider, EntryIterator, KeyIterator, OpenFlag, OpenMode, ValueIterator,
};
use fjall::{GarbageCollection, Keyspace, Partition, PersistMode};
use std::fmt::{Debug, Formatter};
use std::ops::RangeFull;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Persistent backend on top of a fjall LSM keyspace.
///
/// All entries live in a single partition of the keyspace opened at the
/// store's path. Writes go to the journal and are made durable by
/// [`sync`](BackendProvider::sync), by `close`, or after every mutation when
/// sync-writes mode is on.
///
/// Cloning is cheap; clones share the keyspace. The journal is persisted when
/// the last clone is dropped unless the store was closed explicitly first.
#[derive(Clone)]
pub struct FjallBackend {
    inner: Arc<FjallBackendInner>,
}

impl FjallBackend {
    /// Opens or creates the store at `path` according to `flag`.
    ///
    /// - `c` opens the store, creating it if missing
    /// - `n` discards any existing store at `path` and creates an empty one
    /// - `w` and `r` require an existing store; `r` rejects every mutation
    ///
    /// A path that exists but holds anything other than a fjall keyspace is
    /// refused with every flag and left as it is.
    pub fn open<P: AsRef<Path>>(
        path: P,
        flag: OpenFlag,
        config: FjallConfig,
    ) -> KvsResult<FjallBackend> {
        let inner = FjallBackendInner::open(path.as_ref(), flag, config)?;
        Ok(FjallBackend {
            inner: Arc::new(inner),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn flag(&self) -> OpenFlag {
        self.inner.flag
    }

    pub fn config(&self) -> &FjallConfig {
        &self.inner.config
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.flag.is_read_only()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl Debug for FjallBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallBackend")
            .field("path", &self.inner.path)
            .field("flag", &self.inner.flag.to_string())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl BackendProvider for FjallBackend {
    fn name(&self) -> &str {
        "fjall"
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
            .partition
            .range::<Vec<u8>, RangeFull>(..)
            .map(|result| match result {
                Ok((key, _)) => Ok(CanonicalKey::new(key.to_vec())),
                Err(err) => {
                    log::error!("Failed to iterate keys of fjall store: {}", err);
                    Err(to_kvs_error(err))
                }
            });
        Ok(KeyIterator::from_iter(iter))
    }

    fn contains_key(&self, key: &CanonicalKey) -> KvsResult<bool> {
        Ok(self.inner.get(key)?.is_some_and(|value| !value.is_empty()))
    }

    fn values(&self) -> KvsResult<ValueIterator<'_>> {
        self.inner.check_opened()?;
        let iter = self
            .inner
            .partition
            .range::<Vec<u8>, RangeFull>(..)
            .map(|result| match result {
                Ok((_, value)) => Ok(value.to_vec()),
                Err(err) => {
                    log::error!("Failed to iterate values of fjall store: {}", err);
                    Err(to_kvs_error(err))
                }
            });
        Ok(ValueIterator::from_iter(iter))
    }

    fn entries(&self) -> KvsResult<EntryIterator<'_>> {
        self.inner.check_opened()?;
        let iter = self
            .inner
            .partition
            .range::<Vec<u8>, RangeFull>(..)
            .map(|result| match result {
                Ok((key, value)) => Ok((CanonicalKey::new(key.to_vec()), value.to_vec())),
                Err(err) => {
                    log::error!("Failed to iterate entries of fjall store: {}", err);
                    Err(to_kvs_error(err))
                }
            });
        Ok(EntryIterator::from_iter(iter))
    }

    fn sync(&self) -> KvsResult<()> {
        self.inner.check_opened()?;
        self.inner.persist()
    }

    fn optimize(&self) -> KvsResult<()> {
        self.inner.optimize()
    }

    fn clear(&self) -> KvsResult<()> {
        self.inner.clear()
    }

    fn close(&self) -> KvsResult<()> {
        self.inner.close()
    }
}

struct FjallBackendInner {
    path: PathBuf,
    flag: OpenFlag,
    config: FjallConfig,
    keyspace: Keyspace,
    partition: Partition,
    closed: AtomicBool,
}

impl FjallBackendInner {
    fn open(path: &Path, flag: OpenFlag, config: FjallConfig) -> KvsResult<FjallBackendInner> {
        match inspect_store_dir(path)? {
            StoreDir::Foreign => {
                log::error!("{} exists and is not a kvs store", path.display());
                return Err(KvsError::new(
                    &format!("{} exists and is not a kvs store", path.display()),
                    ErrorKind::BackendOpenFailure,
                ));
            }
            StoreDir::Keyspace if flag.mode() == OpenMode::New => {
                log::debug!("Discarding existing store at {}", path.display());
                if let Err(err) = std::fs::remove_dir_all(path) {
                    log::error!("Failed to discard store at {}: {}", path.display(), err);
                    return Err(KvsError::new_with_cause(
                        &format!("Failed to discard store at {}", path.display()),
                        ErrorKind::BackendOpenFailure,
                        err.into(),
                    ));
                }
            }
            StoreDir::Missing | StoreDir::Empty if flag.requires_existing() => {
                log::error!("No store exists at {}", path.display());
                return Err(KvsError::new(
                    &format!("No store exists at {}", path.display()),
                    ErrorKind::BackendOpenFailure,
                ));
            }
            _ => {}
        }

        let keyspace = match Keyspace::open(config.keyspace_config(path)) {
            Ok(keyspace) => keyspace,
            Err(err) => {
                log::error!("Failed to open keyspace at {}: {}", path.display(), err);
                return Err(KvsError::new_with_cause(
                    &format!("Failed to open store at {}", path.display()),
                    ErrorKind::BackendOpenFailure,
                    to_kvs_error(err),
                ));
            }
        };

        let partition_name = config.partition_name();
        if flag.requires_existing() && !keyspace.partition_exists(&partition_name) {
            log::error!(
                "Store at {} has no partition named {}",
                path.display(),
                partition_name
            );
            return Err(KvsError::new(
                &format!(
                    "Store at {} has no partition named {}",
                    path.display(),
                    partition_name
                ),
                ErrorKind::BackendOpenFailure,
            ));
        }

        let partition = match keyspace.open_partition(&partition_name, config.partition_config())
        {
            Ok(partition) => partition,
            Err(err) => {
                log::error!("Failed to open partition {}: {}", partition_name, err);
                return Err(KvsError::new_with_cause(
                    &format!("Failed to open partition {}", partition_name),
                    ErrorKind::BackendOpenFailure,
                    to_kvs_error(err),
                ));
            }
        };

        log::debug!("Opened fjall store at {} with flag {}", path.display(), flag);
        Ok(FjallBackendInner {
            path: path.to_path_buf(),
            flag,
            config,
            keyspace,
            partition,
            closed: AtomicBool::new(false),
        })
    }

    fn check_opened(&self) -> KvsResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("Fjall store at {} is closed", self.path.display());
            return Err(KvsError::new(
                STORE_CLOSED_MESSAGE,
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn check_writable(&self) -> KvsResult<()> {
        self.check_opened()?;
        if self.flag.is_read_only() {
            log::error!("Fjall store at {} is read-only", self.path.display());
            return Err(KvsError::new(
                &format!("Store at {} is opened read-only", self.path.display()),
                ErrorKind::ReadOnly,
            ));
        }
        Ok(())
    }

    fn sync_writes(&self) -> bool {
        self.flag.sync_writes() || self.config.sync_writes()
    }

    fn after_write(&self) -> KvsResult<()> {
        if self.sync_writes() {
            self.persist()
        } else {
            Ok(())
        }
    }

    fn get(&self, key: &CanonicalKey) -> KvsResult<Option<Vec<u8>>> {
        self.check_opened()?;
        match self.partition.get(key.as_bytes()) {
            Ok(value) => Ok(value.map(|value| value.to_vec())),
            Err(err) => {
                log::error!("Failed to get value from fjall store: {}", err);
                Err(to_kvs_error(err))
            }
        }
    }

    fn put(&self, key: CanonicalKey, value: Vec<u8>) -> KvsResult<()> {
        self.check_writable()?;
        if let Err(err) = self.partition.insert(key.into_bytes(), value) {
            log::error!("Failed to put value in fjall store: {}", err);
            return Err(to_kvs_error(err));
        }
        self.after_write()
    }

    fn remove(&self, key: &CanonicalKey) -> KvsResult<()> {
        self.check_writable()?;
        if let Err(err) = self.partition.remove(key.as_bytes()) {
            log::error!("Failed to remove value from fjall store: {}", err);
            return Err(to_kvs_error(err));
        }
        self.after_write()
    }

    fn clear(&self) -> KvsResult<()> {
        self.check_writable()?;
        for result in self.partition.range::<Vec<u8>, RangeFull>(..) {
            match result {
                Ok((key, _)) => {
                    if let Err(err) = self.partition.remove(&*key) {
                        log::error!("Failed to remove item while clearing fjall store: {}", err);
                        return Err(to_kvs_error(err));
                    }
                }
                Err(err) => {
                    log::error!("Failed to clear fjall store: {}", err);
                    return Err(to_kvs_error(err));
                }
            }
        }
        self.after_write()?;
        self.optimize()
    }

    fn persist(&self) -> KvsResult<()> {
        match self.keyspace.persist(PersistMode::SyncAll) {
            Ok(_) => Ok(()),
            Err(err) => {
                log::error!("Failed to persist fjall store: {}", err);
                Err(to_kvs_error(err))
            }
        }
    }

    fn optimize(&self) -> KvsResult<()> {
        self.check_writable()?;
        if !self.config.kv_separated() {
            log::debug!("Skipping blob garbage collection for a store without kv separation");
            return Ok(());
        }

        if let Err(err) = self.partition.gc_scan() {
            return Self::handle_gc_error(err, "scan");
        }

        let space_amp_factor = self.config.space_amp_factor();
        if let Err(err) = self.partition.gc_with_space_amp_target(space_amp_factor) {
            return Self::handle_gc_error(err, "space amplification");
        }

        let stale_threshold = self.config.staleness_threshold();
        if let Err(err) = self.partition.gc_with_staleness_threshold(stale_threshold) {
            return Self::handle_gc_error(err, "staleness");
        }

        log::debug!("Optimized fjall store at {}", self.path.display());
        Ok(())
    }

    fn handle_gc_error<E: std::error::Error>(err: E, stage: &str) -> KvsResult<()> {
        log::error!("Failed to collect garbage ({}) in fjall store: {}", stage, err);
        Err(KvsError::new_with_cause(
            &format!("Failed to collect garbage ({})", stage),
            ErrorKind::BackendError,
            to_kvs_error(err),
        ))
    }

    fn close(&self) -> KvsResult<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }

        let result = if self.config.commit_before_close() {
            self.persist()
        } else {
            Ok(())
        };
        log::debug!("Closed fjall store at {}", self.path.display());
        result
    }
}

/// What is found at a store path before opening it.
#[derive(Debug, PartialEq, Eq)]
enum StoreDir {
    Missing,
    Empty,
    Keyspace,
    Foreign,
}

const KEYSPACE_MARKER: &str = "version";
const KEYSPACE_ENTRIES: [&str; 3] = [KEYSPACE_MARKER, "journals", "partitions"];

/// Classifies `path` without touching it.
///
/// Only a directory holding nothing but a fjall keyspace layout with a valid
/// version marker counts as an existing store.
fn inspect_store_dir(path: &Path) -> KvsResult<StoreDir> {
    if !path.exists() {
        return Ok(StoreDir::Missing);
    }
    if !path.is_dir() {
        return Ok(StoreDir::Foreign);
    }

    let entries = std::fs::read_dir(path)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|err| {
            log::error!("Failed to read store directory {}: {}", path.display(), err);
            KvsError::new_with_cause(
                &format!("Failed to read store directory {}", path.display()),
                ErrorKind::BackendOpenFailure,
                err.into(),
            )
        })?;

    if entries.is_empty() {
        return Ok(StoreDir::Empty);
    }

    let known_layout = entries.iter().all(|entry| {
        entry
            .file_name()
            .to_str()
            .is_some_and(|name| KEYSPACE_ENTRIES.contains(&name))
    });
    let marker = std::fs::read(path.join(KEYSPACE_MARKER)).unwrap_or_default();
    if known_layout && marker.starts_with(b"FJL") {
        Ok(StoreDir::Keyspace)
    } else {
        Ok(StoreDir::Foreign)
    }
}

impl Drop for FjallBackendInner {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Relaxed) || !self.config.commit_before_close() {
            return;
        }

        match self.persist() {
            Ok(_) => log::debug!("Persisted fjall store at {} on drop", self.path.display()),
            Err(err) => log::error!("Failed to persist fjall store on drop: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_path() -> PathBuf {
        std::env::temp_dir()
            .join("kvs-fjall-backend")
            .join(uuid::Uuid::new_v4().to_string())
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    fn open(path: &Path, flag: &str) -> KvsResult<FjallBackend> {
        FjallBackend::open(path, OpenFlag::parse(flag)?, FjallConfig::low_memory_preset())
    }

    fn key(text: &str) -> CanonicalKey {
        CanonicalKey::from(text)
    }

    #[test]
    fn test_put_get_remove() {
        let path = random_path();
        let backend = open(&path, "c").unwrap();

        backend.put(key("a"), b"1".to_vec()).unwrap();
        assert_eq!(backend.get(&key("a")).unwrap(), Some(b"1".to_vec()));
        assert!(backend.contains_key(&key("a")).unwrap());

        backend.remove(&key("a")).unwrap();
        assert_eq!(backend.get(&key("a")).unwrap(), None);
        // removing a missing key is a no-op for the engine
        backend.remove(&key("a")).unwrap();

        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_iteration_follows_key_order() {
        let path = random_path();
        let backend = open(&path, "c").unwrap();
        for name in ["b", "c", "a"] {
            backend.put(key(name), name.as_bytes().to_vec()).unwrap();
        }

        let keys: Vec<_> = backend.keys().unwrap().map(|k| k.unwrap()).collect();
        assert_eq!(keys, vec![key("a"), key("b"), key("c")]);

        let values: Vec<_> = backend.values().unwrap().map(|v| v.unwrap()).collect();
        assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        let entries: Vec<_> = backend.entries().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(entries[2], (key("c"), b"c".to_vec()));

        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let path = random_path();
        let backend = open(&path, "c").unwrap();
        backend.put(key("a"), b"1".to_vec()).unwrap();
        backend.put(key("b"), b"2".to_vec()).unwrap();

        backend.clear().unwrap();
        assert_eq!(backend.keys().unwrap().count(), 0);

        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = random_path();
        {
            let backend = open(&path, "c").unwrap();
            backend.put(key("a"), b"1".to_vec()).unwrap();
            backend.sync().unwrap();
            backend.close().unwrap();
        }

        let backend = open(&path, "w").unwrap();
        assert_eq!(backend.get(&key("a")).unwrap(), Some(b"1".to_vec()));
        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_new_flag_discards_existing_content() {
        let path = random_path();
        {
            let backend = open(&path, "c").unwrap();
            backend.put(key("a"), b"1".to_vec()).unwrap();
            backend.close().unwrap();
        }

        let backend = open(&path, "n").unwrap();
        assert_eq!(backend.get(&key("a")).unwrap(), None);
        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_write_and_read_flags_require_existing_store() {
        let path = random_path();
        for flag in ["w", "r"] {
            let err = open(&path, flag).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BackendOpenFailure);
        }
        assert!(!path.exists());
    }

    fn dir_listing(path: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(path)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn foreign_dir() -> PathBuf {
        let path = random_path();
        std::fs::create_dir_all(path.join("photos")).unwrap();
        std::fs::write(path.join("photos").join("precious.txt"), b"keep me").unwrap();
        path
    }

    #[test]
    fn test_new_flag_leaves_foreign_directory_alone() {
        let path = foreign_dir();

        let err = open(&path, "n").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BackendOpenFailure);
        assert_eq!(
            std::fs::read(path.join("photos").join("precious.txt")).unwrap(),
            b"keep me"
        );
        assert_eq!(dir_listing(&path), vec!["photos"]);
        cleanup(&path);
    }

    #[test]
    fn test_no_flag_writes_into_foreign_directory() {
        let path = foreign_dir();
        for flag in ["c", "w", "r"] {
            let err = open(&path, flag).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BackendOpenFailure);
        }
        assert_eq!(dir_listing(&path), vec!["photos"]);
        cleanup(&path);
    }

    #[test]
    fn test_failed_open_of_empty_directory_leaves_it_empty() {
        let path = random_path();
        std::fs::create_dir_all(&path).unwrap();

        for flag in ["w", "r", "rs"] {
            let err = open(&path, flag).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BackendOpenFailure);
            assert!(dir_listing(&path).is_empty());
        }

        // an empty directory is a valid place to create a store
        let backend = open(&path, "c").unwrap();
        backend.close().unwrap();
        drop(backend);
        assert_eq!(inspect_store_dir(&path).unwrap(), StoreDir::Keyspace);
        cleanup(&path);
    }

    #[test]
    fn test_inspect_store_dir() {
        let path = random_path();
        assert_eq!(inspect_store_dir(&path).unwrap(), StoreDir::Missing);

        std::fs::create_dir_all(&path).unwrap();
        assert_eq!(inspect_store_dir(&path).unwrap(), StoreDir::Empty);

        // a marker without fjall's magic bytes is not a store
        std::fs::write(path.join("version"), b"1.0").unwrap();
        assert_eq!(inspect_store_dir(&path).unwrap(), StoreDir::Foreign);
        cleanup(&path);

        let file = random_path();
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"not a directory").unwrap();
        assert_eq!(inspect_store_dir(&file).unwrap(), StoreDir::Foreign);
        let _ = std::fs::remove_file(&file);
    }

    #[test]
    fn test_read_only_rejects_mutations() {
        let path = random_path();
        {
            let backend = open(&path, "c").unwrap();
            backend.put(key("a"), b"1".to_vec()).unwrap();
            backend.close().unwrap();
        }

        let backend = open(&path, "r").unwrap();
        assert!(backend.is_read_only());
        assert_eq!(backend.get(&key("a")).unwrap(), Some(b"1".to_vec()));
        assert_eq!(
            backend.put(key("b"), b"2".to_vec()).unwrap_err().kind(),
            &ErrorKind::ReadOnly
        );
        assert_eq!(
            backend.remove(&key("a")).unwrap_err().kind(),
            &ErrorKind::ReadOnly
        );
        assert_eq!(backend.clear().unwrap_err().kind(), &ErrorKind::ReadOnly);
        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_sync_writes_flag() {
        let path = random_path();
        let backend = open(&path, "cs").unwrap();
        assert!(backend.flag().sync_writes());
        backend.put(key("a"), b"1".to_vec()).unwrap();
        backend.remove(&key("a")).unwrap();
        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_optimize_with_kv_separation() {
        let path = random_path();
        let config = FjallConfig::low_memory_preset();
        config.set_kv_separated(true);
        let backend = FjallBackend::open(&path, OpenFlag::default(), config).unwrap();

        backend.put(key("a"), vec![7u8; 8 * 1_024]).unwrap();
        backend.remove(&key("a")).unwrap();
        backend.optimize().unwrap();

        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_optimize_without_kv_separation_is_a_noop() {
        let path = random_path();
        let backend = open(&path, "c").unwrap();
        backend.optimize().unwrap();
        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_custom_partition_name() {
        let path = random_path();
        let config = FjallConfig::new();
        config.set_partition_name("users");
        let backend = FjallBackend::open(&path, OpenFlag::default(), config).unwrap();
        backend.put(key("a"), b"1".to_vec()).unwrap();
        backend.close().unwrap();
        drop(backend);

        // the default partition does not exist in this store
        let err = open(&path, "w").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BackendOpenFailure);
        cleanup(&path);
    }

    #[test]
    fn test_operations_after_close_fail() {
        let path = random_path();
        let backend = open(&path, "c").unwrap();
        backend.close().unwrap();
        assert!(backend.is_closed());

        assert_eq!(
            backend.get(&key("a")).unwrap_err().kind(),
            &ErrorKind::StoreAlreadyClosed
        );
        assert_eq!(
            backend.put(key("a"), b"1".to_vec()).unwrap_err().kind(),
            &ErrorKind::StoreAlreadyClosed
        );
        assert!(backend.keys().is_err());
        assert!(backend.sync().is_err());
        // closing twice is harmless
        backend.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_debug_output() {
        let path = random_path();
        let backend = open(&path, "c").unwrap();
        let debug = format!("{:?}", backend);
        assert!(debug.contains("FjallBackend"));
        assert!(debug.contains("flag: \"c\""));
        backend.close().unwrap();
        cleanup(&path);
    }
}
