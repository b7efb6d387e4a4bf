use crate::codec::ValueCodec;
use crate::common::{is_in_memory, DEFAULT_FLAG};
use crate::errors::{ErrorKind, KvsError, KvsResult};
use crate::kvs::{BackendHandle, Kvs};
use crate::store::{BackendProvider, MemoryBackend, OpenFlag};
#[cfg(feature = "fjall")]
use crate::store::fjall_adapter::{CompressionType, FjallBackend, FjallConfig};
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a store keeps its entries.
#[derive(Clone, Default)]
pub enum Database {
    /// Transient in-memory map, selected by the `":memory:"` sentinel.
    #[default]
    InMemory,
    /// Persistent store at the given directory.
    Path(PathBuf),
    /// Caller-supplied backend. The store syncs it but never closes it.
    External(Arc<dyn BackendProvider>),
}

impl Database {
    /// Decodes a database argument given as raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> KvsResult<Database> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(Database::from(text)),
            Err(err) => {
                log::error!("Database path is not valid UTF-8: {}", err);
                Err(KvsError::new_with_cause(
                    "Database path is not valid UTF-8",
                    ErrorKind::BackendOpenFailure,
                    err.into(),
                ))
            }
        }
    }
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Database::InMemory => write!(f, "InMemory"),
            Database::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Database::External(backend) => {
                f.debug_tuple("External").field(&backend.name()).finish()
            }
        }
    }
}

impl From<&str> for Database {
    fn from(value: &str) -> Self {
        if is_in_memory(value) {
            Database::InMemory
        } else {
            Database::Path(PathBuf::from(value))
        }
    }
}

impl From<String> for Database {
    fn from(value: String) -> Self {
        Database::from(value.as_str())
    }
}

impl From<&String> for Database {
    fn from(value: &String) -> Self {
        Database::from(value.as_str())
    }
}

impl From<&Path> for Database {
    fn from(value: &Path) -> Self {
        match value.to_str() {
            Some(text) => Database::from(text),
            None => Database::Path(value.to_path_buf()),
        }
    }
}

impl From<PathBuf> for Database {
    fn from(value: PathBuf) -> Self {
        Database::from(value.as_path())
    }
}

impl From<&PathBuf> for Database {
    fn from(value: &PathBuf) -> Self {
        Database::from(value.as_path())
    }
}

impl From<Arc<dyn BackendProvider>> for Database {
    fn from(value: Arc<dyn BackendProvider>) -> Self {
        Database::External(value)
    }
}

/// Configures and opens a [`Kvs`] store.
///
/// # Examples
///
/// ```rust,ignore
/// let store = Kvs::builder()
///     .database("/var/lib/app/cache")
///     .flag("c")
///     .low_memory_preset()
///     .open()?;
/// ```
pub struct KvsBuilder {
    database: Database,
    flag: String,
    codec: ValueCodec,
    #[cfg(feature = "fjall")]
    fjall_config: FjallConfig,
}

impl KvsBuilder {
    pub fn new() -> KvsBuilder {
        KvsBuilder {
            database: Database::InMemory,
            flag: DEFAULT_FLAG.to_string(),
            codec: ValueCodec::default(),
            #[cfg(feature = "fjall")]
            fjall_config: FjallConfig::new(),
        }
    }

    pub fn database(mut self, database: impl Into<Database>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the dbm-style open flag, `"c"` by default.
    ///
    /// The flag is validated when the store is opened.
    pub fn flag(mut self, flag: &str) -> Self {
        self.flag = flag.to_string();
        self
    }

    pub fn codec(mut self, codec: ValueCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Opens the store.
    pub fn open(mut self) -> KvsResult<Kvs> {
        let flag = OpenFlag::parse(&self.flag)?;
        let handle = match std::mem::take(&mut self.database) {
            Database::InMemory => BackendHandle::Owned(Box::new(MemoryBackend::new())),
            Database::External(backend) => BackendHandle::External(backend),
            Database::Path(path) => Self::open_path(&path, flag, &self)?,
        };

        log::debug!(
            "Opened {} store with flag {}",
            handle_name(&handle),
            flag
        );
        Ok(Kvs::new(handle, self.codec))
    }

    #[cfg(feature = "fjall")]
    fn open_path(path: &Path, flag: OpenFlag, builder: &KvsBuilder) -> KvsResult<BackendHandle> {
        let backend = FjallBackend::open(path, flag, builder.fjall_config.clone())?;
        Ok(BackendHandle::Owned(Box::new(backend)))
    }

    #[cfg(not(feature = "fjall"))]
    fn open_path(path: &Path, _flag: OpenFlag, _builder: &KvsBuilder) -> KvsResult<BackendHandle> {
        log::error!("No persistent backend available for {}", path.display());
        Err(KvsError::new(
            &format!(
                "Cannot open {}: built without a persistent backend",
                path.display()
            ),
            ErrorKind::BackendOpenFailure,
        ))
    }
}

fn handle_name(handle: &BackendHandle) -> &str {
    match handle {
        BackendHandle::Owned(backend) => backend.name(),
        BackendHandle::External(backend) => backend.name(),
    }
}

#[cfg(feature = "fjall")]
impl KvsBuilder {
    /// Replaces the persistent store options.
    pub fn fjall_config(mut self, config: FjallConfig) -> Self {
        self.fjall_config = config;
        self
    }

    pub fn low_memory_preset(self) -> Self {
        self.fjall_config.apply_low_memory_preset();
        self
    }

    pub fn high_throughput_preset(self) -> Self {
        self.fjall_config.apply_high_throughput_preset();
        self
    }

    pub fn partition_name(self, name: &str) -> Self {
        self.fjall_config.set_partition_name(name);
        self
    }

    pub fn block_cache_capacity(self, bytes: u64) -> Self {
        self.fjall_config.set_block_cache_capacity(bytes);
        self
    }

    pub fn blob_cache_capacity(self, bytes: u64) -> Self {
        self.fjall_config.set_blob_cache_capacity(bytes);
        self
    }

    pub fn max_write_buffer_size(self, bytes: u64) -> Self {
        self.fjall_config.set_max_write_buffer_size(bytes);
        self
    }

    pub fn max_journaling_size(self, bytes: u64) -> Self {
        self.fjall_config.set_max_journaling_size(bytes);
        self
    }

    pub fn fsync_frequency(self, millis: u16) -> Self {
        self.fjall_config.set_fsync_frequency(millis);
        self
    }

    pub fn flush_workers(self, count: usize) -> Self {
        self.fjall_config.set_flush_workers(count);
        self
    }

    pub fn compaction_workers(self, count: usize) -> Self {
        self.fjall_config.set_compaction_workers(count);
        self
    }

    pub fn manual_journal_persist(self, value: bool) -> Self {
        self.fjall_config.set_manual_journal_persist(value);
        self
    }

    pub fn bloom_filter_bits(self, bits: i8) -> Self {
        self.fjall_config.set_bloom_filter_bits(bits);
        self
    }

    pub fn block_size(self, bytes: u32) -> Self {
        self.fjall_config.set_block_size(bytes);
        self
    }

    pub fn max_memtable_size(self, bytes: u32) -> Self {
        self.fjall_config.set_max_memtable_size(bytes);
        self
    }

    pub fn compression_type(self, compression: CompressionType) -> Self {
        self.fjall_config.set_compression_type(compression);
        self
    }

    pub fn kv_separated(self, value: bool) -> Self {
        self.fjall_config.set_kv_separated(value);
        self
    }

    pub fn space_amp_factor(self, factor: f32) -> Self {
        self.fjall_config.set_space_amp_factor(factor);
        self
    }

    pub fn staleness_threshold(self, threshold: f32) -> Self {
        self.fjall_config.set_staleness_threshold(threshold);
        self
    }

    pub fn commit_before_close(self, value: bool) -> Self {
        self.fjall_config.set_commit_before_close(value);
        self
    }

    /// Persists the journal after every mutation, like the `s` flag modifier.
    pub fn sync_writes(self, value: bool) -> Self {
        self.fjall_config.set_sync_writes(value);
        self
    }
}

impl Default for KvsBuilder {
    fn default() -> Self {
        KvsBuilder::new()
    }
}
