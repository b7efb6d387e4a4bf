use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor, DEFAULT_PARTITION};
use fjall::{CompressionType, Config, KvSeparationOptions, PartitionCreateOptions};
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Tuning options for the persistent fjall backend.
///
/// A cloneable, thread-safe holder. Clones share the same settings, so a
/// config handed to a builder can still be adjusted until the store is
/// opened. Values are read once when the keyspace and partition are opened.
///
/// Defaults:
/// - Block cache: 64 MB, blob cache: 32 MB
/// - Write buffer: 128 MB, max journaling size: 512 MB
/// - Memtable: 32 MB, block size: 4 KB
/// - Bloom filter with 10 bits per key, LZ4 block compression
/// - Flush workers: all cores, compaction workers: half the cores
#[derive(Clone)]
pub struct FjallConfig {
    inner: Arc<FjallConfigInner>,
}

impl FjallConfig {
    #[inline]
    pub fn new() -> FjallConfig {
        FjallConfig {
            inner: Arc::new(FjallConfigInner::new()),
        }
    }

    /// Small caches and a single worker of each kind.
    pub fn low_memory_preset() -> FjallConfig {
        let config = FjallConfig::new();
        config.apply_low_memory_preset();
        config
    }

    /// Large caches, all cores, manual journal persistence and key-value
    /// separation for bulk workloads.
    pub fn high_throughput_preset() -> FjallConfig {
        let config = FjallConfig::new();
        config.apply_high_throughput_preset();
        config
    }

    pub(crate) fn apply_low_memory_preset(&self) {
        self.set_block_cache_capacity(16 * 1_024 * 1_024);
        self.set_blob_cache_capacity(8 * 1_024 * 1_024);
        self.set_max_write_buffer_size(32 * 1_024 * 1_024);
        self.set_max_memtable_size(8 * 1_024 * 1_024);
        self.set_flush_workers(1);
        self.set_compaction_workers(1);
        self.set_bloom_filter_bits(10);
    }

    pub(crate) fn apply_high_throughput_preset(&self) {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4)
            .max(1);

        self.set_block_cache_capacity(512 * 1_024 * 1_024);
        self.set_blob_cache_capacity(128 * 1_024 * 1_024);
        self.set_max_write_buffer_size(256 * 1_024 * 1_024);
        self.set_max_memtable_size(64 * 1_024 * 1_024);
        self.set_flush_workers(cpus);
        self.set_compaction_workers(cpus);
        // journal is persisted on sync and close only
        self.set_manual_journal_persist(true);
        self.set_kv_separated(true);
        self.set_bloom_filter_bits(0);
    }

    pub(crate) fn keyspace_config(&self, path: &Path) -> Config {
        let mut config = Config::new(path);
        config = config
            .manual_journal_persist(self.manual_journal_persist())
            .flush_workers(self.flush_workers())
            .compaction_workers(self.compaction_workers())
            .cache_size(self.block_cache_capacity() + self.blob_cache_capacity())
            .max_journaling_size(self.max_journaling_size())
            .max_write_buffer_size(self.max_write_buffer_size());

        if self.fsync_frequency() > 0 {
            config = config.fsync_ms(Some(self.fsync_frequency()));
        }
        config
    }

    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        let mut config = PartitionCreateOptions::default();
        config = config
            .bloom_filter_bits(if self.bloom_filter_bits() < 0 {
                None
            } else {
                Some(self.bloom_filter_bits() as u8)
            })
            .compression(self.compression_type())
            .max_memtable_size(self.max_memtable_size())
            .block_size(self.block_size());

        if self.kv_separated() {
            config = config.with_kv_separation(KvSeparationOptions::default());
        }
        config
    }

    /// Name of the partition holding the store's entries.
    pub fn partition_name(&self) -> String {
        self.inner.partition_name.read_with(|name| name.clone())
    }

    pub fn set_partition_name(&self, name: &str) {
        self.inner
            .partition_name
            .write_with(|it| *it = name.to_string())
    }

    pub fn manual_journal_persist(&self) -> bool {
        self.inner.manual_journal_persist.load(Ordering::Relaxed)
    }

    pub fn set_manual_journal_persist(&self, value: bool) {
        self.inner
            .manual_journal_persist
            .store(value, Ordering::Relaxed)
    }

    pub fn flush_workers(&self) -> usize {
        self.inner.flush_workers.load(Ordering::Relaxed)
    }

    pub fn set_flush_workers(&self, count: usize) {
        self.inner.flush_workers.store(count, Ordering::Relaxed)
    }

    pub fn compaction_workers(&self) -> usize {
        self.inner.compaction_workers.load(Ordering::Relaxed)
    }

    pub fn set_compaction_workers(&self, count: usize) {
        self.inner.compaction_workers.store(count, Ordering::Relaxed)
    }

    /// Block cache size in bytes.
    pub fn block_cache_capacity(&self) -> u64 {
        self.inner.block_cache_capacity.load(Ordering::Relaxed)
    }

    pub fn set_block_cache_capacity(&self, bytes: u64) {
        self.inner
            .block_cache_capacity
            .store(bytes, Ordering::Relaxed)
    }

    /// Blob cache size in bytes. Only used with key-value separation.
    pub fn blob_cache_capacity(&self) -> u64 {
        self.inner.blob_cache_capacity.load(Ordering::Relaxed)
    }

    pub fn set_blob_cache_capacity(&self, bytes: u64) {
        self.inner.blob_cache_capacity.store(bytes, Ordering::Relaxed)
    }

    pub fn max_journaling_size(&self) -> u64 {
        self.inner.max_journaling_size.load(Ordering::Relaxed)
    }

    pub fn set_max_journaling_size(&self, bytes: u64) {
        self.inner.max_journaling_size.store(bytes, Ordering::Relaxed)
    }

    pub fn max_write_buffer_size(&self) -> u64 {
        self.inner.max_write_buffer_size.load(Ordering::Relaxed)
    }

    pub fn set_max_write_buffer_size(&self, bytes: u64) {
        self.inner
            .max_write_buffer_size
            .store(bytes, Ordering::Relaxed)
    }

    /// Background fsync interval in milliseconds. Zero disables it.
    pub fn fsync_frequency(&self) -> u16 {
        self.inner.fsync_frequency.load(Ordering::Relaxed)
    }

    pub fn set_fsync_frequency(&self, millis: u16) {
        self.inner.fsync_frequency.store(millis, Ordering::Relaxed)
    }

    /// Whether the journal is persisted when the backend is closed or dropped.
    pub fn commit_before_close(&self) -> bool {
        self.inner.commit_before_close.load(Ordering::Relaxed)
    }

    pub fn set_commit_before_close(&self, value: bool) {
        self.inner.commit_before_close.store(value, Ordering::Relaxed)
    }

    /// Whether the journal is persisted after every mutation.
    pub fn sync_writes(&self) -> bool {
        self.inner.sync_writes.load(Ordering::Relaxed)
    }

    pub fn set_sync_writes(&self, value: bool) {
        self.inner.sync_writes.store(value, Ordering::Relaxed)
    }

    /// Bloom filter bits per key. A negative value disables the filter.
    pub fn bloom_filter_bits(&self) -> i8 {
        self.inner.bloom_filter_bits.load(Ordering::Relaxed)
    }

    pub fn set_bloom_filter_bits(&self, bits: i8) {
        self.inner.bloom_filter_bits.store(bits, Ordering::Relaxed)
    }

    pub fn compression_type(&self) -> CompressionType {
        self.inner.compression_type.read_with(|it| it.clone())
    }

    pub fn set_compression_type(&self, compression: CompressionType) {
        self.inner
            .compression_type
            .write_with(|it| *it = compression)
    }

    pub fn max_memtable_size(&self) -> u32 {
        self.inner.max_memtable_size.load(Ordering::Relaxed)
    }

    pub fn set_max_memtable_size(&self, bytes: u32) {
        self.inner.max_memtable_size.store(bytes, Ordering::Relaxed)
    }

    pub fn block_size(&self) -> u32 {
        self.inner.block_size.load(Ordering::Relaxed)
    }

    pub fn set_block_size(&self, bytes: u32) {
        self.inner.block_size.store(bytes, Ordering::Relaxed)
    }

    /// Whether large values are stored in a separate blob log.
    pub fn kv_separated(&self) -> bool {
        self.inner.kv_separated.load(Ordering::Relaxed)
    }

    pub fn set_kv_separated(&self, value: bool) {
        self.inner.kv_separated.store(value, Ordering::Relaxed)
    }

    /// Space amplification target used by blob garbage collection.
    pub fn space_amp_factor(&self) -> f32 {
        self.inner.space_amp_factor.read_with(|it| *it)
    }

    pub fn set_space_amp_factor(&self, factor: f32) {
        self.inner.space_amp_factor.write_with(|it| *it = factor)
    }

    /// Staleness threshold used by blob garbage collection.
    pub fn staleness_threshold(&self) -> f32 {
        self.inner.staleness_threshold.read_with(|it| *it)
    }

    pub fn set_staleness_threshold(&self, threshold: f32) {
        self.inner
            .staleness_threshold
            .write_with(|it| *it = threshold)
    }
}

impl Default for FjallConfig {
    fn default() -> Self {
        FjallConfig::new()
    }
}

impl Debug for FjallConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallConfig")
            .field("partition_name", &self.partition_name())
            .field("block_cache_capacity", &self.block_cache_capacity())
            .field("max_write_buffer_size", &self.max_write_buffer_size())
            .field("max_memtable_size", &self.max_memtable_size())
            .field("kv_separated", &self.kv_separated())
            .field("sync_writes", &self.sync_writes())
            .finish_non_exhaustive()
    }
}

struct FjallConfigInner {
    partition_name: Atomic<String>,
    manual_journal_persist: AtomicBool,
    flush_workers: AtomicUsize,
    compaction_workers: AtomicUsize,
    block_cache_capacity: AtomicU64,
    blob_cache_capacity: AtomicU64,
    max_journaling_size: AtomicU64,
    max_write_buffer_size: AtomicU64,
    fsync_frequency: AtomicU16,
    commit_before_close: AtomicBool,
    sync_writes: AtomicBool,

    bloom_filter_bits: AtomicI8,
    compression_type: Atomic<CompressionType>,
    max_memtable_size: AtomicU32,
    block_size: AtomicU32,
    kv_separated: AtomicBool,
    space_amp_factor: Atomic<f32>,
    staleness_threshold: Atomic<f32>,
}

impl FjallConfigInner {
    const DEFAULT_BLOCK_CACHE_MB: u64 = 64;
    const DEFAULT_BLOB_CACHE_MB: u64 = 32;
    const DEFAULT_WRITE_BUFFER_MB: u64 = 128;
    const DEFAULT_MAX_JOURNALING_MB: u64 = 512;
    const DEFAULT_MEMTABLE_MB: u32 = 32;

    fn new() -> FjallConfigInner {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);
        let flush_workers = cpus.max(1);
        let compaction_workers = (cpus / 2).max(1);

        FjallConfigInner {
            partition_name: atomic(DEFAULT_PARTITION.to_string()),
            manual_journal_persist: AtomicBool::new(false),
            flush_workers: AtomicUsize::new(flush_workers),
            compaction_workers: AtomicUsize::new(compaction_workers),
            block_cache_capacity: AtomicU64::new(Self::DEFAULT_BLOCK_CACHE_MB * 1_024 * 1_024),
            blob_cache_capacity: AtomicU64::new(Self::DEFAULT_BLOB_CACHE_MB * 1_024 * 1_024),
            max_journaling_size: AtomicU64::new(Self::DEFAULT_MAX_JOURNALING_MB * 1_024 * 1_024),
            max_write_buffer_size: AtomicU64::new(Self::DEFAULT_WRITE_BUFFER_MB * 1_024 * 1_024),
            fsync_frequency: AtomicU16::new(0),
            commit_before_close: AtomicBool::new(true),
            sync_writes: AtomicBool::new(false),
            bloom_filter_bits: AtomicI8::new(10),
            compression_type: atomic(CompressionType::Lz4),
            max_memtable_size: AtomicU32::new(Self::DEFAULT_MEMTABLE_MB * 1_024 * 1_024),
            block_size: AtomicU32::new(4 * 1_024),
            kv_separated: AtomicBool::new(false),
            space_amp_factor: atomic(1.5),
            staleness_threshold: atomic(0.8),
        }
    }
}
