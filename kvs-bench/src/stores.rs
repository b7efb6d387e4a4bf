//! Store factory functions for benchmarks

use kvs::codec::{Lz4Compressor, NoCompression, StructuralFormat, ValueCodec, ZlibCompressor};
use kvs::Kvs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::config::{CodecType, StoreType};

/// Result type for store operations
pub type StoreResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Counter for unique store paths within a run
static STORE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Get the test-data directory path at the workspace root
fn get_test_data_dir() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let manifest_dir = PathBuf::from(manifest_dir);
    manifest_dir
        .parent()
        .map(|root| root.join("test-data"))
        .unwrap_or_else(|| manifest_dir.join("test-data"))
}

/// Create a unique store path within the test-data directory
fn create_unique_store_path() -> PathBuf {
    let test_data_dir = get_test_data_dir();
    std::fs::create_dir_all(&test_data_dir).ok();

    let counter = STORE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let unique_id = Uuid::new_v4();
    test_data_dir.join(format!("bench_{}_{}", counter, unique_id))
}

/// Context holding a store and its path for cleanup
pub struct BenchContext {
    store: Kvs,
    store_path: Option<PathBuf>,
}

impl BenchContext {
    pub fn store(&self) -> &Kvs {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Kvs {
        &mut self.store
    }
}

impl Drop for BenchContext {
    fn drop(&mut self) {
        if let Err(e) = self.store.close() {
            log::warn!("Failed to close bench store: {}", e);
        }

        if let Some(ref path) = self.store_path {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

/// Clean up all benchmark data in the test-data directory
pub fn cleanup_all_bench_data() {
    let test_data_dir = get_test_data_dir();
    if let Ok(entries) = std::fs::read_dir(&test_data_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let _ = std::fs::remove_dir_all(&path);
            } else {
                let _ = std::fs::remove_file(&path);
            }
        }
    }
}

pub fn codec_for(codec: CodecType) -> ValueCodec {
    match codec {
        CodecType::JsonZlib => ValueCodec::new(StructuralFormat::Json, ZlibCompressor::default()),
        CodecType::JsonLz4 => ValueCodec::new(StructuralFormat::Json, Lz4Compressor),
        CodecType::BincodeRaw => ValueCodec::new(StructuralFormat::Bincode, NoCompression),
    }
}

/// Create a transient in-memory store
pub fn create_inmemory_store() -> StoreResult<BenchContext> {
    Ok(BenchContext {
        store: Kvs::in_memory(),
        store_path: None,
    })
}

/// Create a fjall-backed store
pub fn create_fjall_store() -> StoreResult<BenchContext> {
    create_fjall_store_with_codec(CodecType::JsonZlib)
}

/// Create a fjall-backed store with the given value codec
pub fn create_fjall_store_with_codec(codec: CodecType) -> StoreResult<BenchContext> {
    let store_path = create_unique_store_path();
    let store = Kvs::builder()
        .database(&store_path)
        .flag("n")
        .codec(codec_for(codec))
        .open()?;

    Ok(BenchContext {
        store,
        store_path: Some(store_path),
    })
}

pub fn create_store(store_type: StoreType) -> StoreResult<BenchContext> {
    match store_type {
        StoreType::InMemory => create_inmemory_store(),
        StoreType::Fjall => create_fjall_store(),
    }
}
