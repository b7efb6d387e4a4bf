//! Benchmark configuration

/// Storage backend type for benchmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// In-memory storage (fast, no persistence)
    InMemory,
    /// Fjall persistent storage
    Fjall,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::InMemory => write!(f, "inmemory"),
            StoreType::Fjall => write!(f, "fjall"),
        }
    }
}

/// Codec configuration under benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    JsonZlib,
    JsonLz4,
    BincodeRaw,
}

impl CodecType {
    pub const ALL: [CodecType; 3] = [CodecType::JsonZlib, CodecType::JsonLz4, CodecType::BincodeRaw];
}

impl std::fmt::Display for CodecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecType::JsonZlib => write!(f, "json+zlib"),
            CodecType::JsonLz4 => write!(f, "json+lz4"),
            CodecType::BincodeRaw => write!(f, "bincode"),
        }
    }
}

/// Configuration for benchmark runs
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Entry counts to benchmark
    pub entry_counts: Vec<usize>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            entry_counts: vec![100, 1_000, 10_000],
        }
    }
}

impl BenchmarkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quick config with smaller entry counts for fast testing
    pub fn quick() -> Self {
        Self {
            entry_counts: vec![100, 1_000],
        }
    }
}
