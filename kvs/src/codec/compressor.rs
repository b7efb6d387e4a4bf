use crate::codec::{CodecError, CodecResult};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Byte-level compression stage of the value pipeline.
///
/// Implementations must be lossless: `decompress(compress(x)) == x`.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> CodecResult<Vec<u8>>;

    /// Short identifier used in log messages.
    fn name(&self) -> &'static str;
}

/// zlib stream compression (RFC 1950).
#[derive(Debug, Clone, Copy)]
pub struct ZlibCompressor {
    level: u32,
}

impl ZlibCompressor {
    /// Creates a compressor with an explicit level, clamped to `0..=9`.
    pub fn new(level: u32) -> Self {
        ZlibCompressor {
            level: level.min(9),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        ZlibCompressor {
            level: Compression::default().level(),
        }
    }
}

impl Compressor for ZlibCompressor {
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder
            .write_all(data)
            .map_err(|e| CodecError::Compress(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::Compress(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CodecError::Decompress(e.to_string()))?;
        Ok(decompressed)
    }

    fn name(&self) -> &'static str {
        "zlib"
    }
}

/// LZ4 block compression with the uncompressed size prepended.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| CodecError::Decompress(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "lz4"
    }
}

/// Pass-through stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
