//! Value pipeline: a structural encoder followed by a byte compressor.
//!
//! The store never writes a caller value directly. Every value goes through
//! [ValueCodec::dumps] on the way in and [ValueCodec::loads] on the way out.

mod absence;
mod compressor;
mod finite;
mod value_codec;

pub use absence::is_absent;
pub use compressor::*;
pub use value_codec::*;

use crate::errors::{ErrorKind, KvsError};
use thiserror::Error;

/// Failure inside the value pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The structural encoder rejected the value
    #[error("Encoding failed: {0}")]
    Encode(String),
    /// The stored bytes are not a valid encoding of the requested type
    #[error("Decoding failed: {0}")]
    Decode(String),
    /// The compressor failed
    #[error("Compression failed: {0}")]
    Compress(String),
    /// The stored bytes are not valid compressed data
    #[error("Decompression failed: {0}")]
    Decompress(String),
    /// The pipeline produced no bytes, which would read back as absent
    #[error("Encoded value is empty and would read back as absent")]
    EmptyOutput,
}

impl From<CodecError> for KvsError {
    fn from(err: CodecError) -> Self {
        KvsError::new(&err.to_string(), ErrorKind::SerializationFailure)
    }
}

/// Result type for codec internals.
pub type CodecResult<T> = Result<T, CodecError>;
