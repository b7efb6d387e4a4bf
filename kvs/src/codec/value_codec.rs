use crate::codec::finite::find_non_finite;
use crate::codec::{is_absent, CodecError, Compressor, ZlibCompressor};
use crate::errors::KvsResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Structural encoding applied before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructuralFormat {
    /// JSON text via `serde_json`. Self-describing; the default.
    #[default]
    Json,
    /// Compact binary via `bincode`. Not self-describing, so values must be
    /// read back with the type they were written with.
    Bincode,
}

impl StructuralFormat {
    fn encode<V: Serialize + ?Sized>(&self, value: &V) -> Result<Vec<u8>, CodecError> {
        match self {
            StructuralFormat::Json => {
                if let Some(found) = find_non_finite(value) {
                    return Err(CodecError::Encode(format!(
                        "JSON cannot represent the float {}",
                        found
                    )));
                }
                serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
            }
            StructuralFormat::Bincode => {
                bincode::serde::encode_to_vec(value, bincode::config::legacy())
                    .map_err(|e| CodecError::Encode(e.to_string()))
            }
        }
    }

    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V, CodecError> {
        match self {
            StructuralFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
            }
            StructuralFormat::Bincode => {
                bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
                    .map(|(value, _)| value)
                    .map_err(|e| CodecError::Decode(e.to_string()))
            }
        }
    }
}

/// Serializes values to bytes and back.
///
/// A codec is a structural format followed by a compressor. The default is
/// JSON then zlib. Codecs are cheap to clone and are passed to the store at
/// construction; there is no process-wide instance.
///
/// # Usage
/// ```text
/// let codec = ValueCodec::default();
/// let bytes = codec.dumps(&vec![1, 2, 3])?;
/// let back: Vec<i32> = codec.loads(&bytes)?;
///
/// let fast = ValueCodec::new(StructuralFormat::Bincode, Lz4Compressor);
/// ```
#[derive(Clone)]
pub struct ValueCodec {
    format: StructuralFormat,
    compressor: Arc<dyn Compressor>,
}

impl ValueCodec {
    pub fn new<C: Compressor + 'static>(format: StructuralFormat, compressor: C) -> Self {
        ValueCodec {
            format,
            compressor: Arc::new(compressor),
        }
    }

    pub fn format(&self) -> StructuralFormat {
        self.format
    }

    pub fn compressor_name(&self) -> &'static str {
        self.compressor.name()
    }

    /// Encodes then compresses `value`.
    ///
    /// Never returns an empty byte string.
    pub fn dumps<V: Serialize + ?Sized>(&self, value: &V) -> KvsResult<Vec<u8>> {
        let encoded = self.format.encode(value).map_err(|e| {
            log::error!("Failed to encode value: {}", e);
            e
        })?;

        let compressed = self.compressor.compress(&encoded).map_err(|e| {
            log::error!("Failed to compress value with {}: {}", self.compressor.name(), e);
            e
        })?;

        if compressed.is_empty() {
            log::error!("Encoded value is empty");
            return Err(CodecError::EmptyOutput.into());
        }
        Ok(compressed)
    }

    /// Decompresses then decodes `bytes` into a `V`.
    pub fn loads<V: DeserializeOwned>(&self, bytes: &[u8]) -> KvsResult<V> {
        let decompressed = self.compressor.decompress(bytes).map_err(|e| {
            log::error!("Failed to decompress value with {}: {}", self.compressor.name(), e);
            e
        })?;

        let value = self.format.decode(&decompressed).map_err(|e| {
            log::error!("Failed to decode value: {}", e);
            e
        })?;
        Ok(value)
    }

    /// Returns `true` if `value` means "no value" and must not be stored.
    #[inline]
    pub fn is_absent<V: Serialize + ?Sized>(&self, value: &V) -> bool {
        is_absent(value)
    }
}

impl Default for ValueCodec {
    fn default() -> Self {
        ValueCodec::new(StructuralFormat::Json, ZlibCompressor::default())
    }
}

impl Debug for ValueCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCodec")
            .field("format", &self.format)
            .field("compressor", &self.compressor.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Lz4Compressor, NoCompression};
    use crate::errors::ErrorKind;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u32,
        tags: Vec<String>,
        scores: BTreeMap<String, f64>,
    }

    fn profile() -> Profile {
        let mut scores = BTreeMap::new();
        scores.insert("math".to_string(), 91.5);
        Profile {
            name: "Ada".to_string(),
            age: 36,
            tags: vec!["admin".to_string()],
            scores,
        }
    }

    #[test]
    fn test_default_is_json_zlib() {
        let codec = ValueCodec::default();
        assert_eq!(codec.format(), StructuralFormat::Json);
        assert_eq!(codec.compressor_name(), "zlib");
    }

    #[test]
    fn test_default_pipeline_is_json_then_zlib() {
        let codec = ValueCodec::default();
        let bytes = codec.dumps(&vec![1, 2, 3]).unwrap();
        let json = ZlibCompressor::default().decompress(&bytes).unwrap();
        assert_eq!(json, b"[1,2,3]");
    }

    #[test]
    fn test_struct_values_survive_each_pipeline() {
        let codecs = [
            ValueCodec::default(),
            ValueCodec::new(StructuralFormat::Json, Lz4Compressor),
            ValueCodec::new(StructuralFormat::Bincode, ZlibCompressor::new(9)),
            ValueCodec::new(StructuralFormat::Bincode, NoCompression),
        ];

        for codec in codecs {
            let bytes = codec.dumps(&profile()).unwrap();
            let back: Profile = codec.loads(&bytes).unwrap();
            assert_eq!(back, profile(), "{:?}", codec);
        }
    }

    #[test]
    fn test_json_values_are_self_describing() {
        let codec = ValueCodec::default();
        let bytes = codec.dumps(&profile()).unwrap();
        let value: serde_json::Value = codec.loads(&bytes).unwrap();
        assert_eq!(value["name"], "Ada");
        assert_eq!(value["age"], 36);
    }

    #[test]
    fn test_unsized_values() {
        let codec = ValueCodec::default();
        let bytes = codec.dumps("two").unwrap();
        assert_eq!(codec.loads::<String>(&bytes).unwrap(), "two");

        let bytes = codec.dumps(&[1u8, 2][..]).unwrap();
        assert_eq!(codec.loads::<Vec<u8>>(&bytes).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_type_mismatch_is_serialization_failure() {
        let codec = ValueCodec::default();
        let bytes = codec.dumps("text").unwrap();
        let err = codec.loads::<i64>(&bytes).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::SerializationFailure);
    }

    #[test]
    fn test_corrupt_bytes_are_serialization_failure() {
        let err = ValueCodec::default().loads::<i64>(b"\x00garbage").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::SerializationFailure);
    }

    #[test]
    fn test_empty_encoding_is_rejected() {
        #[derive(Serialize)]
        struct Nothing {}

        let codec = ValueCodec::new(StructuralFormat::Bincode, NoCompression);
        let err = codec.dumps(&Nothing {}).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::SerializationFailure);
    }

    #[test]
    fn test_json_rejects_non_finite_floats() {
        let codec = ValueCodec::default();
        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let err = codec.dumps(&value).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::SerializationFailure);
        }

        let err = codec.dumps(&Some(f64::NAN)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::SerializationFailure);

        let mut bad = profile();
        bad.scores.insert("physics".to_string(), f64::INFINITY);
        let err = codec.dumps(&bad).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::SerializationFailure);
    }

    #[test]
    fn test_bincode_keeps_non_finite_floats() {
        let codec = ValueCodec::new(StructuralFormat::Bincode, NoCompression);
        let bytes = codec.dumps(&f64::INFINITY).unwrap();
        assert_eq!(codec.loads::<f64>(&bytes).unwrap(), f64::INFINITY);

        let bytes = codec.dumps(&Some(f64::NAN)).unwrap();
        assert!(codec.loads::<Option<f64>>(&bytes).unwrap().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_is_absent_delegates() {
        let codec = ValueCodec::default();
        assert!(codec.is_absent(&None::<u8>));
        assert!(!codec.is_absent(&Some(0u8)));
    }
}
