//! Resource values and how integers become bytes.

use bytes::Bytes;
use serde::Deserialize;

/// A new value for a resource.
///
/// Integers are serialized with the store's [`IntegerEncoding`]; anything else is an opaque
/// byte buffer copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceValue {
    Integer(u32),
    Bytes(Bytes),
}

impl ResourceValue {
    pub fn encode(self, encoding: IntegerEncoding) -> Bytes {
        match self {
            ResourceValue::Integer(value) => encoding.encode(value),
            ResourceValue::Bytes(bytes) => bytes,
        }
    }
}

impl Default for ResourceValue {
    /// A single zero byte, the value of a resource created without one.
    fn default() -> Self {
        ResourceValue::Integer(0)
    }
}

impl From<u32> for ResourceValue {
    fn from(value: u32) -> Self {
        ResourceValue::Integer(value)
    }
}

impl From<i32> for ResourceValue {
    /// Negative values keep their two's-complement bit pattern.
    fn from(value: i32) -> Self {
        ResourceValue::Integer(value.cast_unsigned())
    }
}

impl From<Bytes> for ResourceValue {
    fn from(bytes: Bytes) -> Self {
        ResourceValue::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ResourceValue {
    fn from(bytes: Vec<u8>) -> Self {
        ResourceValue::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for ResourceValue {
    fn from(bytes: &[u8]) -> Self {
        ResourceValue::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<&str> for ResourceValue {
    fn from(text: &str) -> Self {
        ResourceValue::Bytes(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<String> for ResourceValue {
    fn from(text: String) -> Self {
        ResourceValue::Bytes(Bytes::from(text))
    }
}

/// Width selection for integer values. Bytes are little-endian in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerEncoding {
    /// `v <= 0xFF` is 1 byte, anything larger is 2 bytes. Values above `0xFFFF` keep only
    /// their low 16 bits, which is what deployed clients expect.
    #[default]
    Legacy,
    /// 1, 2 or 4 bytes, the narrowest width that holds the value.
    Widened,
}

impl IntegerEncoding {
    pub fn encode(self, value: u32) -> Bytes {
        let width = match self {
            IntegerEncoding::Legacy if value > 0xFF => 2,
            IntegerEncoding::Legacy => 1,
            IntegerEncoding::Widened if value > 0xFFFF => 4,
            IntegerEncoding::Widened if value > 0xFF => 2,
            IntegerEncoding::Widened => 1,
        };
        Bytes::copy_from_slice(&value.to_le_bytes()[..width])
    }
}
