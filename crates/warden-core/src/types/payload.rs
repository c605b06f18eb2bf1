//! Invocation payload encodings
//!
//! Applications hand payloads over in several shapes. They are classified
//! once at the boundary and decoded to plain bytes before hashing.

use crate::canonical::{canonicalize, CanonicalValue};
use crate::domain::{domain_hash, DomainContext};
use crate::errors::{Result, WardenError};
use serde_json::Value;

/// Payload as received from an application
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadEncoding {
    /// Bytes as-is
    Raw(Vec<u8>),
    /// UTF-8 JSON text of an array of byte values, e.g. `[1,2,3]`
    SerializedArray(Vec<u8>),
    /// Structured JSON, hashed through its canonical encoding
    Structured(Value),
}

impl PayloadEncoding {
    /// Classify a JSON payload.
    ///
    /// Arrays of byte values and index-keyed objects (`{"0":1,"1":2}`, the
    /// shape a serialized typed array takes) are raw bytes. Strings holding
    /// a JSON array are serialized arrays. Everything else is structured.
    pub fn from_json(value: Value) -> Self {
        if let Some(bytes) = byte_array(&value) {
            return Self::Raw(bytes);
        }
        if let Some(bytes) = indexed_bytes(&value) {
            return Self::Raw(bytes);
        }
        if let Value::String(text) = &value {
            if text.trim_start().starts_with('[') {
                return Self::SerializedArray(text.clone().into_bytes());
            }
        }
        Self::Structured(value)
    }

    /// Decode to the bytes that get hashed
    pub fn decode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Raw(bytes) => Ok(bytes.clone()),
            Self::SerializedArray(text) => serde_json::from_slice::<Vec<u8>>(text).map_err(|e| {
                WardenError::validation(format!("serialized array payload is not a byte array: {e}"))
            }),
            Self::Structured(value) => Ok(canonicalize(&CanonicalValue::from(value))),
        }
    }

    /// Whether the payload is opaque bytes rather than readable structure
    pub fn is_opaque(&self) -> bool {
        !matches!(self, Self::Structured(_))
    }

    /// Domain-separated hash of the decoded bytes
    pub fn payload_hash(&self) -> Result<[u8; 32]> {
        let bytes = self.decode()?;
        Ok(*domain_hash(DomainContext::Payload, &bytes).for_context(DomainContext::Payload)?)
    }
}

fn byte_value(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}

fn byte_array(value: &Value) -> Option<Vec<u8>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items.iter().map(byte_value).collect()
}

fn indexed_bytes(value: &Value) -> Option<Vec<u8>> {
    let map = value.as_object()?;
    if map.is_empty() {
        return None;
    }
    let mut bytes = vec![0u8; map.len()];
    let mut seen = vec![false; map.len()];
    for (key, item) in map {
        let index: usize = key.parse().ok()?;
        if index >= bytes.len() || seen[index] {
            return None;
        }
        bytes[index] = byte_value(item)?;
        seen[index] = true;
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification() {
        assert_eq!(
            PayloadEncoding::from_json(json!([1, 2, 255])),
            PayloadEncoding::Raw(vec![1, 2, 255])
        );
        assert_eq!(
            PayloadEncoding::from_json(json!({ "1": 2, "0": 1 })),
            PayloadEncoding::Raw(vec![1, 2])
        );
        assert_eq!(
            PayloadEncoding::from_json(json!("[4,5]")),
            PayloadEncoding::SerializedArray(b"[4,5]".to_vec())
        );
        assert!(matches!(
            PayloadEncoding::from_json(json!([1, 256])),
            PayloadEncoding::Structured(_)
        ));
        assert!(matches!(
            PayloadEncoding::from_json(json!({ "0": 1, "2": 3 })),
            PayloadEncoding::Structured(_)
        ));
        assert!(matches!(
            PayloadEncoding::from_json(json!({ "to": "x" })),
            PayloadEncoding::Structured(_)
        ));
    }

    #[test]
    fn equivalent_shapes_hash_equally() {
        let raw = PayloadEncoding::from_json(json!([4, 5])).payload_hash().unwrap();
        let serialized = PayloadEncoding::from_json(json!("[4,5]")).payload_hash().unwrap();
        let indexed = PayloadEncoding::from_json(json!({ "0": 4, "1": 5 }))
            .payload_hash()
            .unwrap();
        assert_eq!(raw, serialized);
        assert_eq!(raw, indexed);
    }

    #[test]
    fn structured_payloads_ignore_key_order() {
        let a = PayloadEncoding::Structured(json!({ "a": 1, "b": [true] }));
        let b = PayloadEncoding::Structured(json!({ "b": [true], "a": 1 }));
        assert_eq!(a.payload_hash().unwrap(), b.payload_hash().unwrap());
    }

    #[test]
    fn bad_serialized_array() {
        let payload = PayloadEncoding::SerializedArray(b"[1, 999]".to_vec());
        assert!(matches!(
            payload.decode(),
            Err(WardenError::Validation { .. })
        ));
    }
}
