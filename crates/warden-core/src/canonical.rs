//! Deterministic canonical encoding
//!
//! Every hash and signature in the protocol is computed over the canonical
//! bytes of a [`CanonicalValue`]. The encoding is JSON-shaped but stricter:
//!
//! - object keys are sorted by their raw UTF-8 bytes
//! - arrays keep their order
//! - integers are plain decimal; integral floats collapse to integers
//! - non-integral floats use the shortest round-trip decimal form
//! - strings use minimal JSON escaping, non-ASCII is emitted raw
//! - byte strings are the bare token `0x` + lowercase hex
//! - no whitespace anywhere
//!
//! Two values encode to the same bytes exactly when they are the same value.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Prefix marking a byte string in canonical output
pub const BYTES_PREFIX: &str = "0x";

/// Largest magnitude an integral float may have and still collapse to an integer
const MAX_INTEGRAL_FLOAT: f64 = 1.7e38;

/// Failure to build a canonical value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalError {
    /// NaN and infinities have no canonical form
    #[error("non-finite number cannot be canonicalized")]
    NonFinite,
}

impl From<CanonicalError> for crate::WardenError {
    fn from(err: CanonicalError) -> Self {
        crate::WardenError::serialization(err.to_string())
    }
}

/// Numeric value in normalized form
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanonicalNumber {
    /// Any integer, including integral floats within range
    Int(i128),
    /// Finite float with a fractional part (or too large for `Int`)
    Float(f64),
}

impl CanonicalNumber {
    /// Normalize a float. Fails on NaN and infinities.
    pub fn from_f64(value: f64) -> Result<Self, CanonicalError> {
        if !value.is_finite() {
            return Err(CanonicalError::NonFinite);
        }
        if value.fract() == 0.0 && value.abs() < MAX_INTEGRAL_FLOAT {
            // Exact: the value is integral and within i128 range.
            return Ok(Self::Int(value as i128));
        }
        Ok(Self::Float(value))
    }
}

/// Value tree that has exactly one byte encoding
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Normalized number
    Number(CanonicalNumber),
    /// UTF-8 string
    String(String),
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// Ordered sequence
    Array(Vec<CanonicalValue>),
    /// Key-sorted map
    Object(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    /// Byte string value
    pub fn bytes(data: impl AsRef<[u8]>) -> Self {
        Self::Bytes(data.as_ref().to_vec())
    }

    /// Float value, rejecting NaN and infinities
    pub fn float(value: f64) -> Result<Self, CanonicalError> {
        CanonicalNumber::from_f64(value).map(Self::Number)
    }

    /// Start an empty object
    pub fn object() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// Builder-style insert; no-op on non-object values
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<CanonicalValue>) -> Self {
        if let Self::Object(fields) = &mut self {
            fields.insert(key.to_string(), value.into());
        }
        self
    }

    /// Encode to canonical bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        self.write_to(&mut out);
        out.into_bytes()
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(true) => out.push_str("true"),
            Self::Bool(false) => out.push_str("false"),
            Self::Number(CanonicalNumber::Int(n)) => {
                let _ = write!(out, "{n}");
            }
            Self::Number(CanonicalNumber::Float(f)) => {
                let _ = write!(out, "{f}");
            }
            Self::String(s) => write_string(s, out),
            Self::Bytes(b) => {
                out.push_str(BYTES_PREFIX);
                out.push_str(&hex::encode(b));
            }
            Self::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_to(out);
                }
                out.push(']');
            }
            Self::Object(fields) => {
                out.push('{');
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_string(key, out);
                    out.push(':');
                    value.write_to(out);
                }
                out.push('}');
            }
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Canonically encode a value
pub fn canonicalize(value: &CanonicalValue) -> Vec<u8> {
    value.to_bytes()
}

/// Types with a canonical representation
pub trait Canonical {
    /// Build the canonical value tree
    fn to_canonical(&self) -> CanonicalValue;

    /// Canonical bytes of [`Canonical::to_canonical`]
    fn canonical_bytes(&self) -> Vec<u8> {
        canonicalize(&self.to_canonical())
    }
}

impl From<bool> for CanonicalValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for CanonicalValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for CanonicalValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CanonicalValue {
                fn from(value: $ty) -> Self {
                    Self::Number(CanonicalNumber::Int(i128::from(value)))
                }
            }
        )*
    };
}

from_integer!(u8, u16, u32, u64, i8, i16, i32, i64);

impl<T: Into<CanonicalValue>> From<Option<T>> for CanonicalValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<CanonicalValue>> FromIterator<T> for CanonicalValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::Array(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for CanonicalValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::from(i)
                } else if let Some(u) = n.as_u64() {
                    Self::from(u)
                } else {
                    // serde_json numbers are always finite
                    n.as_f64()
                        .and_then(|f| CanonicalNumber::from_f64(f).ok())
                        .map_or(Self::Null, Self::Number)
                }
            }
            Value::String(s) => Self::String(s),
            Value::Array(items) => items.into_iter().map(Self::from).collect(),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for CanonicalValue {
    fn from(value: &Value) -> Self {
        Self::from(value.clone())
    }
}
