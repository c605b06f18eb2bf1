//! Identifier newtypes

use crate::domain::DomainDigest;
use crate::errors::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Content-derived capability identifier (lowercase hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityId(String);

impl CapabilityId {
    /// Identifier for a capability-id digest
    pub fn from_digest(digest: &DomainDigest) -> Result<Self> {
        let bytes = digest.for_context(crate::DomainContext::CapabilityId)?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Hex form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CapabilityId {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == 64
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(WardenError::validation(format!(
                "malformed capability id: {s:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for CapabilityId {
    type Error = WardenError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CapabilityId> for String {
    fn from(id: CapabilityId) -> Self {
        id.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wallet session handed to a connected application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Session id from 16 random bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Random correlation id for a pending request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestNonce(String);

impl RequestNonce {
    /// Hex-encode random bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Hex form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
