//! Signed invocations against a capability

use crate::canonical::{Canonical, CanonicalValue};
use crate::domain::{domain_hash, DomainContext, DomainDigest};
use crate::errors::{Result, WardenError};
use crate::types::{CapabilityId, SignatureBytes, TimestampMs};
use serde::{Deserialize, Serialize};

/// Invocation format versions this build understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationVersion {
    /// Format version 1
    V1,
}

impl InvocationVersion {
    /// Version written by this build
    pub const CURRENT: InvocationVersion = InvocationVersion::V1;

    /// Wire number
    pub const fn as_u16(&self) -> u16 {
        match self {
            Self::V1 => 1,
        }
    }
}

impl TryFrom<u16> for InvocationVersion {
    type Error = WardenError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            1 => Ok(Self::V1),
            other => Err(WardenError::validation(format!(
                "unsupported invocation version {other}"
            ))),
        }
    }
}

/// Execution coordinates and replay protection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationHeader {
    /// Format version
    pub version: u16,
    /// Circle the call targets
    pub circle_id: String,
    /// Execution branch
    pub branch_id: String,
    /// Execution epoch
    pub epoch: u64,
    /// Must equal the capability's last nonce plus one
    pub nonce: u64,
    /// Creation time (ms)
    pub timestamp: TimestampMs,
    /// Hash of the calling origin
    #[serde(with = "crate::serde_hex")]
    pub origin_hash: [u8; 32],
}

impl Canonical for InvocationHeader {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .with("version", self.version)
            .with("circleId", &self.circle_id)
            .with("branchId", &self.branch_id)
            .with("epoch", self.epoch)
            .with("nonce", self.nonce)
            .with("timestamp", self.timestamp)
            .with("originHash", CanonicalValue::bytes(self.origin_hash))
    }
}

/// What is being called
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationBody {
    /// Capability authorizing the call
    pub capability_id: CapabilityId,
    /// Method name
    pub method: String,
    /// Hash of the decoded payload bytes
    #[serde(with = "crate::serde_hex")]
    pub payload_hash: [u8; 32],
}

impl Canonical for InvocationBody {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .with("capabilityId", self.capability_id.as_str())
            .with("method", &self.method)
            .with("payloadHash", CanonicalValue::bytes(self.payload_hash))
    }
}

/// Header and body with an optional wallet signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedInvocation {
    /// Header
    pub header: InvocationHeader,
    /// Body
    pub body: InvocationBody,
    /// Signature over [`SignedInvocation::signing_digest`]
    #[serde(
        default,
        with = "crate::serde_hex::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub signature: Option<SignatureBytes>,
}

impl SignedInvocation {
    /// Unsigned invocation
    pub fn new(header: InvocationHeader, body: InvocationBody) -> Self {
        Self {
            header,
            body,
            signature: None,
        }
    }

    /// Parsed format version; unknown versions are an error
    pub fn version(&self) -> Result<InvocationVersion> {
        InvocationVersion::try_from(self.header.version)
    }

    /// Digest the wallet signs
    pub fn signing_digest(&self) -> DomainDigest {
        domain_hash(DomainContext::InvocationSigning, &self.canonical_bytes())
    }
}

impl Canonical for SignedInvocation {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .with("header", self.header.to_canonical())
            .with("body", self.body.to_canonical())
    }
}
