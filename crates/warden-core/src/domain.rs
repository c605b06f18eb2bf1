//! Domain separation for hashed and signed data
//!
//! Every digest in the protocol is computed over `prefix || canonical_bytes`,
//! where the prefix names the purpose of the digest. A signature produced for
//! a capability can therefore never verify as an invocation signature, and a
//! capability id can never collide with a signing digest.
//!
//! Prefixes are NUL-terminated so no prefix is a prefix of another.

use crate::errors::{Result, WardenError};
use crate::hash::hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix for capability signatures
pub const CAPABILITY_SIGNING_CONTEXT: &[u8] = b"warden:capability:v1\0";

/// Prefix for capability identifiers
pub const CAPABILITY_ID_CONTEXT: &[u8] = b"warden:capability-id:v1\0";

/// Prefix for invocation signatures
pub const INVOCATION_SIGNING_CONTEXT: &[u8] = b"warden:invocation:v1\0";

/// HKDF salt for session keys
pub const SESSION_KEY_CONTEXT: &[u8] = b"warden:session-key:v1\0";

/// Prefix for origin bindings carried in invocation headers
pub const ORIGIN_BINDING_CONTEXT: &[u8] = b"warden:origin:v1\0";

/// Prefix for invocation payload hashes
pub const PAYLOAD_CONTEXT: &[u8] = b"warden:payload:v1\0";

/// Purpose of a digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainContext {
    /// Digest signed when issuing a capability
    CapabilitySigning,
    /// Digest that becomes a capability id
    CapabilityId,
    /// Digest signed for an invocation
    InvocationSigning,
    /// Salt for session key derivation
    SessionKey,
    /// Hash of the calling origin
    OriginBinding,
    /// Hash of invocation payload bytes
    Payload,
}

impl DomainContext {
    /// Every context, in declaration order
    pub const ALL: [DomainContext; 6] = [
        Self::CapabilitySigning,
        Self::CapabilityId,
        Self::InvocationSigning,
        Self::SessionKey,
        Self::OriginBinding,
        Self::Payload,
    ];

    /// Byte prefix for this context
    pub const fn prefix(&self) -> &'static [u8] {
        match self {
            Self::CapabilitySigning => CAPABILITY_SIGNING_CONTEXT,
            Self::CapabilityId => CAPABILITY_ID_CONTEXT,
            Self::InvocationSigning => INVOCATION_SIGNING_CONTEXT,
            Self::SessionKey => SESSION_KEY_CONTEXT,
            Self::OriginBinding => ORIGIN_BINDING_CONTEXT,
            Self::Payload => PAYLOAD_CONTEXT,
        }
    }

    /// Short name for diagnostics
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CapabilitySigning => "capability-signing",
            Self::CapabilityId => "capability-id",
            Self::InvocationSigning => "invocation-signing",
            Self::SessionKey => "session-key",
            Self::OriginBinding => "origin-binding",
            Self::Payload => "payload",
        }
    }
}

impl fmt::Display for DomainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Prepend the context prefix to canonical bytes
pub fn with_domain(context: DomainContext, canonical_bytes: &[u8]) -> Vec<u8> {
    let prefix = context.prefix();
    let mut out = Vec::with_capacity(prefix.len() + canonical_bytes.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(canonical_bytes);
    out
}

/// SHA-256 of `with_domain(context, canonical_bytes)`, tagged with its context
pub fn domain_hash(context: DomainContext, canonical_bytes: &[u8]) -> DomainDigest {
    DomainDigest {
        context,
        digest: hash(&with_domain(context, canonical_bytes)),
    }
}

/// Hash bound into invocation headers for a calling origin
pub fn origin_hash(origin: &str) -> [u8; 32] {
    domain_hash(DomainContext::OriginBinding, origin.as_bytes()).digest
}

/// Digest that remembers which domain produced it
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainDigest {
    context: DomainContext,
    digest: [u8; 32],
}

impl DomainDigest {
    /// Domain this digest was produced under
    pub fn context(&self) -> DomainContext {
        self.context
    }

    /// Digest bytes, only if produced under `expected`
    pub fn for_context(&self, expected: DomainContext) -> Result<&[u8; 32]> {
        if self.context != expected {
            return Err(WardenError::DomainSeparation {
                expected: expected.label().to_string(),
                actual: self.context.label().to_string(),
            });
        }
        Ok(&self.digest)
    }

    /// Lowercase hex of the digest
    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

impl fmt::Debug for DomainDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainDigest({}:{})", self.context, self.to_hex())
    }
}
