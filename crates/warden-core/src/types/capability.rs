//! Capabilities: signed, scoped, time-limited grants
//!
//! A [`Capability`] is a [`CapabilityPayload`] signed by the wallet key, plus
//! the mutable bookkeeping the wallet keeps about it (state, last consumed
//! nonce, last write time). Only the payload is signed. The id is derived from
//! the payload and signature, so it cannot be chosen by the holder.

use crate::canonical::{Canonical, CanonicalValue};
use crate::domain::{domain_hash, DomainContext, DomainDigest};
use crate::errors::{Result, WardenError};
use crate::types::{CapabilityId, PublicKeyBytes, Scope, SignatureBytes, TimestampMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Payload format version bound into every signature
pub const CAPABILITY_FORMAT_VERSION: u16 = 1;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapabilityState {
    /// Awaiting approval and signature
    Requested,
    /// Usable for invocations
    Active,
    /// Past `expires_at`
    Expired,
    /// Withdrawn; terminal
    Revoked,
    /// Temporarily disabled by the user
    Suspended,
}

impl CapabilityState {
    /// Whether no further transitions are possible out of this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }

    /// Whether `self -> next` is a legal lifecycle step
    pub fn can_transition_to(&self, next: CapabilityState) -> bool {
        use CapabilityState::*;
        matches!(
            (self, next),
            (Requested, Active)
                | (Active, Expired)
                | (Active, Suspended)
                | (Active, Revoked)
                | (Suspended, Active)
                | (Suspended, Expired)
                | (Suspended, Revoked)
        )
    }

    /// Check a transition, reporting the most specific error
    pub fn transition(
        self,
        next: CapabilityState,
        capability_id: &CapabilityId,
    ) -> Result<CapabilityState> {
        if self.can_transition_to(next) {
            return Ok(next);
        }
        Err(match self {
            Self::Revoked => WardenError::revoked(capability_id),
            Self::Expired => WardenError::expired(capability_id),
            _ => WardenError::capability(format!(
                "illegal transition {self} -> {next} for {capability_id}"
            )),
        })
    }
}

impl fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "REQUESTED",
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::Suspended => "SUSPENDED",
        };
        f.write_str(name)
    }
}

/// Signed fields of a capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityPayload {
    /// Application namespace
    pub circle: String,
    /// Callable methods
    pub methods: BTreeSet<String>,
    /// Highest permission level
    pub scope: Scope,
    /// Whether payloads must be opaque ciphertext
    pub encrypted: bool,
    /// Origin the capability is bound to
    pub app_origin: String,
    /// Execution branch
    pub branch_id: String,
    /// Execution epoch
    pub epoch: u64,
    /// Issue time (ms)
    pub issued_at: TimestampMs,
    /// Expiry time (ms), strictly after `issued_at`
    pub expires_at: TimestampMs,
    /// Nonce the first invocation builds on
    pub nonce_base: u64,
    /// Key that signs the capability and its invocations
    #[serde(with = "crate::serde_hex")]
    pub wallet_pub_key: PublicKeyBytes,
}

impl CapabilityPayload {
    /// Check the structural invariants of the payload
    pub fn validate(&self) -> Result<()> {
        if self.circle.is_empty() {
            return Err(WardenError::validation("circle must not be empty"));
        }
        if self.methods.is_empty() || self.methods.iter().any(String::is_empty) {
            return Err(WardenError::validation(
                "methods must be a non-empty set of non-empty names",
            ));
        }
        if self.app_origin.is_empty() {
            return Err(WardenError::validation("appOrigin must not be empty"));
        }
        if self.expires_at <= self.issued_at {
            return Err(WardenError::validation(format!(
                "expiresAt {} must be after issuedAt {}",
                self.expires_at, self.issued_at
            )));
        }
        Ok(())
    }

    /// Digest the wallet signs
    pub fn signing_digest(&self) -> DomainDigest {
        domain_hash(DomainContext::CapabilitySigning, &self.canonical_bytes())
    }

    /// Digest that names the capability once signed
    pub fn id_digest(&self, signature: &SignatureBytes) -> DomainDigest {
        let mut value = self.to_canonical();
        if let CanonicalValue::Object(fields) = &mut value {
            fields.insert("signature".into(), CanonicalValue::bytes(signature));
        }
        domain_hash(DomainContext::CapabilityId, &value.to_bytes())
    }

    /// Identifier for this payload under `signature`
    pub fn derive_id(&self, signature: &SignatureBytes) -> Result<CapabilityId> {
        CapabilityId::from_digest(&self.id_digest(signature))
    }

    /// Lifetime in milliseconds
    pub fn ttl_ms(&self) -> u64 {
        self.expires_at.saturating_sub(self.issued_at)
    }
}

impl Canonical for CapabilityPayload {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .with("version", CAPABILITY_FORMAT_VERSION)
            .with("circle", &self.circle)
            .with("methods", self.methods.iter().collect::<CanonicalValue>())
            .with("scope", self.scope.as_str())
            .with("encrypted", self.encrypted)
            .with("appOrigin", &self.app_origin)
            .with("branchId", &self.branch_id)
            .with("epoch", self.epoch)
            .with("issuedAt", self.issued_at)
            .with("expiresAt", self.expires_at)
            .with("nonceBase", self.nonce_base)
            .with("walletPubKey", CanonicalValue::bytes(self.wallet_pub_key))
    }
}

/// A signed capability plus wallet-side bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// Content-derived identifier
    pub id: CapabilityId,
    /// Signed fields
    #[serde(flatten)]
    pub payload: CapabilityPayload,
    /// Ed25519 signature over the payload's signing digest
    #[serde(with = "crate::serde_hex")]
    pub signature: SignatureBytes,
    /// Lifecycle state
    pub state: CapabilityState,
    /// Highest consumed nonce
    pub last_nonce: u64,
    /// Time of the last write (ms)
    pub last_updated: TimestampMs,
    /// Replacement issued by a renewal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<CapabilityId>,
}

impl Capability {
    /// Assemble a freshly signed, active capability
    pub fn issue(payload: CapabilityPayload, signature: SignatureBytes) -> Result<Self> {
        payload.validate()?;
        let id = payload.derive_id(&signature)?;
        Ok(Self {
            id,
            last_nonce: payload.nonce_base,
            last_updated: payload.issued_at,
            payload,
            signature,
            state: CapabilityState::Active,
            superseded_by: None,
        })
    }

    /// Whether `now` is at or past expiry
    pub fn is_expired_at(&self, now: TimestampMs) -> bool {
        now >= self.payload.expires_at
    }

    /// Whether the method set contains `method`
    pub fn allows_method(&self, method: &str) -> bool {
        self.payload.methods.contains(method)
    }

    /// Apply a lifecycle transition and stamp the write time
    pub fn transition(&mut self, next: CapabilityState, now: TimestampMs) -> Result<()> {
        self.state = self.state.transition(next, &self.id)?;
        self.last_updated = self.last_updated.max(now);
        Ok(())
    }

    /// Move an active or suspended capability to EXPIRED if its time has passed.
    /// Returns true when the state changed.
    pub fn refresh_expiry(&mut self, now: TimestampMs) -> bool {
        let live = matches!(
            self.state,
            CapabilityState::Active | CapabilityState::Suspended
        );
        if live && self.is_expired_at(now) {
            self.state = CapabilityState::Expired;
            self.last_updated = self.last_updated.max(now);
            return true;
        }
        false
    }

    /// Encode as the current versioned envelope
    pub fn to_versioned_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&VersionedCapability::V1(self.clone()))?)
    }

    /// Decode any supported envelope version
    pub fn from_versioned_json(bytes: &[u8]) -> Result<Self> {
        let versioned: VersionedCapability = serde_json::from_slice(bytes).map_err(|e| {
            WardenError::validation(format!("unsupported or malformed capability record: {e}"))
        })?;
        Ok(versioned.into_current())
    }
}

/// Versioned capability envelope; unknown versions fail to decode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionedCapability {
    /// Format version 1
    V1(Capability),
}

impl VersionedCapability {
    /// Upgrade to the current in-memory representation
    pub fn into_current(self) -> Capability {
        match self {
            Self::V1(capability) => capability,
        }
    }
}
