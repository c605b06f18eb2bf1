//! Protocol data model

pub mod capability;
pub mod identifiers;
pub mod invocation;
pub mod payload;
pub mod permissions;
pub mod scope;

pub use capability::{Capability, CapabilityPayload, CapabilityState, VersionedCapability};
pub use identifiers::{CapabilityId, RequestNonce, SessionId};
pub use invocation::{InvocationBody, InvocationHeader, InvocationVersion, SignedInvocation};
pub use payload::PayloadEncoding;
pub use permissions::{GrantedCapabilities, WalletCapability};
pub use scope::{MethodPolicy, Scope};

/// Ed25519 public key bytes
pub type PublicKeyBytes = [u8; 32];

/// Ed25519 signature bytes
pub type SignatureBytes = [u8; 64];

/// Milliseconds since the Unix epoch
pub type TimestampMs = u64;
