//! Signed invocations
//!
//! - [`InvocationSigner`]: wallet side, reserves a nonce and signs a call
//! - [`InvocationValidator`]: the ordered checks a call must pass
//! - [`InvocationGate`]: store-backed validation under the capability lock

pub mod gate;
pub mod signer;
pub mod validator;

pub use gate::InvocationGate;
pub use signer::InvocationSigner;
pub use validator::InvocationValidator;

use serde::{Deserialize, Serialize};
use warden_core::types::{CapabilityId, TimestampMs};

/// Proof that an invocation passed validation and consumed its nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorized {
    /// Capability the call ran under
    pub capability_id: CapabilityId,
    /// Method called
    pub method: String,
    /// Nonce consumed
    pub nonce: u64,
    /// Validation time (ms)
    pub authorized_at: TimestampMs,
}
