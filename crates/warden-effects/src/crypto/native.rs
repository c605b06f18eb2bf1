//! Ed25519 verification through `ed25519-dalek`

use super::{Ed25519Verifier, VerifyOutcome};
use ed25519_dalek::{Signature, VerifyingKey};

/// Optimized verifier using `verify_strict`
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeVerifier;

impl Ed25519Verifier for NativeVerifier {
    fn name(&self) -> &'static str {
        "native"
    }

    fn verify(&self, signature: &[u8; 64], message: &[u8], public_key: &[u8; 32]) -> VerifyOutcome {
        let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
            return VerifyOutcome::Invalid;
        };
        let signature = Signature::from_bytes(signature);
        match verifying_key.verify_strict(message, &signature) {
            Ok(()) => VerifyOutcome::Valid,
            Err(_) => VerifyOutcome::Invalid,
        }
    }
}

/// Stand-in for a platform primitive that is not present
#[derive(Debug, Clone)]
pub struct UnavailableVerifier {
    reason: String,
}

impl UnavailableVerifier {
    /// Verifier that always reports `reason` as unavailable
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Ed25519Verifier for UnavailableVerifier {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn verify(&self, _signature: &[u8; 64], _message: &[u8], _public_key: &[u8; 32]) -> VerifyOutcome {
        VerifyOutcome::Unavailable(self.reason.clone())
    }
}
