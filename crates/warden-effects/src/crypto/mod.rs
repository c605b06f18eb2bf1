//! Cryptographic handler
//!
//! Signature verification tries a primary verifier (native by default) and
//! falls back to the software verifier only when the primary reports itself
//! unavailable. An `Invalid` answer is final; it never triggers a retry on
//! the other path.

mod native;
mod software;

pub use native::{NativeVerifier, UnavailableVerifier};
pub use software::SoftwareVerifier;

use crate::random::OsRandomHandler;
use async_trait::async_trait;
use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use warden_core::config::SignatureBackend;
use warden_core::effects::{CryptoEffects, RandomEffects};
use warden_core::{Result, WardenError};

/// Result of one verifier attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Signature is valid
    Valid,
    /// Signature is invalid
    Invalid,
    /// Verifier could not run
    Unavailable(String),
}

/// A single Ed25519 verification primitive
pub trait Ed25519Verifier: Send + Sync + fmt::Debug {
    /// Name for diagnostics
    fn name(&self) -> &'static str;

    /// Verify `signature` over `message` for `public_key`
    fn verify(&self, signature: &[u8; 64], message: &[u8], public_key: &[u8; 32]) -> VerifyOutcome;
}

/// Production crypto handler
pub struct RealCryptoHandler {
    primary: Arc<dyn Ed25519Verifier>,
    fallback: Option<Arc<dyn Ed25519Verifier>>,
    random: Arc<dyn RandomEffects>,
}

impl RealCryptoHandler {
    /// Native verifier with software fallback and OS randomness
    pub fn new() -> Self {
        Self::for_backend(SignatureBackend::Auto)
    }

    /// Handler for a configured backend
    pub fn for_backend(backend: SignatureBackend) -> Self {
        let (primary, fallback): (Arc<dyn Ed25519Verifier>, Option<Arc<dyn Ed25519Verifier>>) =
            match backend {
                SignatureBackend::Auto => (Arc::new(NativeVerifier), Some(Arc::new(SoftwareVerifier))),
                SignatureBackend::Native => (Arc::new(NativeVerifier), None),
                SignatureBackend::Software => (Arc::new(SoftwareVerifier), None),
            };
        Self::with_verifiers(primary, fallback)
    }

    /// Handler with explicit verifiers, e.g. a platform primitive as primary
    pub fn with_verifiers(
        primary: Arc<dyn Ed25519Verifier>,
        fallback: Option<Arc<dyn Ed25519Verifier>>,
    ) -> Self {
        Self {
            primary,
            fallback,
            random: Arc::new(OsRandomHandler::new()),
        }
    }

    /// Replace the randomness source
    #[must_use]
    pub fn with_random(mut self, random: Arc<dyn RandomEffects>) -> Self {
        self.random = random;
        self
    }

    fn verify_bytes(&self, signature: &[u8; 64], message: &[u8], public_key: &[u8; 32]) -> bool {
        match self.primary.verify(signature, message, public_key) {
            VerifyOutcome::Valid => true,
            VerifyOutcome::Invalid => false,
            VerifyOutcome::Unavailable(reason) => {
                let Some(fallback) = &self.fallback else {
                    tracing::error!(
                        verifier = self.primary.name(),
                        %reason,
                        "ed25519 verifier unavailable and no fallback configured"
                    );
                    return false;
                };
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = fallback.name(),
                    %reason,
                    "falling back to secondary ed25519 verifier"
                );
                matches!(
                    fallback.verify(signature, message, public_key),
                    VerifyOutcome::Valid
                )
            }
        }
    }
}

impl Default for RealCryptoHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RealCryptoHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealCryptoHandler")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.as_ref().map(|v| v.name()))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RandomEffects for RealCryptoHandler {
    async fn random_bytes(&self, len: usize) -> Vec<u8> {
        self.random.random_bytes(len).await
    }

    async fn random_bytes_32(&self) -> [u8; 32] {
        self.random.random_bytes_32().await
    }

    async fn random_u64(&self) -> u64 {
        self.random.random_u64().await
    }
}

#[async_trait]
impl CryptoEffects for RealCryptoHandler {
    async fn ed25519_verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let Ok(signature) = <&[u8; 64]>::try_from(signature) else {
            tracing::debug!(len = signature.len(), "rejecting ed25519 signature of wrong length");
            return false;
        };
        let Ok(public_key) = <&[u8; 32]>::try_from(public_key) else {
            tracing::debug!(len = public_key.len(), "rejecting ed25519 key of wrong length");
            return false;
        };
        self.verify_bytes(signature, message, public_key)
    }

    async fn hkdf_derive(
        &self,
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        output_len: usize,
    ) -> Result<Vec<u8>> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut output = vec![0u8; output_len];
        hkdf.expand(info, &mut output)
            .map_err(|e| WardenError::crypto(format!("HKDF expansion failed: {e}")))?;
        Ok(output)
    }
}
