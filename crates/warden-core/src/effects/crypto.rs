//! Cryptographic effects
//!
//! Hashing is NOT an effect (see [`crate::hash`]). Signature verification,
//! key derivation and randomness are, because their handlers may reach
//! platform primitives.

use crate::canonical::{Canonical, CanonicalValue};
use crate::domain::{DomainContext, DomainDigest};
use crate::effects::RandomEffects;
use crate::errors::{Result, WardenError};
use crate::hash::hash;
use crate::types::RequestNonce;
use async_trait::async_trait;
use std::fmt;
use zeroize::Zeroizing;

/// Bytes of randomness in a request nonce
pub const REQUEST_NONCE_BYTES: usize = 16;

/// Inputs bound into a session key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Circle the session belongs to
    pub circle_id: String,
    /// Origin holding the session
    pub origin: String,
    /// Epoch at session start
    pub epoch: u64,
}

impl Canonical for SessionContext {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .with("circleId", &self.circle_id)
            .with("origin", &self.origin)
            .with("epoch", self.epoch)
    }
}

/// Symmetric session key, zeroized on drop
#[derive(Clone)]
pub struct SessionKey(Zeroizing<[u8; 32]>);

impl SessionKey {
    /// Wrap derived key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Non-secret identifier for logs and comparisons
    pub fn fingerprint(&self) -> String {
        hex::encode(&hash(&self.0[..])[..8])
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        crate::hash::digests_equal(&self.0, &other.0)
    }
}

impl Eq for SessionKey {}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", self.fingerprint())
    }
}

/// Signature verification, key derivation and nonce generation
#[async_trait]
pub trait CryptoEffects: RandomEffects + Send + Sync {
    /// Verify an Ed25519 signature. Malformed input and primitive failures
    /// return `false`; this never accepts on error.
    async fn ed25519_verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;

    /// HKDF-SHA256 extract-and-expand
    async fn hkdf_derive(
        &self,
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        output_len: usize,
    ) -> Result<Vec<u8>>;

    /// Verify a signature over a digest that must come from `context`
    async fn verify_digest(
        &self,
        digest: &DomainDigest,
        context: DomainContext,
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool> {
        let message = digest.for_context(context)?;
        Ok(self.ed25519_verify(message, signature, public_key).await)
    }

    /// Derive a per-session key from wallet secret material
    async fn derive_session_key(
        &self,
        secret: &[u8],
        context: &SessionContext,
    ) -> Result<SessionKey> {
        let output = self
            .hkdf_derive(
                secret,
                DomainContext::SessionKey.prefix(),
                &context.canonical_bytes(),
                32,
            )
            .await?;
        let bytes: [u8; 32] = output
            .as_slice()
            .try_into()
            .map_err(|_| WardenError::crypto("HKDF returned a short session key"))?;
        Ok(SessionKey::from_bytes(bytes))
    }

    /// Fresh random correlation id
    async fn generate_nonce(&self) -> RequestNonce {
        RequestNonce::from_bytes(&self.random_bytes(REQUEST_NONCE_BYTES).await)
    }
}
