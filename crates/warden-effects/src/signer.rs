//! In-process wallet signer
//!
//! Holds the Ed25519 signing key in memory. The key is zeroized on drop and
//! never printed; only domain-separated capability and invocation digests can
//! be signed with it.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::fmt;
use warden_core::domain::{with_domain, DomainContext, DomainDigest};
use warden_core::effects::WalletSigner;
use warden_core::hash::hash;
use warden_core::types::{PublicKeyBytes, SignatureBytes};
use warden_core::{Result, WardenError};
use zeroize::Zeroizing;

/// Contexts the wallet key may sign
const SIGNABLE: [DomainContext; 2] = [
    DomainContext::CapabilitySigning,
    DomainContext::InvocationSigning,
];

/// Wallet key held in process memory
pub struct LocalWalletSigner {
    signing_key: SigningKey,
}

impl LocalWalletSigner {
    /// Signer for an existing 32-byte secret
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Signer for a fresh random key
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }
}

impl fmt::Debug for LocalWalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWalletSigner")
            .field("public_key", &hex::encode(self.public_key()))
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl WalletSigner for LocalWalletSigner {
    fn public_key(&self) -> PublicKeyBytes {
        self.signing_key.verifying_key().to_bytes()
    }

    async fn sign_digest(&self, digest: &DomainDigest) -> Result<SignatureBytes> {
        let context = digest.context();
        if !SIGNABLE.contains(&context) {
            return Err(WardenError::DomainSeparation {
                expected: "capability-signing|invocation-signing".to_string(),
                actual: context.label().to_string(),
            });
        }
        let message = digest.for_context(context)?;
        Ok(self.signing_key.sign(message).to_bytes())
    }

    fn session_secret(&self) -> Zeroizing<[u8; 32]> {
        let secret = Zeroizing::new(self.signing_key.to_bytes());
        let input = Zeroizing::new(with_domain(DomainContext::SessionKey, secret.as_slice()));
        Zeroizing::new(hash(&input))
    }
}
