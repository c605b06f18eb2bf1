//! Wallet key access
//!
//! The wallet key never leaves its signer. Callers get a public key, a
//! signature over a domain-separated digest, or a one-way secret for session
//! key derivation.

use crate::domain::DomainDigest;
use crate::errors::Result;
use crate::types::{PublicKeyBytes, SignatureBytes};
use async_trait::async_trait;
use zeroize::Zeroizing;

/// Holder of the wallet signing key
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Wallet public key
    fn public_key(&self) -> PublicKeyBytes;

    /// Sign a domain-separated digest
    async fn sign_digest(&self, digest: &DomainDigest) -> Result<SignatureBytes>;

    /// Secret for session key derivation, derived one-way from the key
    fn session_secret(&self) -> Zeroizing<[u8; 32]>;
}
