//! Randomness effects

use async_trait::async_trait;

/// Source of random bytes
#[async_trait]
pub trait RandomEffects: Send + Sync {
    /// `len` random bytes
    async fn random_bytes(&self, len: usize) -> Vec<u8>;

    /// 32 random bytes
    async fn random_bytes_32(&self) -> [u8; 32];

    /// Random `u64`
    async fn random_u64(&self) -> u64;
}
