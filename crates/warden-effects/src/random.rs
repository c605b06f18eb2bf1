//! Random effect handlers

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use warden_core::effects::RandomEffects;

/// Operating-system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomHandler;

impl OsRandomHandler {
    /// Create a new OS random handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RandomEffects for OsRandomHandler {
    async fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }

    async fn random_bytes_32(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }

    async fn random_u64(&self) -> u64 {
        OsRng.next_u64()
    }
}

/// Deterministic ChaCha20 stream for tests and simulation
#[derive(Debug)]
pub struct SeededRandomHandler {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededRandomHandler {
    /// Stream determined entirely by `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl RandomEffects for SeededRandomHandler {
    async fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.lock().fill_bytes(&mut bytes);
        bytes
    }

    async fn random_bytes_32(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.rng.lock().fill_bytes(&mut bytes);
        bytes
    }

    async fn random_u64(&self) -> u64 {
        self.rng.lock().next_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_streams_repeat() {
        let a = SeededRandomHandler::new(42);
        let b = SeededRandomHandler::new(42);
        assert_eq!(a.random_bytes(16).await, b.random_bytes(16).await);
        assert_eq!(a.random_u64().await, b.random_u64().await);
        assert_ne!(
            SeededRandomHandler::new(1).random_bytes_32().await,
            SeededRandomHandler::new(2).random_bytes_32().await
        );
    }

    #[tokio::test]
    async fn os_random_lengths() {
        let handler = OsRandomHandler::new();
        assert_eq!(handler.random_bytes(7).await.len(), 7);
        assert_ne!(handler.random_bytes_32().await, [0u8; 32]);
    }
}
