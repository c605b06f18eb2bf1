//! Key/value persistence effects

use crate::errors::Result;
use async_trait::async_trait;

/// Durable key/value store
#[async_trait]
pub trait StorageEffects: Send + Sync {
    /// Write `value` under `key`, replacing any previous value
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Read the value under `key`
    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete `key`; returns whether it existed
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Keys starting with `prefix`, sorted
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}
