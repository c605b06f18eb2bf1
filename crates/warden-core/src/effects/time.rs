//! Wall-clock effects

use async_trait::async_trait;

/// Physical clock
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Milliseconds since the Unix epoch
    async fn now_ms(&self) -> u64;

    /// Suspend for `ms` milliseconds
    async fn sleep_ms(&self, ms: u64);
}
