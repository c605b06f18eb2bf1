//! System clock

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use warden_core::effects::PhysicalTimeEffects;

/// Wall clock backed by `SystemTime` and tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    async fn now_ms(&self) -> u64 {
        // A clock before 1970 reads as zero, which expires everything.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
