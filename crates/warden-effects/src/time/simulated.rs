//! Simulated clock for tests and simulation

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use warden_core::effects::PhysicalTimeEffects;

/// Manually driven clock; `sleep_ms` advances it instead of waiting
#[derive(Debug, Clone, Default)]
pub struct SimulatedTimeHandler {
    current_time: Arc<AtomicU64>,
}

impl SimulatedTimeHandler {
    /// Clock starting at `start_time_ms`
    pub fn new(start_time_ms: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(start_time_ms)),
        }
    }

    /// Advance the clock
    pub fn advance_time(&self, duration_ms: u64) {
        self.current_time.fetch_add(duration_ms, Ordering::SeqCst);
    }

    /// Set the absolute time
    pub fn set_time(&self, time_ms: u64) {
        self.current_time.store(time_ms, Ordering::SeqCst);
    }

    /// Current time without going through the effect trait
    pub fn get_time(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhysicalTimeEffects for SimulatedTimeHandler {
    async fn now_ms(&self) -> u64 {
        self.get_time()
    }

    async fn sleep_ms(&self, ms: u64) {
        self.advance_time(ms);
        tokio::task::yield_now().await;
    }
}
