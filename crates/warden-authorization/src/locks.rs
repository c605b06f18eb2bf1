//! Keyed async critical sections
//!
//! One FIFO-fair `tokio::sync::Mutex` per key. Waiters on the same key are
//! woken in the order they arrived; different keys never contend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-key async mutexes
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop entries nobody is holding or waiting on
    pub fn prune(&self) {
        self.locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Whether no keys are tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
