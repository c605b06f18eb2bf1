//! Per-capability nonce issuance
//!
//! Each capability has a slot holding the highest nonce handed out
//! (`reserved`) and the highest nonce known to be accepted (`consumed`).
//! Reservations are strictly increasing. A failed invocation may roll its
//! reservation back, but never below `consumed` and only while no later
//! nonce has been handed out.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use warden_core::types::{Capability, CapabilityId};
use warden_core::{Result, WardenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NonceSlot {
    reserved: u64,
    consumed: u64,
}

/// Issues monotonically increasing nonces per capability
#[derive(Debug, Default)]
pub struct NonceManager {
    slots: Mutex<HashMap<CapabilityId, Arc<AsyncMutex<NonceSlot>>>>,
}

impl NonceManager {
    /// Empty manager
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &CapabilityId) -> Option<Arc<AsyncMutex<NonceSlot>>> {
        self.slots.lock().get(id).cloned()
    }

    fn slot_or_insert(&self, id: &CapabilityId, last_nonce: u64) -> Arc<AsyncMutex<NonceSlot>> {
        self.slots
            .lock()
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(AsyncMutex::new(NonceSlot {
                    reserved: last_nonce,
                    consumed: last_nonce,
                }))
            })
            .clone()
    }

    /// Start tracking a capability from its persisted `last_nonce`.
    /// Re-registering only ever moves the slot forward.
    pub async fn register(&self, capability: &Capability) {
        let slot = self.slot_or_insert(&capability.id, capability.last_nonce);
        let mut slot = slot.lock().await;
        slot.consumed = slot.consumed.max(capability.last_nonce);
        slot.reserved = slot.reserved.max(slot.consumed);
    }

    /// Reserve the next nonce
    pub async fn next_nonce(&self, id: &CapabilityId) -> Result<u64> {
        let slot = self
            .slot(id)
            .ok_or_else(|| WardenError::capability(format!("no nonce state for {id}")))?;
        let mut slot = slot.lock().await;
        let next = slot.reserved.checked_add(1).ok_or(WardenError::NonceViolation {
            expected: slot.reserved,
            actual: slot.reserved,
        })?;
        slot.reserved = next;
        tracing::trace!(capability = %id, nonce = next, "nonce reserved");
        Ok(next)
    }

    /// Roll the reservation back to `to_value`
    pub async fn reset_nonce(&self, id: &CapabilityId, to_value: u64) -> Result<()> {
        let slot = self
            .slot(id)
            .ok_or_else(|| WardenError::capability(format!("no nonce state for {id}")))?;
        let mut slot = slot.lock().await;
        if to_value < slot.consumed {
            return Err(WardenError::NonceViolation {
                expected: slot.consumed,
                actual: to_value,
            });
        }
        if to_value > slot.reserved {
            return Err(WardenError::validation(format!(
                "cannot reset nonce forward from {} to {to_value}",
                slot.reserved
            )));
        }
        slot.reserved = to_value;
        tracing::debug!(capability = %id, nonce = to_value, "nonce reservation rolled back");
        Ok(())
    }

    /// Give back `nonce` if it is still the latest reservation.
    ///
    /// Returns false, leaving the slot untouched, when a later nonce is
    /// already out or `nonce` was consumed.
    pub async fn release(&self, id: &CapabilityId, nonce: u64) -> bool {
        let Some(slot) = self.slot(id) else {
            return false;
        };
        let mut slot = slot.lock().await;
        if slot.reserved != nonce || nonce <= slot.consumed {
            return false;
        }
        slot.reserved = nonce - 1;
        tracing::debug!(capability = %id, nonce, "nonce reservation released");
        true
    }

    /// Stop tracking a capability that can no longer be invoked
    pub fn forget(&self, id: &CapabilityId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Number of tracked capabilities
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no capability is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record that `nonce` was accepted downstream
    pub async fn mark_consumed(&self, id: &CapabilityId, nonce: u64) {
        let slot = self.slot_or_insert(id, nonce);
        let mut slot = slot.lock().await;
        slot.consumed = slot.consumed.max(nonce);
        slot.reserved = slot.reserved.max(nonce);
    }

    /// Highest accepted nonce, if tracked
    pub async fn last_consumed(&self, id: &CapabilityId) -> Option<u64> {
        let slot = self.slot(id)?;
        let consumed = slot.lock().await.consumed;
        Some(consumed)
    }

    /// Highest reserved nonce, if tracked
    pub async fn last_reserved(&self, id: &CapabilityId) -> Option<u64> {
        let slot = self.slot(id)?;
        let reserved = slot.lock().await.reserved;
        Some(reserved)
    }
}
