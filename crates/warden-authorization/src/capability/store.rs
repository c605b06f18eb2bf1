//! Persistent capability records
//!
//! Records are versioned JSON under `capability/<id>`. Concurrent writers
//! resolve by `last_updated` (last writer wins), with two monotone fields
//! merged regardless of order: `last_nonce` keeps the maximum and a REVOKED
//! state is never overwritten.

use std::sync::Arc;
use warden_core::effects::StorageEffects;
use warden_core::types::{Capability, CapabilityId, CapabilityState};
use warden_core::Result;

const KEY_PREFIX: &str = "capability/";

/// Outcome of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record was written (possibly merged)
    Written(Capability),
    /// A newer record was already stored; it is returned unchanged
    Stale(Capability),
}

impl WriteOutcome {
    /// Record now in storage
    pub fn into_current(self) -> Capability {
        match self {
            Self::Written(c) | Self::Stale(c) => c,
        }
    }
}

/// Capability persistence over a storage effect
#[derive(Clone)]
pub struct CapabilityStore {
    storage: Arc<dyn StorageEffects>,
}

impl CapabilityStore {
    /// Store backed by `storage`
    pub fn new(storage: Arc<dyn StorageEffects>) -> Self {
        Self { storage }
    }

    fn key(id: &CapabilityId) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    /// Read a capability
    pub async fn load(&self, id: &CapabilityId) -> Result<Option<Capability>> {
        match self.storage.retrieve(&Self::key(id)).await? {
            Some(bytes) => Ok(Some(Capability::from_versioned_json(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write a capability, resolving against whatever is stored
    pub async fn save(&self, capability: &Capability) -> Result<WriteOutcome> {
        let current = self.load(&capability.id).await?;
        let outcome = match current {
            None => WriteOutcome::Written(capability.clone()),
            Some(stored) => merge(stored, capability.clone()),
        };
        if let WriteOutcome::Written(record) = &outcome {
            self.storage
                .store(&Self::key(&record.id), record.to_versioned_json()?)
                .await?;
        } else {
            tracing::debug!(capability = %capability.id, "dropping stale capability write");
        }
        Ok(outcome)
    }

    /// Every stored capability, ordered by id
    pub async fn list(&self) -> Result<Vec<Capability>> {
        let mut out = Vec::new();
        for key in self.storage.list_keys(KEY_PREFIX).await? {
            if let Some(bytes) = self.storage.retrieve(&key).await? {
                out.push(Capability::from_versioned_json(&bytes)?);
            }
        }
        Ok(out)
    }
}

fn merge(stored: Capability, incoming: Capability) -> WriteOutcome {
    if incoming.last_updated < stored.last_updated {
        return WriteOutcome::Stale(stored);
    }
    let mut merged = incoming;
    merged.last_nonce = merged.last_nonce.max(stored.last_nonce);
    if stored.state == CapabilityState::Revoked {
        merged.state = CapabilityState::Revoked;
        if merged.superseded_by.is_none() {
            merged.superseded_by = stored.superseded_by;
        }
    }
    WriteOutcome::Written(merged)
}
