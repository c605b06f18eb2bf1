//! Per-origin permission grants
//!
//! One record per origin under `permissions/<origin>`, stored as a versioned
//! JSON envelope. Expired grants are filtered on read but never deleted
//! there; a re-grant overwrites them and `revoke_all` removes them.
//! Concurrent writers resolve by `last_updated`; an older write is dropped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warden_core::effects::{PhysicalTimeEffects, StorageEffects};
use warden_core::types::{GrantedCapabilities, TimestampMs, WalletCapability};
use warden_core::{Result, WardenError};

const KEY_PREFIX: &str = "permissions/";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredGrant {
    V1(GrantedCapabilities),
}

/// Durable allow-list of what each origin may do
#[derive(Clone)]
pub struct PermissionStore {
    storage: Arc<dyn StorageEffects>,
    time: Arc<dyn PhysicalTimeEffects>,
}

impl PermissionStore {
    /// Store over `storage`
    pub fn new(storage: Arc<dyn StorageEffects>, time: Arc<dyn PhysicalTimeEffects>) -> Self {
        Self { storage, time }
    }

    fn key(origin: &str) -> String {
        format!("{KEY_PREFIX}{origin}")
    }

    async fn read(&self, origin: &str) -> Result<Option<GrantedCapabilities>> {
        let Some(bytes) = self.storage.retrieve(&Self::key(origin)).await? else {
            return Ok(None);
        };
        let StoredGrant::V1(grant) = serde_json::from_slice(&bytes).map_err(|e| {
            WardenError::validation(format!("unsupported or malformed permission record: {e}"))
        })?;
        Ok(Some(grant))
    }

    async fn write(&self, grant: GrantedCapabilities) -> Result<GrantedCapabilities> {
        if let Some(stored) = self.read(&grant.origin).await? {
            if grant.last_updated < stored.last_updated {
                tracing::debug!(origin = %grant.origin, "dropping stale permission write");
                return Ok(stored);
            }
        }
        let bytes = serde_json::to_vec(&StoredGrant::V1(grant.clone()))?;
        self.storage.store(&Self::key(&grant.origin), bytes).await?;
        Ok(grant)
    }

    async fn stamp(&self, previous: Option<&GrantedCapabilities>) -> TimestampMs {
        let now = self.time.now_ms().await;
        previous.map_or(now, |p| now.max(p.last_updated))
    }

    /// Grant `capabilities` to `origin`, replacing any earlier grant
    pub async fn grant(
        &self,
        origin: &str,
        app_name: &str,
        app_icon: Option<String>,
        capabilities: &[WalletCapability],
        expires_at: Option<TimestampMs>,
    ) -> Result<GrantedCapabilities> {
        if origin.trim().is_empty() {
            return Err(WardenError::validation("origin must not be empty"));
        }
        if capabilities.is_empty() {
            return Err(WardenError::validation("nothing to grant"));
        }
        let previous = self.read(origin).await?;
        let now = self.stamp(previous.as_ref()).await;

        let mut granted = capabilities.to_vec();
        granted.sort();
        granted.dedup();

        let grant = GrantedCapabilities {
            origin: origin.to_string(),
            app_name: app_name.to_string(),
            app_icon,
            capabilities: granted,
            granted_at: now,
            expires_at,
            last_used: None,
            last_updated: now,
        };
        let saved = self.write(grant).await?;
        tracing::info!(
            origin,
            capabilities = ?saved.capabilities,
            "permissions granted"
        );
        Ok(saved)
    }

    /// Live grant for `origin`. Read-only: a grant written after the
    /// expired one was read must survive.
    pub async fn get(&self, origin: &str) -> Result<Option<GrantedCapabilities>> {
        let Some(grant) = self.read(origin).await? else {
            return Ok(None);
        };
        let now = self.time.now_ms().await;
        if grant.is_expired_at(now) {
            tracing::debug!(origin, expires_at = ?grant.expires_at, "permission grant expired");
            return Ok(None);
        }
        Ok(Some(grant))
    }

    /// Whether `origin` currently holds `capability`
    pub async fn has_capability(&self, origin: &str, capability: WalletCapability) -> Result<bool> {
        Ok(self
            .get(origin)
            .await?
            .is_some_and(|grant| grant.has(capability)))
    }

    /// Withdraw one permission. The record is deleted once nothing remains.
    pub async fn revoke_capability(
        &self,
        origin: &str,
        capability: WalletCapability,
    ) -> Result<Option<GrantedCapabilities>> {
        let Some(mut grant) = self.get(origin).await? else {
            return Ok(None);
        };
        grant.capabilities.retain(|c| *c != capability);
        if grant.capabilities.is_empty() {
            self.storage.remove(&Self::key(origin)).await?;
            tracing::info!(origin, %capability, "last permission revoked");
            return Ok(None);
        }
        grant.last_updated = self.stamp(Some(&grant)).await;
        let saved = self.write(grant).await?;
        tracing::info!(origin, %capability, "permission revoked");
        Ok(Some(saved))
    }

    /// Withdraw everything granted to `origin`
    pub async fn revoke_all(&self, origin: &str) -> Result<bool> {
        let removed = self.storage.remove(&Self::key(origin)).await?;
        if removed {
            tracing::info!(origin, "all permissions revoked");
        }
        Ok(removed)
    }

    /// Every live grant, ordered by origin
    pub async fn list(&self) -> Result<Vec<GrantedCapabilities>> {
        let mut out = Vec::new();
        for key in self.storage.list_keys(KEY_PREFIX).await? {
            if let Some(origin) = key.strip_prefix(KEY_PREFIX) {
                if let Some(grant) = self.get(origin).await? {
                    out.push(grant);
                }
            }
        }
        Ok(out)
    }

    /// Record that `origin` just used its grant
    pub async fn touch(&self, origin: &str) -> Result<Option<GrantedCapabilities>> {
        let Some(mut grant) = self.get(origin).await? else {
            return Ok(None);
        };
        let now = self.stamp(Some(&grant)).await;
        grant.last_used = Some(now);
        grant.last_updated = now;
        Ok(Some(self.write(grant).await?))
    }
}
