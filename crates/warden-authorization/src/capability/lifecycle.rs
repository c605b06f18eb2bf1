//! Capability lifecycle manager
//!
//! ```text
//! REQUESTED --issue--> ACTIVE --suspend--> SUSPENDED
//!                        |  ^----resume------'  |
//!                        |--expire (lazy)--> EXPIRED
//!                        '--revoke--> REVOKED <-'
//! ```
//!
//! Issuance is atomic: a capability is persisted only once it is signed,
//! so REQUESTED never reaches storage. Expiry is evaluated lazily whenever
//! a capability is read.

use super::signing::sign_capability;
use super::store::CapabilityStore;
use crate::nonce::NonceManager;
use std::sync::Arc;
use warden_core::config::{CapabilityConfig, NetworkConfig};
use warden_core::effects::{CryptoEffects, PhysicalTimeEffects, WalletSigner};
use warden_core::messages::CapabilityRequest;
use warden_core::types::{Capability, CapabilityId, CapabilityPayload, CapabilityState};
use warden_core::{Result, WardenError};

/// Random nonce bases are drawn below `2^48`
const RANDOM_NONCE_BASE_SHIFT: u32 = 16;

/// Coordinates and limits stamped into new capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDefaults {
    /// TTL when the request omits one
    pub default_ttl_seconds: u64,
    /// Longest TTL a request may ask for
    pub max_ttl_seconds: u64,
    /// Random rather than zero nonce base
    pub random_nonce_base: bool,
    /// Branch when the request omits one
    pub branch_id: String,
    /// Current epoch
    pub epoch: u64,
}

impl IssueDefaults {
    /// Defaults from configuration sections
    pub fn from_config(capability: &CapabilityConfig, network: &NetworkConfig) -> Self {
        Self {
            default_ttl_seconds: capability.default_ttl_seconds,
            max_ttl_seconds: capability.max_ttl_seconds,
            random_nonce_base: capability.random_nonce_base,
            branch_id: network.default_branch.clone(),
            epoch: network.epoch,
        }
    }
}

impl Default for IssueDefaults {
    fn default() -> Self {
        Self::from_config(&CapabilityConfig::default(), &NetworkConfig::default())
    }
}

/// Issues, renews, suspends and revokes capabilities
pub struct CapabilityManager {
    crypto: Arc<dyn CryptoEffects>,
    signer: Arc<dyn WalletSigner>,
    time: Arc<dyn PhysicalTimeEffects>,
    store: CapabilityStore,
    defaults: IssueDefaults,
    nonces: Option<Arc<NonceManager>>,
}

impl CapabilityManager {
    /// Manager over the given effects
    pub fn new(
        crypto: Arc<dyn CryptoEffects>,
        signer: Arc<dyn WalletSigner>,
        time: Arc<dyn PhysicalTimeEffects>,
        store: CapabilityStore,
        defaults: IssueDefaults,
    ) -> Self {
        Self {
            crypto,
            signer,
            time,
            store,
            defaults,
            nonces: None,
        }
    }

    /// Drop nonce state in `nonces` once a capability can no longer be invoked
    #[must_use]
    pub fn with_nonces(mut self, nonces: Arc<NonceManager>) -> Self {
        self.nonces = Some(nonces);
        self
    }

    fn retire(&self, id: &CapabilityId) {
        if let Some(nonces) = &self.nonces {
            if nonces.forget(id) {
                tracing::debug!(capability = %id, "nonce state dropped");
            }
        }
    }

    /// Underlying store
    pub fn store(&self) -> &CapabilityStore {
        &self.store
    }

    fn ttl_ms(&self, ttl_seconds: Option<u64>) -> Result<u64> {
        let ttl = ttl_seconds.unwrap_or(self.defaults.default_ttl_seconds);
        if ttl == 0 {
            return Err(WardenError::validation("ttlSeconds must be positive"));
        }
        if ttl > self.defaults.max_ttl_seconds {
            return Err(WardenError::validation(format!(
                "ttlSeconds {ttl} exceeds the maximum of {}",
                self.defaults.max_ttl_seconds
            )));
        }
        ttl.checked_mul(1_000)
            .ok_or_else(|| WardenError::validation(format!("ttlSeconds {ttl} is out of range")))
    }

    /// Issue a capability for an approved request
    pub async fn request_capability(
        &self,
        app_origin: &str,
        request: &CapabilityRequest,
    ) -> Result<Capability> {
        let scope = request.validate()?;
        if app_origin.trim().is_empty() {
            return Err(WardenError::validation("appOrigin must not be empty"));
        }
        let ttl_ms = self.ttl_ms(request.ttl_seconds)?;
        let now = self.time.now_ms().await;
        let nonce_base = if self.defaults.random_nonce_base {
            self.crypto.random_u64().await >> RANDOM_NONCE_BASE_SHIFT
        } else {
            0
        };

        let payload = CapabilityPayload {
            circle: request.circle.clone(),
            methods: request.methods.iter().cloned().collect(),
            scope,
            encrypted: request.encrypted,
            app_origin: app_origin.to_string(),
            branch_id: request
                .branch_id
                .clone()
                .unwrap_or_else(|| self.defaults.branch_id.clone()),
            epoch: self.defaults.epoch,
            issued_at: now,
            expires_at: now.saturating_add(ttl_ms),
            nonce_base,
            wallet_pub_key: self.signer.public_key(),
        };
        let capability = sign_capability(self.signer.as_ref(), payload).await?;
        self.store.save(&capability).await?;

        tracing::info!(
            capability = %capability.id,
            origin = app_origin,
            circle = %capability.payload.circle,
            scope = %capability.payload.scope,
            expires_at = capability.payload.expires_at,
            "capability issued"
        );
        Ok(capability)
    }

    /// Current record with lazy expiry applied (and persisted)
    pub async fn get(&self, id: &CapabilityId) -> Result<Capability> {
        let mut capability = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| WardenError::capability(format!("unknown capability {id}")))?;
        let now = self.time.now_ms().await;
        if capability.refresh_expiry(now) {
            tracing::info!(capability = %id, "capability expired");
            capability = self.store.save(&capability).await?.into_current();
        }
        if matches!(
            capability.state,
            CapabilityState::Expired | CapabilityState::Revoked
        ) {
            self.retire(id);
        }
        Ok(capability)
    }

    /// Capabilities bound to `origin`, with lazy expiry applied
    pub async fn list_for_origin(&self, origin: &str) -> Result<Vec<Capability>> {
        let mut out = Vec::new();
        for capability in self.store.list().await? {
            if capability.payload.app_origin == origin {
                out.push(self.get(&capability.id).await?);
            }
        }
        Ok(out)
    }

    async fn apply(&self, id: &CapabilityId, next: CapabilityState) -> Result<Capability> {
        let mut capability = self.get(id).await?;
        let now = self.time.now_ms().await;
        capability.transition(next, now)?;
        let saved = self.store.save(&capability).await?.into_current();
        if saved.state == CapabilityState::Revoked {
            self.retire(id);
        }
        tracing::info!(capability = %id, state = %saved.state, "capability state changed");
        Ok(saved)
    }

    /// Withdraw a capability permanently
    pub async fn revoke(&self, id: &CapabilityId) -> Result<Capability> {
        self.apply(id, CapabilityState::Revoked).await
    }

    /// Temporarily disable an active capability
    pub async fn suspend(&self, id: &CapabilityId) -> Result<Capability> {
        self.apply(id, CapabilityState::Suspended).await
    }

    /// Re-enable a suspended capability
    pub async fn resume(&self, id: &CapabilityId) -> Result<Capability> {
        self.apply(id, CapabilityState::Active).await
    }

    /// Replace an active capability with a freshly signed one.
    ///
    /// The replacement keeps the grant (circle, methods, scope, encryption,
    /// origin, branch, epoch) and continues from the old `last_nonce`. The
    /// old record is revoked and points at its replacement. If another
    /// renewal of the same capability wins the race, this one is revoked
    /// and the winner is returned.
    pub async fn renew(&self, id: &CapabilityId, ttl_seconds: Option<u64>) -> Result<Capability> {
        let mut old = self.get(id).await?;
        match old.state {
            CapabilityState::Active => {}
            CapabilityState::Expired => return Err(WardenError::expired(id)),
            CapabilityState::Revoked => return Err(WardenError::revoked(id)),
            state => {
                return Err(WardenError::capability(format!(
                    "cannot renew capability {id} in state {state}"
                )))
            }
        }

        let ttl_ms = match ttl_seconds {
            Some(seconds) => self.ttl_ms(Some(seconds))?,
            None => old.payload.ttl_ms(),
        };
        let now = self.time.now_ms().await;
        let issued_at = now.max(old.payload.issued_at.saturating_add(1));
        let payload = CapabilityPayload {
            issued_at,
            expires_at: issued_at.saturating_add(ttl_ms),
            nonce_base: old.last_nonce,
            wallet_pub_key: self.signer.public_key(),
            ..old.payload.clone()
        };
        let renewed = sign_capability(self.signer.as_ref(), payload).await?;
        self.store.save(&renewed).await?;

        old.transition(CapabilityState::Revoked, now)?;
        old.superseded_by = Some(renewed.id.clone());
        self.store.save(&old).await?;
        self.retire(id);

        let settled = self.store.load(id).await?;
        let winner = settled.and_then(|c| c.superseded_by);
        if let Some(winner) = winner.filter(|w| *w != renewed.id) {
            tracing::warn!(
                capability = %id,
                lost = %renewed.id,
                won = %winner,
                "concurrent renewal lost; revoking duplicate"
            );
            let mut duplicate = renewed;
            duplicate.transition(CapabilityState::Revoked, now)?;
            self.store.save(&duplicate).await?;
            self.retire(&duplicate.id);
            return self.get(&winner).await;
        }

        tracing::info!(
            capability = %id,
            renewed = %renewed.id,
            nonce_base = renewed.payload.nonce_base,
            expires_at = renewed.payload.expires_at,
            "capability renewed"
        );
        Ok(renewed)
    }
}
