//! Store-backed invocation authorization
//!
//! The gate owns the per-capability critical section: load, validate and
//! persist happen under one FIFO lock, so two invocations racing on the same
//! capability are judged in arrival order against each other's result.

use super::{Authorized, InvocationValidator};
use crate::capability::CapabilityStore;
use crate::locks::KeyedLocks;
use crate::nonce::NonceManager;
use std::sync::Arc;
use warden_core::types::{CapabilityId, CapabilityState, SignedInvocation};
use warden_core::{Result, WardenError};

/// Authorizes signed invocations against stored capabilities
pub struct InvocationGate {
    store: CapabilityStore,
    validator: InvocationValidator,
    nonces: Arc<NonceManager>,
    locks: KeyedLocks<CapabilityId>,
}

impl InvocationGate {
    /// Gate over `store`
    pub fn new(
        store: CapabilityStore,
        validator: InvocationValidator,
        nonces: Arc<NonceManager>,
    ) -> Self {
        Self {
            store,
            validator,
            nonces,
            locks: KeyedLocks::new(),
        }
    }

    /// Validator in use
    pub fn validator(&self) -> &InvocationValidator {
        &self.validator
    }

    /// Validate `invocation` from `origin` and consume its nonce
    pub async fn authorize(
        &self,
        invocation: &SignedInvocation,
        origin: &str,
    ) -> Result<Authorized> {
        let guard = self.locks.lock(&invocation.body.capability_id).await;
        let result = self.authorize_locked(invocation, origin).await;
        drop(guard);
        self.locks.prune();
        result
    }

    /// Number of capabilities with a live critical section
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    async fn authorize_locked(
        &self,
        invocation: &SignedInvocation,
        origin: &str,
    ) -> Result<Authorized> {
        let id = &invocation.body.capability_id;

        let stored = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| WardenError::capability(format!("unknown capability {id}")))?;
        let mut capability = stored.clone();
        let result = self
            .validator
            .validate(invocation, &mut capability, origin)
            .await;
        if capability == stored {
            return result;
        }

        let saved = self.store.save(&capability).await?.into_current();
        if matches!(
            saved.state,
            CapabilityState::Expired | CapabilityState::Revoked
        ) {
            self.nonces.forget(id);
        }
        let authorized = result?;
        if saved.state == CapabilityState::Revoked {
            return Err(WardenError::revoked(id));
        }
        self.nonces.mark_consumed(id, authorized.nonce).await;
        tracing::info!(
            capability = %id,
            method = %authorized.method,
            nonce = authorized.nonce,
            "invocation consumed nonce"
        );
        Ok(authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::sign_capability;
    use crate::invocation::InvocationSigner;
    use std::collections::BTreeSet;
    use warden_core::effects::{PhysicalTimeEffects, WalletSigner};
    use warden_core::types::{Capability, CapabilityPayload, PayloadEncoding, Scope};
    use warden_effects::{
        LocalWalletSigner, MemoryStorageHandler, RealCryptoHandler, SimulatedTimeHandler,
    };

    const ORIGIN: &str = "https://dapp.example";

    struct Harness {
        store: CapabilityStore,
        gate: InvocationGate,
        signer: InvocationSigner,
        capability: Capability,
    }

    async fn harness() -> Harness {
        let key = Arc::new(LocalWalletSigner::from_secret_bytes(&[21u8; 32]));
        let time: Arc<dyn PhysicalTimeEffects> = Arc::new(SimulatedTimeHandler::new(2_000));
        let store = CapabilityStore::new(Arc::new(MemoryStorageHandler::new()));
        let nonces = Arc::new(NonceManager::new());

        let payload = CapabilityPayload {
            circle: "circle-a".into(),
            methods: BTreeSet::from(["get_balance".to_string()]),
            scope: Scope::Read,
            encrypted: false,
            app_origin: ORIGIN.into(),
            branch_id: "main".into(),
            epoch: 0,
            issued_at: 1_000,
            expires_at: 100_000,
            nonce_base: 5,
            wallet_pub_key: key.public_key(),
        };
        let capability = sign_capability(key.as_ref(), payload).await.unwrap();
        store.save(&capability).await.unwrap();

        let validator = InvocationValidator::new(Arc::new(RealCryptoHandler::new()), time.clone());
        Harness {
            gate: InvocationGate::new(store.clone(), validator, nonces.clone()),
            signer: InvocationSigner::new(key, nonces, time),
            store,
            capability,
        }
    }

    #[tokio::test]
    async fn consumed_nonce_is_persisted() {
        let h = harness().await;
        let payload = PayloadEncoding::Raw(vec![1]);
        let invocation = h
            .signer
            .sign_invocation(&h.capability, ORIGIN, "get_balance", &payload)
            .await
            .unwrap();

        h.gate.authorize(&invocation, ORIGIN).await.unwrap();
        let stored = h.store.load(&h.capability.id).await.unwrap().unwrap();
        assert_eq!(stored.last_nonce, 6);

        assert!(matches!(
            h.gate.authorize(&invocation, ORIGIN).await,
            Err(WardenError::NonceViolation { .. })
        ));
    }

    #[tokio::test]
    async fn racing_invocations_both_land_in_order() {
        let h = harness().await;
        let payload = PayloadEncoding::Raw(vec![1]);
        let (a, b) = tokio::join!(
            h.signer
                .sign_invocation(&h.capability, ORIGIN, "get_balance", &payload),
            h.signer
                .sign_invocation(&h.capability, ORIGIN, "get_balance", &payload),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!((a.header.nonce, b.header.nonce), (6, 7));

        let (ra, rb) = tokio::join!(h.gate.authorize(&a, ORIGIN), h.gate.authorize(&b, ORIGIN));
        assert_eq!(ra.unwrap().nonce, 6);
        assert_eq!(rb.unwrap().nonce, 7);
        let stored = h.store.load(&h.capability.id).await.unwrap().unwrap();
        assert_eq!(stored.last_nonce, 7);
    }

    #[tokio::test]
    async fn idle_locks_are_released() {
        let h = harness().await;
        let payload = PayloadEncoding::Raw(vec![1]);
        let (a, b) = tokio::join!(
            h.signer
                .sign_invocation(&h.capability, ORIGIN, "get_balance", &payload),
            h.signer
                .sign_invocation(&h.capability, ORIGIN, "get_balance", &payload),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        let (ra, rb) = tokio::join!(h.gate.authorize(&a, ORIGIN), h.gate.authorize(&b, ORIGIN));
        ra.unwrap();
        rb.unwrap();
        assert_eq!(h.gate.tracked_locks(), 0);

        assert!(h.gate.authorize(&a, ORIGIN).await.is_err());
        assert_eq!(h.gate.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn unknown_capability() {
        let h = harness().await;
        let payload = PayloadEncoding::Raw(vec![1]);
        let mut invocation = h
            .signer
            .sign_invocation(&h.capability, ORIGIN, "get_balance", &payload)
            .await
            .unwrap();
        invocation.body.capability_id = "cd".repeat(32).parse().unwrap();
        assert!(matches!(
            h.gate.authorize(&invocation, ORIGIN).await,
            Err(WardenError::Capability { .. })
        ));
    }
}
