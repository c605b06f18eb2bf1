//! Capability issuance, renewal, suspension and revocation

use assert_matches::assert_matches;
use async_trait::async_trait;
use std::sync::Arc;
use warden_authorization::capability::{verify_capability, CapabilityManager, IssueDefaults};
use warden_authorization::CapabilityStore;
use warden_core::effects::StorageEffects;
use warden_core::types::{CapabilityState, Scope};
use warden_core::{Result, WardenError};
use warden_effects::MemoryStorageHandler;
use warden_testkit::{capability_request, TestEnv, TEST_CIRCLE, TEST_ORIGIN};

fn manager(env: &TestEnv) -> CapabilityManager {
    manager_over(env, env.storage_dyn(), IssueDefaults::default())
}

fn manager_over(
    env: &TestEnv,
    storage: Arc<dyn StorageEffects>,
    defaults: IssueDefaults,
) -> CapabilityManager {
    CapabilityManager::new(
        env.crypto_dyn(),
        env.signer_dyn(),
        env.time_dyn(),
        CapabilityStore::new(storage),
        defaults,
    )
}

#[tokio::test]
async fn issuance_stamps_ttl_and_starts_active() {
    let env = TestEnv::new(1);
    let manager = manager(&env);
    let cap = manager
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();

    assert_eq!(cap.state, CapabilityState::Active);
    assert_eq!(cap.payload.issued_at, env.now());
    assert_eq!(cap.payload.expires_at - cap.payload.issued_at, 3_600_000);
    assert_eq!(cap.payload.scope, Scope::Read);
    assert_eq!(cap.payload.circle, TEST_CIRCLE);
    assert_eq!(cap.payload.app_origin, TEST_ORIGIN);
    assert_eq!(cap.payload.branch_id, "main");
    assert_eq!(cap.last_nonce, 0);
    verify_capability(env.crypto.as_ref(), &cap).await.unwrap();

    let stored = manager.get(&cap.id).await.unwrap();
    assert_eq!(stored, cap);
}

#[tokio::test]
async fn malformed_requests_rejected() {
    let env = TestEnv::new(2);
    let manager = manager(&env);

    let mut no_methods = capability_request(&[], "read");
    no_methods.methods.clear();
    assert_matches!(
        manager.request_capability(TEST_ORIGIN, &no_methods).await,
        Err(WardenError::Validation { .. })
    );
    assert_matches!(
        manager
            .request_capability(TEST_ORIGIN, &capability_request(&["m"], "admin"))
            .await,
        Err(WardenError::Validation { .. })
    );

    let mut too_long = capability_request(&["m"], "read");
    too_long.ttl_seconds = Some(IssueDefaults::default().max_ttl_seconds + 1);
    assert_matches!(
        manager.request_capability(TEST_ORIGIN, &too_long).await,
        Err(WardenError::Validation { .. })
    );
    assert!(manager.store().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn ttl_overflowing_milliseconds_rejected() {
    let env = TestEnv::new(21);
    let defaults = IssueDefaults {
        max_ttl_seconds: u64::MAX,
        ..IssueDefaults::default()
    };
    let manager = manager_over(&env, env.storage_dyn(), defaults);

    let mut huge = capability_request(&["get_balance"], "read");
    huge.ttl_seconds = Some(u64::MAX / 1_000 + 1);
    assert_matches!(
        manager.request_capability(TEST_ORIGIN, &huge).await,
        Err(WardenError::Validation { .. })
    );

    huge.ttl_seconds = Some(u64::MAX / 1_000);
    let cap = manager.request_capability(TEST_ORIGIN, &huge).await.unwrap();
    assert_eq!(cap.payload.expires_at, u64::MAX);
}

#[tokio::test]
async fn random_nonce_base_stays_below_two_to_the_48() {
    let env = TestEnv::new(3);
    let defaults = IssueDefaults {
        random_nonce_base: true,
        ..IssueDefaults::default()
    };
    let manager = manager_over(&env, env.storage_dyn(), defaults);
    let cap = manager
        .request_capability(TEST_ORIGIN, &capability_request(&["m"], "compute"))
        .await
        .unwrap();
    assert!(cap.payload.nonce_base < 1 << 48);
    assert_eq!(cap.last_nonce, cap.payload.nonce_base);
}

#[tokio::test]
async fn expiry_is_applied_on_read() {
    let env = TestEnv::new(4);
    let manager = manager(&env);
    let mut request = capability_request(&["m"], "read");
    request.ttl_seconds = Some(10);
    let cap = manager.request_capability(TEST_ORIGIN, &request).await.unwrap();

    env.advance(9_999);
    assert_eq!(manager.get(&cap.id).await.unwrap().state, CapabilityState::Active);
    env.advance(1);
    assert_eq!(manager.get(&cap.id).await.unwrap().state, CapabilityState::Expired);
    assert_matches!(
        manager.renew(&cap.id, None).await,
        Err(WardenError::CapabilityExpired { .. })
    );
}

#[tokio::test]
async fn revocation_is_terminal() {
    let env = TestEnv::new(5);
    let manager = manager(&env);
    let cap = manager
        .request_capability(TEST_ORIGIN, &capability_request(&["m"], "read"))
        .await
        .unwrap();

    let revoked = manager.revoke(&cap.id).await.unwrap();
    assert_eq!(revoked.state, CapabilityState::Revoked);
    assert_eq!(revoked.last_nonce, cap.last_nonce);

    assert_matches!(
        manager.resume(&cap.id).await,
        Err(WardenError::CapabilityRevoked { .. })
    );
    assert_matches!(
        manager.revoke(&cap.id).await,
        Err(WardenError::CapabilityRevoked { .. })
    );
    assert_matches!(
        manager.renew(&cap.id, None).await,
        Err(WardenError::CapabilityRevoked { .. })
    );
    env.advance(10 * 3_600_000);
    assert_eq!(manager.get(&cap.id).await.unwrap().state, CapabilityState::Revoked);
}

#[tokio::test]
async fn suspend_and_resume() {
    let env = TestEnv::new(6);
    let manager = manager(&env);
    let cap = manager
        .request_capability(TEST_ORIGIN, &capability_request(&["m"], "read"))
        .await
        .unwrap();

    assert_eq!(
        manager.suspend(&cap.id).await.unwrap().state,
        CapabilityState::Suspended
    );
    assert_matches!(
        manager.renew(&cap.id, None).await,
        Err(WardenError::Capability { .. })
    );
    assert_matches!(
        manager.suspend(&cap.id).await,
        Err(WardenError::Capability { .. })
    );
    assert_eq!(
        manager.resume(&cap.id).await.unwrap().state,
        CapabilityState::Active
    );
}

#[tokio::test]
async fn renewal_carries_the_nonce_forward() {
    let env = TestEnv::new(7);
    let manager = manager(&env);
    let original = manager
        .request_capability(TEST_ORIGIN, &capability_request(&["m"], "write"))
        .await
        .unwrap();

    let mut used = original.clone();
    used.last_nonce = 12;
    used.last_updated += 1;
    manager.store().save(&used).await.unwrap();

    let renewed = manager.renew(&original.id, None).await.unwrap();
    assert_ne!(renewed.id, original.id);
    assert_eq!(renewed.payload.nonce_base, 12);
    assert_eq!(renewed.last_nonce, 12);
    assert_eq!(renewed.payload.issued_at, original.payload.issued_at + 1);
    assert_eq!(renewed.payload.ttl_ms(), original.payload.ttl_ms());
    assert_eq!(renewed.payload.methods, original.payload.methods);

    let old = manager.get(&original.id).await.unwrap();
    assert_eq!(old.state, CapabilityState::Revoked);
    assert_eq!(old.superseded_by, Some(renewed.id.clone()));

    env.advance(1_000);
    let shorter = manager.renew(&renewed.id, Some(60)).await.unwrap();
    assert_eq!(shorter.payload.ttl_ms(), 60_000);
    assert_eq!(shorter.payload.issued_at, env.now());
}

#[tokio::test]
async fn list_for_origin_filters_and_expires() {
    let env = TestEnv::new(8);
    let manager = manager(&env);
    let mut short = capability_request(&["m"], "read");
    short.ttl_seconds = Some(1);
    manager.request_capability(TEST_ORIGIN, &short).await.unwrap();
    manager
        .request_capability("https://other.example", &capability_request(&["m"], "read"))
        .await
        .unwrap();

    env.advance(1_000);
    let mine = manager.list_for_origin(TEST_ORIGIN).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].state, CapabilityState::Expired);
}

/// Storage that yields before every operation, so joined tasks interleave
struct YieldingStorage(MemoryStorageHandler);

#[async_trait]
impl StorageEffects for YieldingStorage {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<()> {
        tokio::task::yield_now().await;
        self.0.store(key, value).await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        tokio::task::yield_now().await;
        self.0.retrieve(key).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        tokio::task::yield_now().await;
        self.0.remove(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        tokio::task::yield_now().await;
        self.0.list_keys(prefix).await
    }
}

#[tokio::test]
async fn concurrent_renewals_converge_on_one_winner() {
    let env = TestEnv::new(9);
    let storage: Arc<dyn StorageEffects> =
        Arc::new(YieldingStorage(MemoryStorageHandler::new()));
    let manager = manager_over(&env, storage, IssueDefaults::default());
    let original = manager
        .request_capability(TEST_ORIGIN, &capability_request(&["m"], "read"))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        manager.renew(&original.id, Some(100)),
        manager.renew(&original.id, Some(200)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id, b.id);
    assert_eq!(a.state, CapabilityState::Active);

    let old = manager.get(&original.id).await.unwrap();
    assert_eq!(old.superseded_by, Some(a.id.clone()));

    let live: Vec<_> = manager
        .list_for_origin(TEST_ORIGIN)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.state == CapabilityState::Active)
        .collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, a.id);
}
