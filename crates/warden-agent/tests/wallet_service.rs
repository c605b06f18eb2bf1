//! Wallet service: connection, approval, capability and invocation flows

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use warden_agent::{
    ApprovalDecision, AuthorizedCall, ExecutionOutcome, InvocationExecutor, SubscriptionId,
    WalletEvent, WalletService, WalletServiceBuilder,
};
use warden_authorization::{InvocationSigner, NonceManager};
use warden_core::config::{StorageBackend, WardenConfig};
use warden_core::effects::WalletSigner;
use warden_core::messages::{ConnectionRequest, InvocationRequest};
use warden_core::types::{PayloadEncoding, WalletCapability};
use warden_core::{Result, WardenError};
use warden_testkit::{capability_request, connection_request, TestEnv, OTHER_ORIGIN, TEST_ORIGIN};

async fn service_with(env: &TestEnv, config: WardenConfig) -> WalletService {
    WalletServiceBuilder::new()
        .with_config(config)
        .with_signer(env.signer_dyn())
        .with_crypto(env.crypto_dyn())
        .with_time(env.time_dyn())
        .with_storage(env.storage_dyn())
        .build()
        .await
        .unwrap()
}

async fn service(env: &TestEnv) -> WalletService {
    service_with(env, WardenConfig::default()).await
}

/// Answer every approval prompt with `decision`
fn answer_all(service: &WalletService, decision: ApprovalDecision) -> SubscriptionId {
    let broker = service.approvals().clone();
    service
        .events()
        .subscribe(Arc::new(move |event: &WalletEvent| -> Result<()> {
            if let WalletEvent::ApprovalRequested { request_id, .. } = event {
                broker.resolve(request_id, decision.clone());
            }
            Ok(())
        }))
}

fn record(service: &WalletService) -> Arc<Mutex<Vec<WalletEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    service
        .events()
        .subscribe(Arc::new(move |event: &WalletEvent| -> Result<()> {
            sink.lock().push(event.clone());
            Ok(())
        }));
    seen
}

fn invoke_request(capability_id: &warden_core::types::CapabilityId, method: &str) -> InvocationRequest {
    InvocationRequest {
        capability_id: capability_id.clone(),
        method: method.into(),
        payload: json!([1, 2, 3]),
    }
}

#[tokio::test]
async fn connect_request_and_invoke() {
    let env = TestEnv::new(1);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);
    let events = record(&wallet);

    let connection = wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    assert_eq!(connection.circle, "circle-test");
    assert_eq!(connection.network, "mainnet");
    assert_eq!(connection.wallet_pub_key, env.signer_dyn().public_key());
    assert_eq!(wallet.sessions().len(), 1);

    let cap = wallet
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();

    let first = wallet
        .invoke(TEST_ORIGIN, &invoke_request(&cap.id, "get_balance"))
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.data.as_ref().unwrap()["nonce"], 1);
    assert_eq!(first.epoch_tag, Some(0));

    let second = wallet
        .invoke(TEST_ORIGIN, &invoke_request(&cap.id, "get_balance"))
        .await
        .unwrap();
    assert_eq!(second.data.unwrap()["nonce"], 2);

    let stored = wallet.capabilities().get(&cap.id).await.unwrap();
    assert_eq!(stored.last_nonce, 2);
    assert!(wallet
        .permissions()
        .get(TEST_ORIGIN)
        .await
        .unwrap()
        .unwrap()
        .last_used
        .is_some());

    let events = events.lock();
    assert!(events
        .iter()
        .any(|e| matches!(e, WalletEvent::Connected { origin, .. } if origin == TEST_ORIGIN)));
    assert!(events
        .iter()
        .any(|e| matches!(e, WalletEvent::CapabilityIssued { capability_id, .. } if *capability_id == cap.id)));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, WalletEvent::InvocationAuthorized { .. }))
            .count(),
        2
    );
}

#[tokio::test]
async fn calls_without_a_session_are_refused() {
    let env = TestEnv::new(2);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);

    assert_matches!(
        wallet
            .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
            .await,
        Err(WardenError::NotConnected { .. })
    );

    wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    let cap = wallet
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();
    assert!(wallet.disconnect(TEST_ORIGIN).await.unwrap());
    assert!(!wallet.disconnect(TEST_ORIGIN).await.unwrap());

    assert_matches!(
        wallet
            .invoke(TEST_ORIGIN, &invoke_request(&cap.id, "get_balance"))
            .await,
        Err(WardenError::NotConnected { .. })
    );
}

#[tokio::test]
async fn rejected_connection_grants_nothing() {
    let env = TestEnv::new(3);
    let wallet = service(&env).await;
    answer_all(
        &wallet,
        ApprovalDecision::Reject {
            reason: Some("not today".into()),
        },
    );

    let err = wallet
        .connect(TEST_ORIGIN, &connection_request())
        .await
        .unwrap_err();
    assert_eq!(err, WardenError::user_rejected("not today"));
    assert!(wallet.sessions().is_empty());
    assert!(wallet.permissions().get(TEST_ORIGIN).await.unwrap().is_none());
}

#[tokio::test]
async fn unanswered_approval_times_out() {
    let env = TestEnv::new(4);
    let mut config = WardenConfig::default();
    config.timeouts.connection_request_ms = 30;
    let wallet = service_with(&env, config).await;
    let events = record(&wallet);

    let err = wallet
        .connect(TEST_ORIGIN, &connection_request())
        .await
        .unwrap_err();
    assert_eq!(err, WardenError::Timeout { timeout_ms: 30 });
    assert!(wallet.approvals().pending().is_empty());

    let events = events.lock();
    let request_id = events
        .iter()
        .find_map(|e| match e {
            WalletEvent::ApprovalRequested { request_id, .. } => Some(request_id.clone()),
            _ => None,
        })
        .unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, WalletEvent::ApprovalTimedOut { request_id: id, .. } if *id == request_id)));
    assert!(!wallet.approvals().resolve(&request_id, ApprovalDecision::Approve));
}

#[tokio::test]
async fn known_origins_reconnect_without_a_prompt() {
    let env = TestEnv::new(5);
    let wallet = service(&env).await;
    let answering = answer_all(&wallet, ApprovalDecision::Approve);

    wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    wallet.disconnect(TEST_ORIGIN).await.unwrap();
    assert!(wallet.events().unsubscribe(answering));

    let events = record(&wallet);
    wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    assert!(!events
        .lock()
        .iter()
        .any(|e| matches!(e, WalletEvent::ApprovalRequested { .. })));
}

#[tokio::test]
async fn connection_must_come_from_the_claimed_origin() {
    let env = TestEnv::new(6);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);

    assert_matches!(
        wallet.connect(OTHER_ORIGIN, &connection_request()).await,
        Err(WardenError::OriginMismatch { .. })
    );
    assert!(wallet.sessions().is_empty());
}

#[tokio::test]
async fn capability_requests_need_permission_and_matching_circle() {
    let env = TestEnv::new(7);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);

    let view_only = ConnectionRequest {
        requested_capabilities: Some(vec![WalletCapability::ViewAddress]),
        ..connection_request()
    };
    wallet.connect(TEST_ORIGIN, &view_only).await.unwrap();
    assert_matches!(
        wallet
            .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
            .await,
        Err(WardenError::Capability { .. })
    );

    wallet
        .permissions()
        .grant(TEST_ORIGIN, "Test dApp", None, &[WalletCapability::InvokeCircle], None)
        .await
        .unwrap();
    let mut elsewhere = capability_request(&["get_balance"], "read");
    elsewhere.circle = "circle-other".into();
    assert_matches!(
        wallet.request_capability(TEST_ORIGIN, &elsewhere).await,
        Err(WardenError::ScopeViolation { .. })
    );
}

#[tokio::test]
async fn only_the_owner_renews_or_revokes() {
    let env = TestEnv::new(8);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);
    let events = record(&wallet);

    wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    let cap = wallet
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();

    assert_matches!(
        wallet.revoke_capability(OTHER_ORIGIN, &cap.id).await,
        Err(WardenError::OriginMismatch { .. })
    );
    assert_matches!(
        wallet.renew_capability(OTHER_ORIGIN, &cap.id, None).await,
        Err(WardenError::OriginMismatch { .. })
    );

    env.advance(1_000);
    let renewed = wallet
        .renew_capability(TEST_ORIGIN, &cap.id, Some(600))
        .await
        .unwrap();
    assert_ne!(renewed.id, cap.id);
    wallet.revoke_capability(TEST_ORIGIN, &renewed.id).await.unwrap();

    let listed = wallet.list_capabilities(TEST_ORIGIN).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(events.lock().iter().any(|e| matches!(
        e,
        WalletEvent::CapabilityRenewed { previous, current } if *previous == cap.id && *current == renewed.id
    )));

    assert_matches!(
        wallet
            .invoke(TEST_ORIGIN, &invoke_request(&renewed.id, "get_balance"))
            .await,
        Err(WardenError::CapabilityRevoked { .. })
    );
}

#[tokio::test]
async fn rejected_invocations_do_not_burn_nonces() {
    let env = TestEnv::new(9);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);
    let events = record(&wallet);

    wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    let cap = wallet
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();

    assert_matches!(
        wallet
            .invoke(TEST_ORIGIN, &invoke_request(&cap.id, "send_transaction"))
            .await,
        Err(WardenError::ScopeViolation { .. })
    );
    assert!(events.lock().iter().any(|e| matches!(
        e,
        WalletEvent::InvocationRejected { code, .. } if code == "SCOPE_VIOLATION"
    )));

    let ok = wallet
        .invoke(TEST_ORIGIN, &invoke_request(&cap.id, "get_balance"))
        .await
        .unwrap();
    assert_eq!(ok.data.unwrap()["nonce"], 1);
}

#[tokio::test]
async fn other_origins_cannot_invoke_a_capability() {
    let env = TestEnv::new(15);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);

    wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    let intruder = ConnectionRequest {
        app_origin: OTHER_ORIGIN.into(),
        ..connection_request()
    };
    wallet.connect(OTHER_ORIGIN, &intruder).await.unwrap();
    let cap = wallet
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();

    assert_matches!(
        wallet
            .invoke(OTHER_ORIGIN, &invoke_request(&cap.id, "get_balance"))
            .await,
        Err(WardenError::OriginMismatch { .. })
    );

    let owned = wallet
        .invoke(TEST_ORIGIN, &invoke_request(&cap.id, "get_balance"))
        .await
        .unwrap();
    assert!(owned.success);
    assert_eq!(owned.data.unwrap()["nonce"], 1);
}

struct FailingExecutor;

#[async_trait]
impl InvocationExecutor for FailingExecutor {
    async fn execute(&self, _call: &AuthorizedCall) -> Result<ExecutionOutcome> {
        Err(WardenError::internal("backend offline"))
    }
}

#[tokio::test]
async fn executor_failure_is_reported_and_the_nonce_stays_used() {
    let env = TestEnv::new(10);
    let wallet = WalletServiceBuilder::new()
        .with_signer(env.signer_dyn())
        .with_crypto(env.crypto_dyn())
        .with_time(env.time_dyn())
        .with_storage(env.storage_dyn())
        .with_executor(Arc::new(FailingExecutor))
        .build()
        .await
        .unwrap();
    answer_all(&wallet, ApprovalDecision::Approve);

    wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    let cap = wallet
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();

    let result = wallet
        .invoke(TEST_ORIGIN, &invoke_request(&cap.id, "get_balance"))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("[INTERNAL_ERROR]"));
    assert_eq!(wallet.capabilities().get(&cap.id).await.unwrap().last_nonce, 1);
}

#[tokio::test]
async fn submitted_invocations_are_checked_against_their_payload() {
    let env = TestEnv::new(11);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);

    wallet.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    let cap = wallet
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();

    let app_signer = InvocationSigner::new(
        env.signer_dyn(),
        Arc::new(NonceManager::new()),
        env.time_dyn(),
    );
    let payload = json!({"account": "alice"});
    let signed = app_signer
        .sign_invocation(
            &cap,
            TEST_ORIGIN,
            "get_balance",
            &PayloadEncoding::from_json(payload.clone()),
        )
        .await
        .unwrap();

    assert_matches!(
        wallet
            .submit_signed(TEST_ORIGIN, &signed, Some(json!({"account": "bob"})))
            .await,
        Err(WardenError::Validation { .. })
    );

    let result = wallet
        .submit_signed(TEST_ORIGIN, &signed, Some(payload))
        .await
        .unwrap();
    assert!(result.success);

    assert_matches!(
        wallet.submit_signed(TEST_ORIGIN, &signed, None).await,
        Err(WardenError::NonceViolation { expected: 2, actual: 1 })
    );
}

#[tokio::test]
async fn json_requests_get_coded_replies() {
    let env = TestEnv::new(12);
    let wallet = service(&env).await;
    answer_all(&wallet, ApprovalDecision::Approve);

    let reply = wallet
        .handle_json(
            TEST_ORIGIN,
            json!({
                "type": "requestCapability",
                "circle": "circle-test",
                "methods": ["get_balance"],
                "scope": "read"
            }),
        )
        .await;
    assert_eq!(reply["success"], false);
    assert!(reply["error"]
        .as_str()
        .unwrap()
        .starts_with("[NOT_CONNECTED]"));

    let reply = wallet
        .handle_json(TEST_ORIGIN, json!({"type": "launchRockets"}))
        .await;
    assert!(reply["error"]
        .as_str()
        .unwrap()
        .starts_with("[VALIDATION_ERROR]"));

    let reply = wallet
        .handle_json(
            TEST_ORIGIN,
            json!({
                "type": "connect",
                "circle": "circle-test",
                "appOrigin": TEST_ORIGIN
            }),
        )
        .await;
    assert_eq!(reply["success"], true);
    assert_eq!(reply["data"]["circle"], "circle-test");
    let grant = wallet.permissions().get(TEST_ORIGIN).await.unwrap().unwrap();
    assert_eq!(
        grant.capabilities,
        vec![WalletCapability::ViewAddress, WalletCapability::InvokeCircle]
    );
}

#[tokio::test]
async fn filesystem_wallet_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let env = TestEnv::new(13);
    let mut config = WardenConfig::default();
    config.storage.backend = StorageBackend::Filesystem;
    config.storage.path = Some(dir.path().to_path_buf());

    let first = WalletServiceBuilder::new()
        .with_config(config.clone())
        .with_signer(env.signer_dyn())
        .build()
        .await
        .unwrap();
    answer_all(&first, ApprovalDecision::Approve);
    first.connect(TEST_ORIGIN, &connection_request()).await.unwrap();
    let cap = first
        .request_capability(TEST_ORIGIN, &capability_request(&["get_balance"], "read"))
        .await
        .unwrap();
    drop(first);

    let second = WalletServiceBuilder::new()
        .with_config(config)
        .with_signer(env.signer_dyn())
        .build()
        .await
        .unwrap();
    let listed = second.list_capabilities(TEST_ORIGIN).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, cap.id);
    assert!(second.permissions().get(TEST_ORIGIN).await.unwrap().is_some());
}

#[tokio::test]
async fn builder_requires_a_signer_and_valid_config() {
    assert_matches!(
        WalletServiceBuilder::new().build().await.err(),
        Some(WardenError::Validation { .. })
    );

    let env = TestEnv::new(14);
    let mut config = WardenConfig::default();
    config.storage.backend = StorageBackend::Filesystem;
    assert_matches!(
        WalletServiceBuilder::new()
            .with_config(config)
            .with_signer(env.signer_dyn())
            .build()
            .await
            .err(),
        Some(WardenError::Validation { .. })
    );
}
