//! Shared test environment and sample messages

use crate::keys::test_signer;
use std::sync::Arc;
use warden_core::effects::{
    CryptoEffects, PhysicalTimeEffects, RandomEffects, StorageEffects, WalletSigner,
};
use warden_core::messages::{CapabilityRequest, ConnectionRequest};
use warden_core::types::WalletCapability;
use warden_effects::{
    LocalWalletSigner, MemoryStorageHandler, RealCryptoHandler, SeededRandomHandler,
    SimulatedTimeHandler,
};

/// Origin used by fixtures
pub const TEST_ORIGIN: &str = "https://dapp.example";

/// A second origin for mismatch tests
pub const OTHER_ORIGIN: &str = "https://evil.example";

/// Circle used by fixtures
pub const TEST_CIRCLE: &str = "circle-test";

/// Clock start for fixtures (ms)
pub const START_TIME_MS: u64 = 1_700_000_000_000;

/// Deterministic effect bundle
///
/// The concrete handles stay reachable so tests can drive the clock or
/// inspect storage; the `*_dyn` accessors hand out trait objects for wiring.
#[derive(Clone)]
pub struct TestEnv {
    /// Wallet key
    pub signer: Arc<LocalWalletSigner>,
    /// Crypto over seeded randomness
    pub crypto: Arc<RealCryptoHandler>,
    /// Controllable clock
    pub time: Arc<SimulatedTimeHandler>,
    /// In-memory storage
    pub storage: Arc<MemoryStorageHandler>,
}

impl TestEnv {
    /// Environment whose key and randomness follow from `seed`
    pub fn new(seed: u64) -> Self {
        Self::at(seed, START_TIME_MS)
    }

    /// Environment with the clock at `start_ms`
    pub fn at(seed: u64, start_ms: u64) -> Self {
        let random: Arc<dyn RandomEffects> = Arc::new(SeededRandomHandler::new(seed));
        Self {
            signer: Arc::new(test_signer(seed)),
            crypto: Arc::new(RealCryptoHandler::new().with_random(random)),
            time: Arc::new(SimulatedTimeHandler::new(start_ms)),
            storage: Arc::new(MemoryStorageHandler::new()),
        }
    }

    /// Wallet key as a trait object
    pub fn signer_dyn(&self) -> Arc<dyn WalletSigner> {
        self.signer.clone()
    }

    /// Crypto as a trait object
    pub fn crypto_dyn(&self) -> Arc<dyn CryptoEffects> {
        self.crypto.clone()
    }

    /// Clock as a trait object
    pub fn time_dyn(&self) -> Arc<dyn PhysicalTimeEffects> {
        self.time.clone()
    }

    /// Storage as a trait object
    pub fn storage_dyn(&self) -> Arc<dyn StorageEffects> {
        self.storage.clone()
    }

    /// Current simulated time (ms)
    pub fn now(&self) -> u64 {
        self.time.get_time()
    }

    /// Move the clock forward
    pub fn advance(&self, ms: u64) {
        self.time.advance_time(ms);
    }
}

/// Capability request for `methods` under `scope` in the test circle
pub fn capability_request(methods: &[&str], scope: &str) -> CapabilityRequest {
    CapabilityRequest {
        circle: TEST_CIRCLE.into(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        scope: scope.into(),
        encrypted: false,
        ttl_seconds: Some(3600),
        branch_id: None,
    }
}

/// Connection request from the test origin
pub fn connection_request() -> ConnectionRequest {
    ConnectionRequest {
        circle: TEST_CIRCLE.into(),
        app_origin: TEST_ORIGIN.into(),
        app_name: Some("Test dApp".into()),
        app_icon: None,
        requested_capabilities: Some(vec![
            WalletCapability::ViewAddress,
            WalletCapability::InvokeCircle,
        ]),
    }
}
