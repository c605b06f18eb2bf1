//! Wallet service builder

use crate::approval::ApprovalBroker;
use crate::events::EventBus;
use crate::executor::{AcknowledgeExecutor, InvocationExecutor};
use crate::service::WalletService;
use crate::session::SessionRegistry;
use std::sync::Arc;
use warden_authorization::capability::IssueDefaults;
use warden_authorization::{
    CapabilityManager, CapabilityStore, InvocationGate, InvocationSigner, InvocationValidator,
    NonceManager, PermissionStore,
};
use warden_core::config::{StorageBackend, WardenConfig};
use warden_core::effects::{CryptoEffects, PhysicalTimeEffects, StorageEffects, WalletSigner};
use warden_core::types::MethodPolicy;
use warden_core::{Result, WardenError};
use warden_effects::{
    FilesystemStorageHandler, MemoryStorageHandler, RealCryptoHandler, RealTimeHandler,
};

/// Builder for [`WalletService`]
///
/// Only the signer is required. Other effects default to the production
/// handlers selected by the configuration.
#[derive(Default)]
pub struct WalletServiceBuilder {
    config: WardenConfig,
    signer: Option<Arc<dyn WalletSigner>>,
    crypto: Option<Arc<dyn CryptoEffects>>,
    time: Option<Arc<dyn PhysicalTimeEffects>>,
    storage: Option<Arc<dyn StorageEffects>>,
    executor: Option<Arc<dyn InvocationExecutor>>,
    policy: Option<MethodPolicy>,
}

impl WalletServiceBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn with_config(mut self, config: WardenConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the wallet key
    pub fn with_signer(mut self, signer: Arc<dyn WalletSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Override the crypto handler
    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoEffects>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// Override the clock
    pub fn with_time(mut self, time: Arc<dyn PhysicalTimeEffects>) -> Self {
        self.time = Some(time);
        self
    }

    /// Override storage
    pub fn with_storage(mut self, storage: Arc<dyn StorageEffects>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Attach the backend that runs authorized calls
    pub fn with_executor(mut self, executor: Arc<dyn InvocationExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the method-to-scope policy
    pub fn with_method_policy(mut self, policy: MethodPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    async fn default_storage(config: &WardenConfig) -> Result<Arc<dyn StorageEffects>> {
        match config.storage.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryStorageHandler::new())),
            StorageBackend::Filesystem => {
                let path = config.storage.path.clone().ok_or_else(|| {
                    WardenError::validation("filesystem storage requires storage.path")
                })?;
                Ok(Arc::new(FilesystemStorageHandler::open(path).await?))
            }
        }
    }

    /// Wire the service
    pub async fn build(self) -> Result<WalletService> {
        self.config.validate()?;
        let signer = self
            .signer
            .ok_or_else(|| WardenError::validation("a wallet signer is required"))?;
        let crypto = self.crypto.unwrap_or_else(|| {
            Arc::new(RealCryptoHandler::for_backend(
                self.config.crypto.signature_backend,
            ))
        });
        let time = self
            .time
            .unwrap_or_else(|| Arc::new(RealTimeHandler::new()));
        let storage = match self.storage {
            Some(storage) => storage,
            None => Self::default_storage(&self.config).await?,
        };
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(AcknowledgeExecutor));

        let store = CapabilityStore::new(storage.clone());
        let nonces = Arc::new(NonceManager::new());
        let capabilities = CapabilityManager::new(
            crypto.clone(),
            signer.clone(),
            time.clone(),
            store.clone(),
            IssueDefaults::from_config(&self.config.capability, &self.config.network),
        )
        .with_nonces(nonces.clone());
        let validator = InvocationValidator::with_policy(
            crypto.clone(),
            time.clone(),
            self.policy.unwrap_or_default(),
        );

        tracing::info!(
            network = %self.config.network.name,
            epoch = self.config.network.epoch,
            backend = ?self.config.storage.backend,
            "wallet service ready"
        );

        Ok(WalletService {
            permissions: PermissionStore::new(storage, time.clone()),
            invocation_signer: InvocationSigner::new(signer.clone(), nonces.clone(), time.clone()),
            gate: InvocationGate::new(store, validator, nonces),
            approvals: Arc::new(ApprovalBroker::new(self.config.timeouts.clone())),
            sessions: SessionRegistry::new(),
            events: Arc::new(EventBus::new()),
            config: self.config,
            crypto,
            signer,
            time,
            capabilities,
            executor,
        })
    }
}
