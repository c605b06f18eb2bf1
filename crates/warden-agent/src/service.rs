//! The wallet service
//!
//! Ties the authorization layer to sessions, approvals and events. Every
//! operation takes the caller's origin as reported by the transport; the
//! origin inside a request body is never trusted on its own.

use crate::approval::{ApprovalBroker, ApprovalKind, PendingApproval};
use crate::events::{EventBus, WalletEvent};
use crate::executor::{AuthorizedCall, InvocationExecutor};
use crate::session::{Session, SessionRegistry};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use warden_authorization::{
    Authorized, CapabilityManager, InvocationGate, InvocationSigner, PermissionStore,
};
use warden_core::config::WardenConfig;
use warden_core::effects::{CryptoEffects, PhysicalTimeEffects, SessionContext, WalletSigner};
use warden_core::hash::digests_equal;
use warden_core::messages::{
    CapabilityRequest, Connection, ConnectionRequest, InvocationRequest, InvocationResult,
    Response, WalletRequest,
};
use warden_core::types::{
    Capability, CapabilityId, PayloadEncoding, SessionId, SignedInvocation, WalletCapability,
};
use warden_core::{Result, WardenError};

/// Permissions granted when a connection request names none
pub const DEFAULT_CONNECTION_PERMISSIONS: [WalletCapability; 2] =
    [WalletCapability::ViewAddress, WalletCapability::InvokeCircle];

/// Wallet-side request handling for connected applications
pub struct WalletService {
    pub(crate) config: WardenConfig,
    pub(crate) crypto: Arc<dyn CryptoEffects>,
    pub(crate) signer: Arc<dyn WalletSigner>,
    pub(crate) time: Arc<dyn PhysicalTimeEffects>,
    pub(crate) capabilities: CapabilityManager,
    pub(crate) permissions: PermissionStore,
    pub(crate) invocation_signer: InvocationSigner,
    pub(crate) gate: InvocationGate,
    pub(crate) executor: Arc<dyn InvocationExecutor>,
    pub(crate) approvals: Arc<ApprovalBroker>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) events: Arc<EventBus>,
}

impl WalletService {
    /// Configuration in force
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Event bus
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Pending approvals
    pub fn approvals(&self) -> &Arc<ApprovalBroker> {
        &self.approvals
    }

    /// Open sessions
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Capability lifecycle
    pub fn capabilities(&self) -> &CapabilityManager {
        &self.capabilities
    }

    /// Per-origin permissions
    pub fn permissions(&self) -> &PermissionStore {
        &self.permissions
    }

    async fn approve(&self, kind: ApprovalKind, origin: &str, detail: Value) -> Result<()> {
        let request_id = self.crypto.generate_nonce().await;
        let waiter = self.approvals.open(PendingApproval {
            id: request_id.clone(),
            kind,
            origin: origin.to_string(),
            detail,
            opened_at: self.time.now_ms().await,
        })?;
        self.events.emit(&WalletEvent::ApprovalRequested {
            request_id: request_id.clone(),
            kind,
            origin: origin.to_string(),
        });
        let result = waiter.wait().await;
        if let Err(WardenError::Timeout { .. }) = &result {
            self.events.emit(&WalletEvent::ApprovalTimedOut {
                request_id,
                kind,
                origin: origin.to_string(),
            });
        }
        result
    }

    fn ensure_owner(capability: &Capability, origin: &str) -> Result<()> {
        if capability.payload.app_origin != origin {
            return Err(WardenError::OriginMismatch {
                expected: capability.payload.app_origin.clone(),
                actual: origin.to_string(),
            });
        }
        Ok(())
    }

    /// Connect `origin`. First-time origins need the user's approval; an
    /// origin with a live permission grant reconnects directly.
    pub async fn connect(&self, origin: &str, request: &ConnectionRequest) -> Result<Connection> {
        request.validate()?;
        if request.app_origin != origin {
            return Err(WardenError::OriginMismatch {
                expected: origin.to_string(),
                actual: request.app_origin.clone(),
            });
        }

        if self.permissions.get(origin).await?.is_none() {
            self.approve(ApprovalKind::Connection, origin, serde_json::to_value(request)?)
                .await?;
            let requested = request
                .requested_capabilities
                .clone()
                .unwrap_or_else(|| DEFAULT_CONNECTION_PERMISSIONS.to_vec());
            self.permissions
                .grant(
                    origin,
                    request.app_name.as_deref().unwrap_or(origin),
                    request.app_icon.clone(),
                    &requested,
                    None,
                )
                .await?;
        }

        let network = &self.config.network;
        let secret = self.signer.session_secret();
        let key = self
            .crypto
            .derive_session_key(
                secret.as_slice(),
                &SessionContext {
                    circle_id: request.circle.clone(),
                    origin: origin.to_string(),
                    epoch: network.epoch,
                },
            )
            .await?;
        let session = Session {
            id: SessionId::new(),
            origin: origin.to_string(),
            circle: request.circle.clone(),
            key_fingerprint: key.fingerprint(),
            opened_at: self.time.now_ms().await,
        };
        self.sessions.open(session.clone());
        self.permissions.touch(origin).await?;

        tracing::info!(origin, session = %session.id, circle = %session.circle, "application connected");
        self.events.emit(&WalletEvent::Connected {
            origin: origin.to_string(),
            session_id: session.id,
        });
        Ok(Connection {
            circle: session.circle,
            session_id: session.id,
            wallet_pub_key: self.signer.public_key(),
            evm_address: network.evm_address.clone(),
            network: network.name.clone(),
            epoch: Some(network.epoch),
            branch_id: Some(network.default_branch.clone()),
        })
    }

    /// Close the session for `origin`. Permissions and capabilities stay.
    pub async fn disconnect(&self, origin: &str) -> Result<bool> {
        let closed = self.sessions.close(origin).is_some();
        if closed {
            tracing::info!(origin, "application disconnected");
            self.events.emit(&WalletEvent::Disconnected {
                origin: origin.to_string(),
            });
        }
        Ok(closed)
    }

    /// Ask the user for a capability and issue it
    pub async fn request_capability(
        &self,
        origin: &str,
        request: &CapabilityRequest,
    ) -> Result<Capability> {
        let session = self.sessions.require(origin)?;
        request.validate()?;
        if request.circle != session.circle {
            return Err(WardenError::scope_violation(format!(
                "session is bound to circle {}, request names {}",
                session.circle, request.circle
            )));
        }
        if !self
            .permissions
            .has_capability(origin, WalletCapability::InvokeCircle)
            .await?
        {
            return Err(WardenError::capability(format!(
                "{origin} is not permitted to request capabilities"
            )));
        }

        self.approve(ApprovalKind::Capability, origin, serde_json::to_value(request)?)
            .await?;
        let capability = self.capabilities.request_capability(origin, request).await?;
        self.events.emit(&WalletEvent::CapabilityIssued {
            capability_id: capability.id.clone(),
            origin: origin.to_string(),
        });
        Ok(capability)
    }

    /// Renew a capability owned by `origin`
    pub async fn renew_capability(
        &self,
        origin: &str,
        id: &CapabilityId,
        ttl_seconds: Option<u64>,
    ) -> Result<Capability> {
        Self::ensure_owner(&self.capabilities.get(id).await?, origin)?;
        let renewed = self.capabilities.renew(id, ttl_seconds).await?;
        self.events.emit(&WalletEvent::CapabilityRenewed {
            previous: id.clone(),
            current: renewed.id.clone(),
        });
        Ok(renewed)
    }

    /// Revoke a capability owned by `origin`
    pub async fn revoke_capability(&self, origin: &str, id: &CapabilityId) -> Result<Capability> {
        Self::ensure_owner(&self.capabilities.get(id).await?, origin)?;
        let revoked = self.capabilities.revoke(id).await?;
        self.events.emit(&WalletEvent::CapabilityRevoked {
            capability_id: id.clone(),
        });
        Ok(revoked)
    }

    /// Capabilities bound to `origin`
    pub async fn list_capabilities(&self, origin: &str) -> Result<Vec<Capability>> {
        self.capabilities.list_for_origin(origin).await
    }

    /// Sign `request` with the wallet key, authorize it and run it
    pub async fn invoke(&self, origin: &str, request: &InvocationRequest) -> Result<InvocationResult> {
        self.sessions.require(origin)?;
        let capability = self.capabilities.get(&request.capability_id).await?;
        Self::ensure_owner(&capability, origin)?;
        let payload = PayloadEncoding::from_json(request.payload.clone());
        let invocation = self
            .invocation_signer
            .sign_invocation(&capability, origin, &request.method, &payload)
            .await?;

        match self.gate.authorize(&invocation, origin).await {
            Ok(authorized) => self.execute(origin, authorized, invocation, Some(payload)).await,
            Err(err) => {
                self.invocation_signer.release(&invocation).await;
                self.rejected(&invocation, &err);
                Err(err)
            }
        }
    }

    /// Authorize and run an invocation the application already holds signed
    pub async fn submit_signed(
        &self,
        origin: &str,
        invocation: &SignedInvocation,
        payload: Option<Value>,
    ) -> Result<InvocationResult> {
        self.sessions.require(origin)?;
        let payload = payload.map(PayloadEncoding::from_json);
        if let Some(payload) = &payload {
            if !digests_equal(&payload.payload_hash()?, &invocation.body.payload_hash) {
                return Err(WardenError::validation(
                    "payload does not match the invocation's payloadHash",
                ));
            }
            if !payload.is_opaque() {
                let capability = self.capabilities.get(&invocation.body.capability_id).await?;
                if capability.payload.encrypted {
                    return Err(WardenError::validation(
                        "encrypted capabilities accept only raw or serialized-array payloads",
                    ));
                }
            }
        }

        match self.gate.authorize(invocation, origin).await {
            Ok(authorized) => {
                self.execute(origin, authorized, invocation.clone(), payload)
                    .await
            }
            Err(err) => {
                self.rejected(invocation, &err);
                Err(err)
            }
        }
    }

    fn rejected(&self, invocation: &SignedInvocation, err: &WardenError) {
        self.events.emit(&WalletEvent::InvocationRejected {
            capability_id: invocation.body.capability_id.clone(),
            code: err.code().as_str().to_string(),
        });
    }

    async fn execute(
        &self,
        origin: &str,
        authorized: Authorized,
        invocation: SignedInvocation,
        payload: Option<PayloadEncoding>,
    ) -> Result<InvocationResult> {
        self.permissions.touch(origin).await?;
        self.events.emit(&WalletEvent::InvocationAuthorized {
            capability_id: authorized.capability_id.clone(),
            method: authorized.method.clone(),
            nonce: authorized.nonce,
        });

        let call = AuthorizedCall {
            authorized,
            invocation,
            payload,
        };
        match self.executor.execute(&call).await {
            Ok(outcome) => Ok(InvocationResult {
                success: true,
                data: outcome.data,
                error: None,
                branch_proof_hash: outcome.branch_proof_hash,
                merkle_root: outcome.merkle_root,
                epoch_tag: outcome.epoch_tag,
            }),
            Err(err) => {
                tracing::warn!(
                    capability = %call.authorized.capability_id,
                    method = %call.authorized.method,
                    code = err.code().as_str(),
                    error = %err,
                    "authorized invocation failed in execution"
                );
                Ok(InvocationResult::failure(&err))
            }
        }
    }

    /// Dispatch a typed request and shape the reply for the wire
    pub async fn handle(&self, origin: &str, request: WalletRequest) -> Value {
        match request {
            WalletRequest::Connect(request) => respond(self.connect(origin, &request).await),
            WalletRequest::Disconnect => respond(self.disconnect(origin).await),
            WalletRequest::RequestCapability(request) => {
                respond(self.request_capability(origin, &request).await)
            }
            WalletRequest::RenewCapability {
                capability_id,
                ttl_seconds,
            } => respond(
                self.renew_capability(origin, &capability_id, ttl_seconds)
                    .await,
            ),
            WalletRequest::RevokeCapability { capability_id } => {
                respond(self.revoke_capability(origin, &capability_id).await)
            }
            WalletRequest::Invoke(request) => invocation_reply(self.invoke(origin, &request).await),
            WalletRequest::SubmitInvocation {
                invocation,
                payload,
            } => invocation_reply(self.submit_signed(origin, &invocation, payload).await),
        }
    }

    /// Parse a raw JSON request and dispatch it
    pub async fn handle_json(&self, origin: &str, request: Value) -> Value {
        match serde_json::from_value::<WalletRequest>(request) {
            Ok(request) => self.handle(origin, request).await,
            Err(err) => {
                let err = WardenError::validation(format!("malformed request: {err}"));
                respond::<()>(Err(err))
            }
        }
    }
}

fn respond<T: Serialize>(result: Result<T>) -> Value {
    to_wire(&Response::from(result))
}

fn invocation_reply(result: Result<InvocationResult>) -> Value {
    match result {
        Ok(result) => to_wire(&result),
        Err(err) => to_wire(&InvocationResult::failure(&err)),
    }
}

fn to_wire<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        let err = WardenError::from(err);
        json!({ "success": false, "error": err.to_wire_string() })
    })
}
