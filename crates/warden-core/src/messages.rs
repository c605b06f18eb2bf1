//! Request and response shapes exchanged with applications
//!
//! Transport is out of scope; these are the JSON shapes that cross it.

use crate::errors::{Result, WardenError};
use crate::types::{
    CapabilityId, PublicKeyBytes, Scope, SessionId, SignedInvocation, WalletCapability,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application asks to connect to the wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    /// Circle the application operates in
    pub circle: String,
    /// Origin of the requesting application
    pub app_origin: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Icon URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<String>,
    /// Wallet permissions the application wants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_capabilities: Option<Vec<WalletCapability>>,
}

impl ConnectionRequest {
    /// Reject empty circle or origin
    pub fn validate(&self) -> Result<()> {
        if self.circle.trim().is_empty() {
            return Err(WardenError::validation("circle must not be empty"));
        }
        if self.app_origin.trim().is_empty() {
            return Err(WardenError::validation("appOrigin must not be empty"));
        }
        Ok(())
    }
}

/// Established connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Connected circle
    pub circle: String,
    /// Session identifier
    pub session_id: SessionId,
    /// Wallet public key
    #[serde(with = "crate::serde_hex")]
    pub wallet_pub_key: PublicKeyBytes,
    /// Linked EVM address, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<String>,
    /// Network name
    pub network: String,
    /// Current epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    /// Current branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
}

/// Application asks for a capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRequest {
    /// Circle the capability is scoped to
    pub circle: String,
    /// Methods to authorize
    pub methods: Vec<String>,
    /// Requested scope: `read`, `write` or `compute`
    pub scope: String,
    /// Whether payloads will be opaque ciphertext
    #[serde(default)]
    pub encrypted: bool,
    /// Requested lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Branch to bind, defaulting to the wallet's current branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
}

impl CapabilityRequest {
    /// Check the request shape and return the parsed scope
    pub fn validate(&self) -> Result<Scope> {
        if self.circle.trim().is_empty() {
            return Err(WardenError::validation("circle must not be empty"));
        }
        if self.methods.is_empty() {
            return Err(WardenError::validation("methods must not be empty"));
        }
        if self.methods.iter().any(|m| m.trim().is_empty()) {
            return Err(WardenError::validation("method names must not be empty"));
        }
        if self.ttl_seconds == Some(0) {
            return Err(WardenError::validation("ttlSeconds must be positive"));
        }
        self.scope.parse()
    }
}

/// Unsigned call the wallet signs on the application's behalf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    /// Capability to invoke under
    pub capability_id: CapabilityId,
    /// Method name
    pub method: String,
    /// Payload in any accepted encoding
    #[serde(default)]
    pub payload: Value,
}

/// Outcome of an invocation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    /// Whether the call succeeded
    pub success: bool,
    /// Result data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Code-bearing error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hash of the branch proof, if the executor produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_proof_hash: Option<String>,
    /// Merkle root after execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    /// Epoch the result is tagged with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_tag: Option<u64>,
}

impl InvocationResult {
    /// Failed invocation
    pub fn failure(error: &WardenError) -> Self {
        Self {
            success: false,
            error: Some(error.to_wire_string()),
            ..Self::default()
        }
    }
}

/// Inbound wallet request, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WalletRequest {
    /// Open a session
    Connect(ConnectionRequest),
    /// Close the caller's session
    Disconnect,
    /// Ask for a new capability
    RequestCapability(CapabilityRequest),
    /// Renew an active capability
    #[serde(rename_all = "camelCase")]
    RenewCapability {
        /// Capability to renew
        capability_id: CapabilityId,
        /// New lifetime in seconds
        #[serde(default)]
        ttl_seconds: Option<u64>,
    },
    /// Revoke a capability
    #[serde(rename_all = "camelCase")]
    RevokeCapability {
        /// Capability to revoke
        capability_id: CapabilityId,
    },
    /// Have the wallet sign and run a call
    Invoke(InvocationRequest),
    /// Run a call that is already signed
    #[serde(rename_all = "camelCase")]
    SubmitInvocation {
        /// Signed invocation
        invocation: SignedInvocation,
        /// Payload whose hash the body commits to
        #[serde(default)]
        payload: Option<Value>,
    },
}

/// Uniform response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    /// Whether the request succeeded
    pub success: bool,
    /// Result on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Code-bearing error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Response<T> {
    /// Successful response
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response
    pub fn err(error: &WardenError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_wire_string()),
        }
    }
}

impl<T> From<Result<T>> for Response<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::err(&error),
        }
    }
}
