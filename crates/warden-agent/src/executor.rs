//! Execution of authorized calls
//!
//! What a method actually does (chain RPC, circle computation) lives outside
//! the wallet core. The service hands each authorized call to an
//! [`InvocationExecutor`] and reports its outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use warden_authorization::Authorized;
use warden_core::types::{PayloadEncoding, SignedInvocation};
use warden_core::Result;

/// A call that passed validation
#[derive(Debug, Clone)]
pub struct AuthorizedCall {
    /// Validation receipt
    pub authorized: Authorized,
    /// The signed invocation
    pub invocation: SignedInvocation,
    /// Decoded payload, when the caller supplied it
    pub payload: Option<PayloadEncoding>,
}

/// Result of running a call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    /// Method result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Hash of the branch proof, if the executor produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_proof_hash: Option<String>,
    /// Merkle root after execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    /// Epoch the call executed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_tag: Option<u64>,
}

/// Runs authorized calls
#[async_trait]
pub trait InvocationExecutor: Send + Sync {
    /// Execute `call`
    async fn execute(&self, call: &AuthorizedCall) -> Result<ExecutionOutcome>;
}

/// Executor that only acknowledges the call
///
/// Useful where no backend is attached: the result echoes what was
/// authorized and tags it with the invocation's epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcknowledgeExecutor;

#[async_trait]
impl InvocationExecutor for AcknowledgeExecutor {
    async fn execute(&self, call: &AuthorizedCall) -> Result<ExecutionOutcome> {
        Ok(ExecutionOutcome {
            data: Some(json!({
                "capabilityId": call.authorized.capability_id,
                "method": call.authorized.method,
                "nonce": call.authorized.nonce,
                "payloadHash": hex::encode(call.invocation.body.payload_hash),
            })),
            epoch_tag: Some(call.invocation.header.epoch),
            ..ExecutionOutcome::default()
        })
    }
}
