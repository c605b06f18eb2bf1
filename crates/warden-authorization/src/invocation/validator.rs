//! Invocation validation
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. capability state is ACTIVE
//! 2. capability has not expired (an expired one is moved to EXPIRED)
//! 3. origin hash and origin match the capability
//! 4. branch, then epoch
//! 5. circle, method and scope
//! 6. nonce is exactly `last_nonce + 1`
//! 7. wallet signature over the invocation digest
//!
//! A failed check leaves the capability untouched, except for the EXPIRED
//! transition in step 2.

use super::Authorized;
use std::sync::Arc;
use warden_core::domain::{origin_hash, DomainContext};
use warden_core::effects::{CryptoEffects, PhysicalTimeEffects};
use warden_core::hash::digests_equal;
use warden_core::types::{Capability, CapabilityState, MethodPolicy, SignedInvocation};
use warden_core::{Result, WardenError};

/// Validates signed invocations against their capability
pub struct InvocationValidator {
    crypto: Arc<dyn CryptoEffects>,
    time: Arc<dyn PhysicalTimeEffects>,
    policy: MethodPolicy,
}

impl InvocationValidator {
    /// Validator with the default method policy
    pub fn new(crypto: Arc<dyn CryptoEffects>, time: Arc<dyn PhysicalTimeEffects>) -> Self {
        Self::with_policy(crypto, time, MethodPolicy::default())
    }

    /// Validator with a custom method policy
    pub fn with_policy(
        crypto: Arc<dyn CryptoEffects>,
        time: Arc<dyn PhysicalTimeEffects>,
        policy: MethodPolicy,
    ) -> Self {
        Self {
            crypto,
            time,
            policy,
        }
    }

    /// Method policy in force
    pub fn policy(&self) -> &MethodPolicy {
        &self.policy
    }

    /// Validate `invocation` as called from `current_origin`.
    ///
    /// On success the capability's `last_nonce` and `last_updated` advance;
    /// the caller is responsible for persisting it.
    pub async fn validate(
        &self,
        invocation: &SignedInvocation,
        capability: &mut Capability,
        current_origin: &str,
    ) -> Result<Authorized> {
        let result = self.check(invocation, capability, current_origin).await;
        match &result {
            Ok(authorized) => tracing::debug!(
                capability = %capability.id,
                method = %authorized.method,
                nonce = authorized.nonce,
                "invocation authorized"
            ),
            Err(err) => tracing::warn!(
                capability = %capability.id,
                method = %invocation.body.method,
                nonce = invocation.header.nonce,
                code = err.code().as_str(),
                error = %err,
                "invocation rejected"
            ),
        }
        result
    }

    async fn check(
        &self,
        invocation: &SignedInvocation,
        capability: &mut Capability,
        current_origin: &str,
    ) -> Result<Authorized> {
        invocation.version()?;
        if invocation.body.capability_id != capability.id {
            return Err(WardenError::validation(format!(
                "invocation names capability {} but was checked against {}",
                invocation.body.capability_id, capability.id
            )));
        }
        let header = &invocation.header;
        let body = &invocation.body;

        match capability.state {
            CapabilityState::Active => {}
            CapabilityState::Expired => return Err(WardenError::expired(&capability.id)),
            CapabilityState::Revoked => return Err(WardenError::revoked(&capability.id)),
            state => {
                return Err(WardenError::capability(format!(
                    "capability {} is {state}",
                    capability.id
                )))
            }
        }

        let now = self.time.now_ms().await;
        if capability.is_expired_at(now) {
            capability.transition(CapabilityState::Expired, now)?;
            return Err(WardenError::expired(&capability.id));
        }

        let payload = &capability.payload;
        if !digests_equal(&header.origin_hash, &origin_hash(current_origin))
            || current_origin != payload.app_origin
        {
            return Err(WardenError::OriginMismatch {
                expected: payload.app_origin.clone(),
                actual: current_origin.to_string(),
            });
        }

        if header.branch_id != payload.branch_id {
            return Err(WardenError::BranchMismatch {
                expected: payload.branch_id.clone(),
                actual: header.branch_id.clone(),
            });
        }
        if header.epoch != payload.epoch {
            return Err(WardenError::EpochMismatch {
                expected: payload.epoch,
                actual: header.epoch,
            });
        }

        if header.circle_id != payload.circle {
            return Err(WardenError::scope_violation(format!(
                "circle {} is outside capability circle {}",
                header.circle_id, payload.circle
            )));
        }
        if !capability.allows_method(&body.method) {
            return Err(WardenError::scope_violation(format!(
                "method {} is not granted",
                body.method
            )));
        }
        let required = self.policy.required_scope(&body.method);
        if !payload.scope.permits(required) {
            return Err(WardenError::scope_violation(format!(
                "method {} needs {required} scope, capability grants {}",
                body.method, payload.scope
            )));
        }

        if capability.last_nonce.checked_add(1) != Some(header.nonce) {
            return Err(WardenError::NonceViolation {
                expected: capability.last_nonce.saturating_add(1),
                actual: header.nonce,
            });
        }

        let Some(signature) = invocation.signature else {
            return Err(WardenError::signature_invalid("invocation is unsigned"));
        };
        let valid = self
            .crypto
            .verify_digest(
                &invocation.signing_digest(),
                DomainContext::InvocationSigning,
                &signature,
                &payload.wallet_pub_key,
            )
            .await?;
        if !valid {
            return Err(WardenError::signature_invalid(
                "invocation signature does not verify against the wallet key",
            ));
        }

        capability.last_nonce = header.nonce;
        capability.last_updated = capability.last_updated.max(now);
        Ok(Authorized {
            capability_id: capability.id.clone(),
            method: body.method.clone(),
            nonce: header.nonce,
            authorized_at: now,
        })
    }
}
