//! Wallet-side invocation signing

use crate::nonce::NonceManager;
use std::sync::Arc;
use warden_core::domain::origin_hash;
use warden_core::effects::{PhysicalTimeEffects, WalletSigner};
use warden_core::types::{
    Capability, InvocationBody, InvocationHeader, InvocationVersion, PayloadEncoding,
    SignedInvocation,
};
use warden_core::{Result, WardenError};

/// Builds and signs invocations on behalf of an application
pub struct InvocationSigner {
    signer: Arc<dyn WalletSigner>,
    nonces: Arc<NonceManager>,
    time: Arc<dyn PhysicalTimeEffects>,
}

impl InvocationSigner {
    /// Signer sharing `nonces` with the rest of the wallet
    pub fn new(
        signer: Arc<dyn WalletSigner>,
        nonces: Arc<NonceManager>,
        time: Arc<dyn PhysicalTimeEffects>,
    ) -> Self {
        Self {
            signer,
            nonces,
            time,
        }
    }

    /// Reserve the next nonce for `capability` and sign a call to `method`.
    ///
    /// Encrypted capabilities only carry opaque payloads. If signing fails
    /// the nonce reservation is rolled back.
    pub async fn sign_invocation(
        &self,
        capability: &Capability,
        origin: &str,
        method: &str,
        payload: &PayloadEncoding,
    ) -> Result<SignedInvocation> {
        if capability.payload.encrypted && !payload.is_opaque() {
            return Err(WardenError::validation(
                "encrypted capabilities accept only raw or serialized-array payloads",
            ));
        }
        if capability.payload.wallet_pub_key != self.signer.public_key() {
            return Err(WardenError::capability(format!(
                "capability {} was issued by another wallet key",
                capability.id
            )));
        }
        let payload_hash = payload.payload_hash()?;

        self.nonces.register(capability).await;
        let nonce = self.nonces.next_nonce(&capability.id).await?;
        let mut invocation = SignedInvocation::new(
            InvocationHeader {
                version: InvocationVersion::CURRENT.as_u16(),
                circle_id: capability.payload.circle.clone(),
                branch_id: capability.payload.branch_id.clone(),
                epoch: capability.payload.epoch,
                nonce,
                timestamp: self.time.now_ms().await,
                origin_hash: origin_hash(origin),
            },
            InvocationBody {
                capability_id: capability.id.clone(),
                method: method.to_string(),
                payload_hash,
            },
        );

        match self.signer.sign_digest(&invocation.signing_digest()).await {
            Ok(signature) => {
                invocation.signature = Some(signature);
                tracing::debug!(capability = %capability.id, method, nonce, "invocation signed");
                Ok(invocation)
            }
            Err(err) => {
                self.release(&invocation).await;
                Err(err)
            }
        }
    }

    /// Give back the nonce of an invocation that was never accepted.
    ///
    /// Only the latest reservation is returned; once a later nonce is out
    /// the released one stays burnt, so no nonce is ever handed out twice.
    pub async fn release(&self, invocation: &SignedInvocation) -> bool {
        let id = &invocation.body.capability_id;
        let nonce = invocation.header.nonce;
        let released = self.nonces.release(id, nonce).await;
        if !released {
            tracing::debug!(capability = %id, nonce, "nonce kept; a later reservation exists");
        }
        released
    }
}
