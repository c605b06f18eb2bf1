//! Capability signatures and identifiers

use warden_core::domain::DomainContext;
use warden_core::effects::{CryptoEffects, WalletSigner};
use warden_core::types::{Capability, CapabilityPayload};
use warden_core::{Result, WardenError};

/// Sign a payload with the wallet key and assemble the active capability
pub async fn sign_capability(
    signer: &dyn WalletSigner,
    payload: CapabilityPayload,
) -> Result<Capability> {
    payload.validate()?;
    if payload.wallet_pub_key != signer.public_key() {
        return Err(WardenError::validation(
            "payload names a different wallet key than the signer holds",
        ));
    }
    let signature = signer.sign_digest(&payload.signing_digest()).await?;
    Capability::issue(payload, signature)
}

/// Check that a capability's id and signature match its payload
pub async fn verify_capability(crypto: &dyn CryptoEffects, capability: &Capability) -> Result<()> {
    let expected = capability.payload.derive_id(&capability.signature)?;
    if expected != capability.id {
        return Err(WardenError::signature_invalid(format!(
            "capability id {} does not match its signed content",
            capability.id
        )));
    }
    let valid = crypto
        .verify_digest(
            &capability.payload.signing_digest(),
            DomainContext::CapabilitySigning,
            &capability.signature,
            &capability.payload.wallet_pub_key,
        )
        .await?;
    if !valid {
        return Err(WardenError::signature_invalid(format!(
            "capability {} signature does not verify",
            capability.id
        )));
    }
    Ok(())
}
