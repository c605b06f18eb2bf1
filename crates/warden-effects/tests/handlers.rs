//! Handlers working together through the core effect traits

use std::sync::Arc;
use warden_core::config::SignatureBackend;
use warden_core::domain::{domain_hash, DomainContext};
use warden_core::effects::{CryptoEffects, SessionContext, WalletSigner};
use warden_core::WardenError;
use warden_effects::{LocalWalletSigner, RealCryptoHandler, SeededRandomHandler};

fn context(origin: &str) -> SessionContext {
    SessionContext {
        circle_id: "circle-a".into(),
        origin: origin.into(),
        epoch: 4,
    }
}

#[tokio::test]
async fn signer_output_verifies_on_every_backend() {
    let signer = LocalWalletSigner::from_secret_bytes(&[11u8; 32]);
    let digest = domain_hash(DomainContext::CapabilitySigning, b"{\"circle\":\"a\"}");
    let signature = signer.sign_digest(&digest).await.unwrap();

    for backend in [
        SignatureBackend::Auto,
        SignatureBackend::Native,
        SignatureBackend::Software,
    ] {
        let crypto = RealCryptoHandler::for_backend(backend);
        assert!(crypto
            .verify_digest(
                &digest,
                DomainContext::CapabilitySigning,
                &signature,
                &signer.public_key()
            )
            .await
            .unwrap());
    }
}

#[tokio::test]
async fn digest_from_another_domain_is_refused() {
    let signer = LocalWalletSigner::from_secret_bytes(&[11u8; 32]);
    let digest = domain_hash(DomainContext::CapabilitySigning, b"{}");
    let signature = signer.sign_digest(&digest).await.unwrap();

    let crypto = RealCryptoHandler::new();
    let err = crypto
        .verify_digest(
            &digest,
            DomainContext::InvocationSigning,
            &signature,
            &signer.public_key(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::DomainSeparation { .. }));
}

#[tokio::test]
async fn session_keys_bind_their_context() {
    let signer = LocalWalletSigner::from_secret_bytes(&[12u8; 32]);
    let crypto = RealCryptoHandler::new();
    let secret = signer.session_secret();

    let a = crypto
        .derive_session_key(secret.as_slice(), &context("https://a.example"))
        .await
        .unwrap();
    let again = crypto
        .derive_session_key(secret.as_slice(), &context("https://a.example"))
        .await
        .unwrap();
    let b = crypto
        .derive_session_key(secret.as_slice(), &context("https://b.example"))
        .await
        .unwrap();

    assert_eq!(a, again);
    assert_ne!(a, b);
    assert!(!format!("{a:?}").contains(&hex::encode(a.as_bytes())));
}

#[tokio::test]
async fn request_nonces_are_unique_and_reproducible_when_seeded() {
    let crypto = RealCryptoHandler::new();
    let first = crypto.generate_nonce().await;
    let second = crypto.generate_nonce().await;
    assert_ne!(first, second);
    assert_eq!(first.as_str().len(), 32);

    let seeded = |seed| {
        RealCryptoHandler::new().with_random(Arc::new(SeededRandomHandler::new(seed)))
    };
    assert_eq!(
        seeded(9).generate_nonce().await,
        seeded(9).generate_nonce().await
    );
}
