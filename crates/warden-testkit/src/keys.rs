//! Deterministic wallet keys

use warden_core::hash::hash;
use warden_effects::LocalWalletSigner;

/// Wallet signer whose key is fixed by `seed`
pub fn test_signer(seed: u64) -> LocalWalletSigner {
    test_signer_from_label(&format!("warden-test-key-{seed}"))
}

/// Wallet signer whose key is fixed by a label
pub fn test_signer_from_label(label: &str) -> LocalWalletSigner {
    LocalWalletSigner::from_secret_bytes(&hash(label.as_bytes()))
}
