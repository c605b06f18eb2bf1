//! Ed25519 verification built directly on the curve arithmetic
//!
//! Used when no native verifier is available. Applies the same strictness
//! as the native path: canonical `s`, decompressible `R` and `A`, neither of
//! small order, and a cofactorless check `[s]B - [k]A == R` compared on the
//! canonical encoding.

use super::{Ed25519Verifier, VerifyOutcome};
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha512};

/// Pure-software RFC 8032 verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareVerifier;

impl SoftwareVerifier {
    fn check(signature: &[u8; 64], message: &[u8], public_key: &[u8; 32]) -> bool {
        let mut r_bytes = [0u8; 32];
        r_bytes.copy_from_slice(&signature[..32]);
        let mut s_bytes = [0u8; 32];
        s_bytes.copy_from_slice(&signature[32..]);

        let Some(s) = Option::<Scalar>::from(Scalar::from_canonical_bytes(s_bytes)) else {
            return false;
        };
        let Some(a) = CompressedEdwardsY(*public_key).decompress() else {
            return false;
        };
        let Some(r) = CompressedEdwardsY(r_bytes).decompress() else {
            return false;
        };
        if a.is_small_order() || r.is_small_order() {
            return false;
        }

        let mut hasher = Sha512::new();
        hasher.update(r_bytes);
        hasher.update(public_key);
        hasher.update(message);
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&hasher.finalize());
        let k = Scalar::from_bytes_mod_order_wide(&wide);

        let minus_a = -a;
        let expected = EdwardsPoint::vartime_double_scalar_mul_basepoint(&k, &minus_a, &s);
        expected.compress().as_bytes() == &r_bytes
    }
}

impl Ed25519Verifier for SoftwareVerifier {
    fn name(&self) -> &'static str {
        "software"
    }

    fn verify(&self, signature: &[u8; 64], message: &[u8], public_key: &[u8; 32]) -> VerifyOutcome {
        if Self::check(signature, message, public_key) {
            VerifyOutcome::Valid
        } else {
            VerifyOutcome::Invalid
        }
    }
}
