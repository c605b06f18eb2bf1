//! Pure synchronous hashing
//!
//! Hashing is deterministic and side-effect free, so it is not an effect.
//! SHA-256 is the single digest used across the protocol: capability ids,
//! signing digests, origin bindings and payload hashes all go through
//! [`hash`]. There is deliberately no weaker fallback.
//!
//! ```
//! use warden_core::hash::{hash, hasher};
//!
//! let digest = hash(b"hello world");
//! let mut h = hasher();
//! h.update(b"hello");
//! h.update(b" world");
//! assert_eq!(h.finalize(), digest);
//! ```

use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Synchronous hashing interface
pub trait HashAlgorithm: Send + Sync + fmt::Debug {
    /// Hash arbitrary bytes to a 32-byte digest
    fn hash(&self, data: &[u8]) -> [u8; 32];

    /// Create an incremental hasher for multi-part hashing
    fn hasher(&self) -> Box<dyn Hasher>;

    /// Algorithm name, for diagnostics
    fn name(&self) -> &'static str;
}

/// Incremental hashing of multi-part data
pub trait Hasher: Send {
    /// Update the hasher with more data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hasher and return the 32-byte digest
    fn finalize(self: Box<Self>) -> [u8; 32];
}

/// SHA-256 (FIPS 180-4)
#[derive(Debug, Clone, Copy)]
pub struct Sha256Algorithm;

impl HashAlgorithm for Sha256Algorithm {
    fn hash(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    fn hasher(&self) -> Box<dyn Hasher> {
        Box::new(Sha256Hasher(Sha256::new()))
    }

    fn name(&self) -> &'static str {
        "SHA-256"
    }
}

struct Sha256Hasher(Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> [u8; 32] {
        self.0.finalize().into()
    }
}

/// The protocol hash algorithm
pub const ALGORITHM: Sha256Algorithm = Sha256Algorithm;

/// Hash bytes with the protocol algorithm
pub fn hash(data: &[u8]) -> [u8; 32] {
    ALGORITHM.hash(data)
}

/// Start an incremental hash with the protocol algorithm
pub fn hasher() -> Box<dyn Hasher> {
    ALGORITHM.hasher()
}

/// Lowercase hex of [`hash`]
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}

/// Compare two digests without short-circuiting on the first differing byte
pub fn digests_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.ct_eq(b).into()
}
