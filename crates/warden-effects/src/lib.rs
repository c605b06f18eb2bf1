//! Warden Effects - effect handler implementations
//!
//! Production handlers (OS randomness, system clock, filesystem storage,
//! Ed25519 with native and software verifiers) and their deterministic
//! counterparts for tests and simulation.

#![forbid(unsafe_code)]

pub mod crypto;
pub mod logging;
pub mod random;
pub mod signer;
pub mod storage;
pub mod time;

pub use crypto::{
    Ed25519Verifier, NativeVerifier, RealCryptoHandler, SoftwareVerifier, VerifyOutcome,
};
pub use logging::init_logging;
pub use random::{OsRandomHandler, SeededRandomHandler};
pub use signer::LocalWalletSigner;
pub use storage::{FilesystemStorageHandler, MemoryStorageHandler};
pub use time::{RealTimeHandler, SimulatedTimeHandler};
