//! Effect interfaces
//!
//! Anything that touches the outside world (randomness, clocks, storage, key
//! material, signature primitives) is reached through these traits. Handlers
//! live in `warden-effects`; services receive them as `Arc<dyn Trait>`.

pub mod crypto;
pub mod random;
pub mod signer;
pub mod storage;
pub mod time;

pub use crypto::{CryptoEffects, SessionContext, SessionKey};
pub use random::RandomEffects;
pub use signer::WalletSigner;
pub use storage::StorageEffects;
pub use time::PhysicalTimeEffects;
