//! Warden Authorization - capabilities and invocations
//!
//! Issues and manages capabilities, hands out nonces, and validates signed
//! invocations against the capability they claim. All state lives behind
//! [`warden_core::effects::StorageEffects`]; all keys behind
//! [`warden_core::effects::WalletSigner`].
//!
//! Per-capability work (nonce reservation, validation and the write that
//! consumes a nonce) is serialized with FIFO async locks, so concurrent
//! callers on one capability are served in arrival order.

#![forbid(unsafe_code)]

pub mod capability;
pub mod invocation;
pub mod locks;
pub mod nonce;
pub mod permissions;

pub use capability::{CapabilityManager, CapabilityStore};
pub use invocation::{Authorized, InvocationGate, InvocationSigner, InvocationValidator};
pub use locks::KeyedLocks;
pub use nonce::NonceManager;
pub use permissions::PermissionStore;
