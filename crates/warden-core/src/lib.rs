//! Warden Core - capability protocol foundation
//!
//! Pure types and interfaces shared by every Warden layer. Nothing in this
//! crate performs I/O; side effects are expressed as async effect traits and
//! implemented in `warden-effects`.
//!
//! # Contents
//!
//! - `canonical`: deterministic encoding used as the input to every hash
//! - `domain`: context prefixes that keep signatures from crossing purposes
//! - `hash`: SHA-256, the only digest in the protocol
//! - `types`: capabilities, invocations, scopes, payload encodings, grants
//! - `messages`: request/response shapes exchanged with applications
//! - `effects`: crypto, randomness, time, storage and signer interfaces
//! - `config`: TOML configuration with environment overrides

#![forbid(unsafe_code)]

/// Deterministic canonical encoding
pub mod canonical;

/// Runtime configuration
pub mod config;

/// Domain separation contexts
pub mod domain;

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// SHA-256 hashing
pub mod hash;

/// Wire message shapes
pub mod messages;

/// Protocol data model
pub mod types;

mod serde_hex;

pub use canonical::{canonicalize, Canonical, CanonicalError, CanonicalValue};
pub use config::WardenConfig;
pub use domain::{domain_hash, origin_hash, with_domain, DomainContext, DomainDigest};
pub use errors::{ErrorCode, Result, WardenError};
pub use hash::hash;
pub use types::*;
