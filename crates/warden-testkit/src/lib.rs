//! Warden Testing Infrastructure
//!
//! Deterministic fixtures shared across the workspace's tests: wallet keys
//! derived from a seed, a simulated clock, in-memory storage and seeded
//! randomness bundled as a [`TestEnv`], plus sample requests and proptest
//! strategies.
//!
//! ```toml
//! [dev-dependencies]
//! warden-testkit = { path = "../warden-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod keys;
pub mod strategies;

pub use fixtures::*;
pub use keys::{test_signer, test_signer_from_label};
