//! Capability issuance, persistence and lifecycle

pub mod lifecycle;
pub mod signing;
pub mod store;

pub use lifecycle::{CapabilityManager, IssueDefaults};
pub use signing::{sign_capability, verify_capability};
pub use store::CapabilityStore;
