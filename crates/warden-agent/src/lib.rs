//! Warden Agent - the wallet service
//!
//! Connects applications, asks the user to approve connections and
//! capability requests, and signs, authorizes and runs invocations on their
//! behalf. Build one with [`WalletServiceBuilder`]:
//!
//! ```rust,ignore
//! let service = WalletServiceBuilder::new()
//!     .with_config(config)
//!     .with_signer(signer)
//!     .build()
//!     .await?;
//! ```
//!
//! Approvals surface as [`WalletEvent::ApprovalRequested`] on the event bus
//! and are answered through [`ApprovalBroker::resolve`].

#![forbid(unsafe_code)]

pub mod approval;
pub mod builder;
pub mod events;
pub mod executor;
pub mod service;
pub mod session;

pub use approval::{ApprovalBroker, ApprovalDecision, ApprovalKind, PendingApproval};
pub use builder::WalletServiceBuilder;
pub use events::{EventBus, EventSubscriber, SubscriptionId, WalletEvent};
pub use executor::{AcknowledgeExecutor, AuthorizedCall, ExecutionOutcome, InvocationExecutor};
pub use service::{WalletService, DEFAULT_CONNECTION_PERMISSIONS};
pub use session::{Session, SessionRegistry};
