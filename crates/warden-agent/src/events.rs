//! Wallet event bus
//!
//! Subscribers are called synchronously, in subscription order, on the
//! emitting task. A subscriber that errors or panics is logged and skipped;
//! the emitter and the remaining subscribers are unaffected.

use crate::approval::ApprovalKind;
use parking_lot::RwLock;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use warden_core::types::{CapabilityId, RequestNonce, SessionId};
use warden_core::Result;

/// Something observable happened in the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WalletEvent {
    /// A request is waiting for the user
    #[serde(rename_all = "camelCase")]
    ApprovalRequested {
        /// Correlation id to resolve with
        request_id: RequestNonce,
        /// What is being asked
        kind: ApprovalKind,
        /// Asking origin
        origin: String,
    },
    /// A request was not answered in time
    #[serde(rename_all = "camelCase")]
    ApprovalTimedOut {
        /// Correlation id of the abandoned request
        request_id: RequestNonce,
        /// What was asked
        kind: ApprovalKind,
        /// Asking origin
        origin: String,
    },
    /// An application connected
    #[serde(rename_all = "camelCase")]
    Connected {
        /// Connected origin
        origin: String,
        /// Session handed out
        session_id: SessionId,
    },
    /// An application disconnected
    Disconnected {
        /// Disconnected origin
        origin: String,
    },
    /// A capability was issued
    #[serde(rename_all = "camelCase")]
    CapabilityIssued {
        /// New capability
        capability_id: CapabilityId,
        /// Origin it is bound to
        origin: String,
    },
    /// A capability was replaced by a renewal
    CapabilityRenewed {
        /// Revoked capability
        previous: CapabilityId,
        /// Its replacement
        current: CapabilityId,
    },
    /// A capability was revoked
    #[serde(rename_all = "camelCase")]
    CapabilityRevoked {
        /// Revoked capability
        capability_id: CapabilityId,
    },
    /// An invocation passed validation
    #[serde(rename_all = "camelCase")]
    InvocationAuthorized {
        /// Capability used
        capability_id: CapabilityId,
        /// Method called
        method: String,
        /// Nonce consumed
        nonce: u64,
    },
    /// An invocation was refused
    #[serde(rename_all = "camelCase")]
    InvocationRejected {
        /// Capability named by the call
        capability_id: CapabilityId,
        /// Error code
        code: String,
    },
}

/// Receives wallet events
pub trait EventSubscriber: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &WalletEvent) -> Result<()>;
}

impl<F> EventSubscriber for F
where
    F: Fn(&WalletEvent) -> Result<()> + Send + Sync,
{
    fn on_event(&self, event: &WalletEvent) -> Result<()> {
        self(event)
    }
}

/// Handle for removing a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out of wallet events
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn EventSubscriber>)>>,
}

impl EventBus {
    /// Bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, subscriber));
        id
    }

    /// Remove a subscriber; false if it was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `event` to every subscriber; returns how many handled it cleanly
    pub fn emit(&self, event: &WalletEvent) -> usize {
        // Snapshot so subscribers may (un)subscribe or re-enter the wallet
        let subscribers = self.subscribers.read().clone();
        let mut delivered = 0;
        for (id, subscriber) in subscribers {
            match panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    tracing::warn!(subscriber = id.0, error = %err, "event subscriber failed");
                }
                Err(_) => {
                    tracing::error!(subscriber = id.0, "event subscriber panicked");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use warden_core::WardenError;

    fn event() -> WalletEvent {
        WalletEvent::Disconnected {
            origin: "https://app.example".into(),
        }
    }

    #[test]
    fn failing_subscribers_do_not_stop_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(Arc::new(|_: &WalletEvent| -> Result<()> {
            Err(WardenError::internal("boom"))
        }));
        bus.subscribe(Arc::new(|_: &WalletEvent| -> Result<()> {
            panic!("subscriber bug");
        }));
        let sink = seen.clone();
        bus.subscribe(Arc::new(move |e: &WalletEvent| -> Result<()> {
            sink.lock().push(e.clone());
            Ok(())
        }));

        assert_eq!(bus.emit(&event()), 1);
        assert_eq!(seen.lock().as_slice(), &[event()]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let id = bus.subscribe(Arc::new(move |_: &WalletEvent| -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        bus.emit(&event());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&event());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_value(event()).unwrap();
        assert_eq!(json["event"], "disconnected");
        assert_eq!(json["origin"], "https://app.example");
    }
}
