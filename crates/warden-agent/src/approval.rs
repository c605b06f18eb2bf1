//! User approval of connection and capability requests
//!
//! Each request gets a random correlation id and a oneshot channel. The
//! requesting task waits on the channel with a deadline; the UI answers by
//! calling [`ApprovalBroker::resolve`]. An entry leaves the pending table
//! exactly once: when it is resolved, when it times out, or when the waiting
//! future is dropped. Answers that arrive afterwards are dropped.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use warden_core::config::TimeoutConfig;
use warden_core::types::{RequestNonce, TimestampMs};
use warden_core::{Result, WardenError};

/// What the user is asked to approve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalKind {
    /// An application wants to connect
    Connection,
    /// An application wants a capability
    Capability,
}

/// The user's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum ApprovalDecision {
    /// Go ahead
    Approve,
    /// Refuse, optionally saying why
    Reject {
        /// Reason shown to the application
        #[serde(default)]
        reason: Option<String>,
    },
}

/// A request awaiting the user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    /// Correlation id
    pub id: RequestNonce,
    /// Request kind
    pub kind: ApprovalKind,
    /// Requesting origin
    pub origin: String,
    /// Request body as shown to the user
    pub detail: serde_json::Value,
    /// When the request was opened (ms)
    pub opened_at: TimestampMs,
}

struct Entry {
    approval: PendingApproval,
    reply: oneshot::Sender<ApprovalDecision>,
}

/// Pending approvals keyed by correlation id
pub struct ApprovalBroker {
    timeouts: TimeoutConfig,
    pending: Mutex<HashMap<RequestNonce, Entry>>,
}

impl ApprovalBroker {
    /// Broker with the given deadlines
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self {
            timeouts,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Deadline for `kind` in milliseconds
    pub fn timeout_ms(&self, kind: ApprovalKind) -> u64 {
        match kind {
            ApprovalKind::Connection => self.timeouts.connection_request_ms,
            ApprovalKind::Capability => self.timeouts.capability_request_ms,
        }
    }

    /// Register a request; the returned waiter owns its pending entry
    pub fn open(&self, approval: PendingApproval) -> Result<ApprovalWaiter<'_>> {
        let (reply, receiver) = oneshot::channel();
        let id = approval.id.clone();
        let kind = approval.kind;
        let origin = approval.origin.clone();
        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&id) {
                return Err(WardenError::internal(format!(
                    "approval request {id} is already pending"
                )));
            }
            pending.insert(id.clone(), Entry { approval, reply });
        }
        tracing::debug!(request = %id, ?kind, origin = %origin, "approval requested");
        Ok(ApprovalWaiter {
            broker: self,
            id,
            kind,
            origin,
            receiver,
        })
    }

    /// Answer a pending request. Returns false if it is unknown, already
    /// answered, timed out or abandoned.
    pub fn resolve(&self, id: &RequestNonce, decision: ApprovalDecision) -> bool {
        let Some(entry) = self.pending.lock().remove(id) else {
            tracing::debug!(request = %id, "late or unknown approval dropped");
            return false;
        };
        if entry.reply.send(decision).is_err() {
            tracing::debug!(request = %id, "approval arrived after the requester left");
            return false;
        }
        true
    }

    /// Requests awaiting the user, oldest first
    pub fn pending(&self) -> Vec<PendingApproval> {
        let mut pending: Vec<_> = self
            .pending
            .lock()
            .values()
            .map(|entry| entry.approval.clone())
            .collect();
        pending.sort_by(|a, b| {
            a.opened_at
                .cmp(&b.opened_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        pending
    }

    /// Whether `id` is awaiting an answer
    pub fn is_pending(&self, id: &RequestNonce) -> bool {
        self.pending.lock().contains_key(id)
    }

    fn forget(&self, id: &RequestNonce) -> bool {
        self.pending.lock().remove(id).is_some()
    }
}

/// Waits for the answer to one request
pub struct ApprovalWaiter<'a> {
    broker: &'a ApprovalBroker,
    id: RequestNonce,
    kind: ApprovalKind,
    origin: String,
    receiver: oneshot::Receiver<ApprovalDecision>,
}

impl ApprovalWaiter<'_> {
    /// Correlation id
    pub fn id(&self) -> &RequestNonce {
        &self.id
    }

    /// Wait for the user. Rejection is `UserRejected`; no answer within the
    /// deadline is `Timeout`.
    pub async fn wait(mut self) -> Result<()> {
        let timeout_ms = self.broker.timeout_ms(self.kind);
        let answer =
            tokio::time::timeout(Duration::from_millis(timeout_ms), &mut self.receiver).await;
        match answer {
            Ok(Ok(ApprovalDecision::Approve)) => Ok(()),
            Ok(Ok(ApprovalDecision::Reject { reason })) => Err(WardenError::user_rejected(
                reason.unwrap_or_else(|| "user rejected the request".to_string()),
            )),
            Ok(Err(_)) => Err(WardenError::user_rejected("approval was abandoned")),
            Err(_) => {
                tracing::warn!(
                    request = %self.id,
                    kind = ?self.kind,
                    origin = %self.origin,
                    timeout_ms,
                    "approval timed out"
                );
                Err(WardenError::Timeout { timeout_ms })
            }
        }
    }
}

impl Drop for ApprovalWaiter<'_> {
    fn drop(&mut self) {
        if self.broker.forget(&self.id) {
            tracing::debug!(request = %self.id, "pending approval removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker(ms: u64) -> ApprovalBroker {
        ApprovalBroker::new(TimeoutConfig {
            capability_request_ms: ms,
            connection_request_ms: ms,
        })
    }

    fn approval(id: &str) -> PendingApproval {
        PendingApproval {
            id: RequestNonce::from_bytes(id.as_bytes()),
            kind: ApprovalKind::Capability,
            origin: "https://app.example".into(),
            detail: serde_json::Value::Null,
            opened_at: 0,
        }
    }

    #[tokio::test]
    async fn approve_and_reject() {
        let broker = broker(1_000);
        let waiter = broker.open(approval("a")).unwrap();
        let id = waiter.id().clone();
        assert!(broker.resolve(&id, ApprovalDecision::Approve));
        waiter.wait().await.unwrap();
        assert!(!broker.is_pending(&id));

        let waiter = broker.open(approval("b")).unwrap();
        let id = waiter.id().clone();
        assert!(broker.resolve(
            &id,
            ApprovalDecision::Reject {
                reason: Some("no".into())
            }
        ));
        assert_eq!(
            waiter.wait().await.unwrap_err(),
            WardenError::user_rejected("no")
        );
    }

    #[tokio::test]
    async fn timeout_removes_entry_and_drops_late_answers() {
        let broker = broker(10);
        let waiter = broker.open(approval("c")).unwrap();
        let id = waiter.id().clone();
        assert_eq!(
            waiter.wait().await.unwrap_err(),
            WardenError::Timeout { timeout_ms: 10 }
        );
        assert!(!broker.is_pending(&id));
        assert!(!broker.resolve(&id, ApprovalDecision::Approve));
    }

    #[tokio::test]
    async fn dropping_the_waiter_abandons_the_request() {
        let broker = broker(1_000);
        let waiter = broker.open(approval("d")).unwrap();
        let id = waiter.id().clone();
        assert_eq!(broker.pending().len(), 1);
        drop(waiter);
        assert!(broker.pending().is_empty());
        assert!(!broker.resolve(&id, ApprovalDecision::Approve));
    }

    #[tokio::test]
    async fn duplicate_ids_refused() {
        let broker = broker(1_000);
        let _first = broker.open(approval("e")).unwrap();
        assert!(matches!(
            broker.open(approval("e")),
            Err(WardenError::Internal { .. })
        ));
    }
}
