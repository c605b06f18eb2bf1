//! Connected application sessions

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use warden_core::types::{SessionId, TimestampMs};
use warden_core::{Result, WardenError};

/// One connected origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session id handed to the application
    pub id: SessionId,
    /// Connected origin
    pub origin: String,
    /// Circle named at connection time
    pub circle: String,
    /// Fingerprint of the derived session key
    pub key_fingerprint: String,
    /// Connection time (ms)
    pub opened_at: TimestampMs,
}

/// Sessions by origin; one per origin
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session, replacing any earlier one for the origin
    pub fn open(&self, session: Session) -> Option<Session> {
        self.sessions.write().insert(session.origin.clone(), session)
    }

    /// Session for `origin`
    pub fn get(&self, origin: &str) -> Option<Session> {
        self.sessions.read().get(origin).cloned()
    }

    /// Session for `origin`, or `NotConnected`
    pub fn require(&self, origin: &str) -> Result<Session> {
        self.get(origin)
            .ok_or_else(|| WardenError::not_connected(format!("{origin} has no session")))
    }

    /// Drop the session for `origin`
    pub fn close(&self, origin: &str) -> Option<Session> {
        self.sessions.write().remove(origin)
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are open
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
