//! Signed-in user context
//!
//! The session is the single place user identity is read from and written
//! to. Rooms and the meetings client take it from the store instead of
//! looking it up themselves.

use meetlink_meetings::TokenSource;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Identity of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// User ID
    pub user_id: String,
    /// Display name
    pub user_name: String,
    /// Bearer token for the meetings API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Session {
    /// Create a session without a token
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            token: None,
        }
    }

    /// Attach a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Owner of the current [`Session`]. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current session
    pub fn sign_in(&self, session: Session) {
        debug!("Session set for user {}", session.user_id);
        *self.current.write() = Some(session);
    }

    /// Clear the current session, returning it
    pub fn sign_out(&self) -> Option<Session> {
        self.current.write().take()
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Bearer token of the current session
    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().and_then(|s| s.token.clone())
    }

    /// Whether a session is set
    pub fn is_signed_in(&self) -> bool {
        self.current.read().is_some()
    }
}

impl TokenSource for SessionStore {
    fn token(&self) -> Option<String> {
        SessionStore::token(self)
    }
}
