//! Connection state snapshots

use meetlink_core::{ConnectionManager, ConnectionState, TransportMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time view of a connection manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Room of the running session
    pub room_id: Option<String>,
    /// Connection state
    pub state: ConnectionState,
    /// Current transport mode
    pub transport_mode: Option<TransportMode>,
    /// Consecutive failed attempts
    pub reconnect_attempts: u32,
    /// Attempts allowed before giving up
    pub max_reconnect_attempts: u32,
    /// Time since the current connection was established
    pub uptime: Option<Duration>,
}

impl ConnectionInfo {
    /// Snapshot `manager`
    pub fn from_manager(manager: &ConnectionManager) -> Self {
        Self {
            room_id: manager.params().map(|p| p.room_id.clone()),
            state: manager.state(),
            transport_mode: manager.transport_mode(),
            reconnect_attempts: manager.reconnect_attempts(),
            max_reconnect_attempts: manager.max_reconnect_attempts(),
            uptime: manager.connected_for(),
        }
    }

    /// Connected with no pending failures
    pub fn is_healthy(&self) -> bool {
        self.state == ConnectionState::Connected && self.reconnect_attempts == 0
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let transport = match self.transport_mode {
            Some(mode) => mode.as_query(),
            None => "none",
        };
        format!(
            "room={} state={:?} transport={} attempts={}/{}",
            self.room_id.as_deref().unwrap_or("-"),
            self.state,
            transport,
            self.reconnect_attempts,
            self.max_reconnect_attempts
        )
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
