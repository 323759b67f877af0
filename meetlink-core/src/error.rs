//! Error types for MeetLink

use std::time::Duration;
use thiserror::Error;

/// Main error type for MeetLink connection operations
#[derive(Error, Debug)]
pub enum MeetLinkError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Missing configuration error
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing configuration field
        field: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the problem
        message: String,
    },

    /// Connection error
    #[error("Connection failed for room {room_id}: {reason}")]
    Connection {
        /// Room ID where connection failed
        room_id: String,
        /// Reason for connection failure
        reason: String,
        /// Suggested retry delay
        retry_in: Option<Duration>,
        /// Suggested action to resolve the issue
        suggested_action: String,
    },

    /// Reconnection gave up after the configured number of attempts
    #[error("Unable to reach room {room_id} after {attempts} attempts")]
    ReconnectFailed {
        /// Room ID
        room_id: String,
        /// Number of failed attempts
        attempts: u32,
    },

    /// Transport error
    #[error("Transport error: {reason}")]
    Transport {
        /// Reason for transport error
        reason: String,
    },

    /// Wire protocol error
    #[error("Protocol error: {message}")]
    ProtocolError {
        /// Error message
        message: String,
    },

    /// Server refused the namespace connection
    #[error("Connection refused by server: {message}")]
    ConnectRefused {
        /// Message sent by the server
        message: String,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Operation timed out error
    #[error("Operation timed out: {operation} after {duration:?}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Duration after which timeout occurred
        duration: Duration,
    },

    /// Invalid message format
    #[error("Invalid message format: {message}, error: {source}")]
    InvalidMessage {
        /// Invalid message content
        message: String,
        /// Parsing error
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MeetLinkError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> String {
        match self {
            MeetLinkError::Initialization { .. } => "INITIALIZATION_FAILED".to_string(),
            MeetLinkError::MissingConfiguration { .. } => "MISSING_CONFIGURATION".to_string(),
            MeetLinkError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION".to_string(),
            MeetLinkError::Connection { .. } => "CONNECTION_FAILED".to_string(),
            MeetLinkError::ReconnectFailed { .. } => "RECONNECT_FAILED".to_string(),
            MeetLinkError::Transport { .. } => "TRANSPORT_ERROR".to_string(),
            MeetLinkError::ProtocolError { .. } => "PROTOCOL_ERROR".to_string(),
            MeetLinkError::ConnectRefused { .. } => "CONNECT_REFUSED".to_string(),
            MeetLinkError::InvalidState { .. } => "INVALID_STATE".to_string(),
            MeetLinkError::Timeout { .. } => "TIMEOUT".to_string(),
            MeetLinkError::InvalidMessage { .. } => "INVALID_MESSAGE".to_string(),
        }
    }

    /// Whether retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MeetLinkError::Connection { .. }
                | MeetLinkError::Transport { .. }
                | MeetLinkError::Timeout { .. }
        )
    }

    /// Message suitable for showing to the end user
    pub fn user_message(&self) -> String {
        match self {
            MeetLinkError::ReconnectFailed { .. } => {
                "Unable to connect to the meeting server. Please check your connection and try again."
                    .to_string()
            }
            MeetLinkError::ConnectRefused { message } => {
                format!("The meeting server refused the connection: {}", message)
            }
            MeetLinkError::MissingConfiguration { field } => {
                format!("Cannot join the meeting: {} is missing", field)
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for MeetLinkError {
    fn from(err: serde_json::Error) -> Self {
        MeetLinkError::InvalidMessage {
            message: "JSON payload".to_string(),
            source: Box::new(err),
        }
    }
}
