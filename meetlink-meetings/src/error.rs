//! Error types for the meetings client and reminder poller

use thiserror::Error;

/// Longest response body kept in [`MeetingsError::RequestFailed`]
pub const MAX_ERROR_BODY_CHARS: usize = 256;

/// Main error type for meeting operations
#[derive(Error, Debug)]
pub enum MeetingsError {
    /// The request never produced a response
    #[error("HTTP request failed: {source}")]
    Http {
        /// Underlying client error
        #[from]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The response body could not be decoded
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Decoding error
        message: String,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// No async runtime to run background work on
    #[error("Runtime unavailable: {reason}")]
    Runtime {
        /// Reason
        reason: String,
    },
}

impl MeetingsError {
    /// Build a [`MeetingsError::RequestFailed`], truncating long bodies
    pub fn request_failed(status: u16, body: &str) -> Self {
        let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
            let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            truncated.push_str("...");
            truncated
        } else {
            body.to_string()
        };
        MeetingsError::RequestFailed { status, body }
    }

    /// Whether the next poll may succeed where this one failed
    pub fn is_transient(&self) -> bool {
        match self {
            MeetingsError::Http { .. } => true,
            MeetingsError::RequestFailed { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Message suitable for display to the user
    pub fn user_message(&self) -> String {
        match self {
            MeetingsError::RequestFailed { status: 404, .. } => {
                "The meeting no longer exists.".to_string()
            }
            MeetingsError::RequestFailed { status: 401 | 403, .. } => {
                "You are not allowed to change this meeting.".to_string()
            }
            MeetingsError::Http { .. } | MeetingsError::RequestFailed { .. } => {
                "Could not reach the meeting service. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}
