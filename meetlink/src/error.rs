//! Unified error type for the MeetLink facade

use meetlink_core::MeetLinkError;
use meetlink_media::MediaError;
use meetlink_meetings::MeetingsError;
use thiserror::Error;

/// Any error surfaced by the facade
#[derive(Error, Debug)]
pub enum Error {
    /// Connection, configuration or protocol error
    #[error(transparent)]
    Connection(#[from] MeetLinkError),

    /// Camera or microphone error
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Meetings API or reminder error
    #[error(transparent)]
    Meetings(#[from] MeetingsError),
}

/// Result alias for facade operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Message suitable for display to the user
    pub fn user_message(&self) -> String {
        match self {
            Error::Connection(e) => e.user_message(),
            Error::Media(e) => e.user_message(),
            Error::Meetings(e) => e.user_message(),
        }
    }

    /// Missing field, if this is a missing configuration error
    pub fn missing_field(&self) -> Option<&str> {
        match self {
            Error::Connection(MeetLinkError::MissingConfiguration { field }) => Some(field),
            _ => None,
        }
    }
}
