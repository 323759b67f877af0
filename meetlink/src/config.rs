//! Configuration types and defaults

use meetlink_core::{ConnectionConfig, MeetLinkError};
use meetlink_media::{AudioConstraints, MediaConstraints, TrackRequest, VideoConstraints};
use meetlink_meetings::ReminderConfig;
use std::time::Duration;

/// API URL used when no environment override is set
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Environment variables consulted for the API URL, highest priority first
pub const API_URL_ENV_VARS: [&str; 2] = ["MEETLINK_API_URL", "REACT_APP_API_URL"];

/// Global MeetLink configuration
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Backend base URL for the room connection and the meetings API
    pub api_url: String,
    /// Enable debug logging
    pub debug_logging: bool,
    /// Connection attempt timeout
    pub connect_timeout: Duration,
    /// Failed attempts before a room connection gives up
    pub max_reconnect_attempts: u32,
    /// Reminder poller timing
    pub reminders: ReminderConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            debug_logging: false,
            connect_timeout: Duration::from_secs(20),
            max_reconnect_attempts: 5,
            reminders: ReminderConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Defaults with the API URL taken from the environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with the API URL taken from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = API_URL_ENV_VARS
            .iter()
            .filter_map(|key| lookup(key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self {
            api_url,
            ..Self::default()
        }
    }

    /// Connection settings for a room
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.api_url.clone());
        config.timeout = self.connect_timeout;
        config.max_reconnect_attempts = self.max_reconnect_attempts;
        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), MeetLinkError> {
        self.connection_config().validate()?;
        self.reminders
            .validate()
            .map_err(|e| MeetLinkError::InvalidConfiguration {
                message: e.to_string(),
            })
    }
}

/// Room-specific configuration
#[derive(Debug, Clone, Default)]
pub struct RoomConfig {
    /// Enable video
    pub video_enabled: bool,
    /// Enable audio
    pub audio_enabled: bool,
    /// Room password
    pub password: Option<String>,
}

impl RoomConfig {
    /// Capture constraints for this room.
    ///
    /// With neither kind enabled explicitly, both are captured with default
    /// constraints.
    pub fn media_constraints(&self) -> MediaConstraints {
        if !self.video_enabled && !self.audio_enabled {
            return MediaConstraints::default();
        }
        MediaConstraints {
            video: if self.video_enabled {
                TrackRequest::Constrained(VideoConstraints::default())
            } else {
                TrackRequest::Disabled
            },
            audio: if self.audio_enabled {
                TrackRequest::Constrained(AudioConstraints::default())
            } else {
                TrackRequest::Disabled
            },
        }
    }
}
