//! # MeetLink
//!
//! Client-side session plumbing for MeetLink video meetings: the real-time
//! room connection with automatic reconnection, camera and microphone
//! capture, and reminders for upcoming meetings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meetlink::{MeetLink, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), meetlink::Error> {
//!     let meetlink = MeetLink::init()?;
//!     meetlink.session().sign_in(Session::new("user-1", "Ada"));
//!
//!     let mut room = meetlink
//!         .room("standup")
//!         .enable_video()
//!         .enable_audio()
//!         .join()
//!         .await?;
//!
//!     let mut events = room.events();
//!     while let Some(event) = events.next().await {
//!         println!("Room event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export crate types for easy access
pub use meetlink_core::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, Connector,
    JoinParams, MeetLinkError, TransportMode,
};
pub use meetlink_media::{
    CaptureApi, CaptureErrorKind, CapturePlatform, MediaConstraints, MediaError, MediaStream,
    TrackKind, VirtualPlatform,
};
#[cfg(feature = "native")]
pub use meetlink_media::NativePlatform;
pub use meetlink_meetings::{
    LogNotifier, Meeting, MeetingsClient, MeetingsError, Notification, NotificationPermission,
    Notifier, PollerHandle, ReminderConfig, TokenSource,
};

#[cfg(feature = "diagnostics")]
pub use meetlink_diagnostics::{ConnectionInfo, DebugLogger};

// Public API modules
pub mod config;
pub mod error;
pub mod event;
pub mod room;
pub mod session;

// Re-export main API types
pub use config::{GlobalConfig, RoomConfig};
pub use error::{Error, Result};
pub use event::{Event, EventFilter, EventStream, FilteredEventStream};
pub use room::{Room, RoomBuilder};
pub use session::{Session, SessionStore};

use meetlink_meetings::ReminderPoller;
use std::sync::Arc;

/// Main entry point for MeetLink
#[derive(Debug, Clone)]
pub struct MeetLink {
    inner: Arc<MeetLinkInner>,
}

#[derive(Debug)]
struct MeetLinkInner {
    config: GlobalConfig,
    session: SessionStore,
}

impl MeetLink {
    /// Initialize with settings from the environment
    ///
    /// # Example
    /// ```rust,no_run
    /// use meetlink::MeetLink;
    ///
    /// let meetlink = MeetLink::init()?;
    /// # Ok::<(), meetlink::Error>(())
    /// ```
    pub fn init() -> Result<Self> {
        Self::init_with(GlobalConfig::from_env())
    }

    /// Initialize with custom global configuration
    pub fn init_with(config: GlobalConfig) -> Result<Self> {
        config.validate()?;

        #[cfg(feature = "diagnostics")]
        {
            if config.debug_logging {
                DebugLogger::init_with_level("debug")?;
            }
        }

        tracing::debug!("MeetLink initialized against {}", config.api_url);
        Ok(Self {
            inner: Arc::new(MeetLinkInner {
                config,
                session: SessionStore::new(),
            }),
        })
    }

    /// Global configuration
    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }

    /// Owner of the signed-in user's session
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Create a room builder for the given room ID
    ///
    /// # Example
    /// ```rust,no_run
    /// use meetlink::{MeetLink, Session};
    ///
    /// # async fn example() -> Result<(), meetlink::Error> {
    /// let meetlink = MeetLink::init()?;
    /// let room = meetlink
    ///     .room("my-room")
    ///     .session(&Session::new("alice", "Alice"))
    ///     .password("hunter2")
    ///     .join()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn room(&self, id: &str) -> RoomBuilder {
        RoomBuilder::new(self, id)
    }

    /// Meetings API client authenticated as whoever is signed in when a
    /// request is sent
    pub fn meetings(&self) -> Result<MeetingsClient> {
        let client = MeetingsClient::new(self.inner.config.api_url.clone())?;
        Ok(client.with_token_source(Arc::new(self.inner.session.clone())))
    }

    /// Start the reminder poller for the current session's meetings
    pub fn reminders(&self, notifier: Arc<dyn Notifier>) -> Result<PollerHandle> {
        let client = self.meetings()?;
        Ok(ReminderPoller::spawn(
            Arc::new(client),
            notifier,
            self.inner.config.reminders.clone(),
        )?)
    }
}
