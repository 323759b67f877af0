//! Room management and API

use crate::config::RoomConfig;
use crate::error::Result;
use crate::event::{Event, EventStream};
use crate::session::Session;
use crate::MeetLink;
use meetlink_core::{
    ConnectionConfig, ConnectionEvents, ConnectionManager, ConnectionState, Connector,
    JoinParams, MeetLinkError,
};
use meetlink_media::{
    capture, CapturePlatform, MediaCaptureManager, MediaConstraints, MediaError, MediaEvent,
    MediaStream,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<Event>>>>;

/// Fluent builder for room configuration and connection
pub struct RoomBuilder {
    meetlink: MeetLink,
    room_id: String,
    session: Option<Session>,
    config: RoomConfig,
    connection: Option<ConnectionConfig>,
    connector: Option<Arc<dyn Connector>>,
    platform: Option<Arc<dyn CapturePlatform>>,
}

impl RoomBuilder {
    pub(crate) fn new(meetlink: &MeetLink, room_id: &str) -> Self {
        Self {
            meetlink: meetlink.clone(),
            room_id: room_id.to_string(),
            session: None,
            config: RoomConfig::default(),
            connection: None,
            connector: None,
            platform: None,
        }
    }

    /// Join as `session` instead of the signed-in user
    pub fn session(mut self, session: &Session) -> Self {
        self.session = Some(session.clone());
        self
    }

    /// Set the room password
    pub fn password(mut self, password: &str) -> Self {
        self.config.password = Some(password.to_string());
        self
    }

    /// Capture video when media starts
    pub fn enable_video(mut self) -> Self {
        self.config.video_enabled = true;
        self
    }

    /// Capture audio when media starts
    pub fn enable_audio(mut self) -> Self {
        self.config.audio_enabled = true;
        self
    }

    /// Override connection settings for this room
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection = Some(config);
        self
    }

    /// Use a custom transport connector
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Use a specific capture platform
    pub fn capture_platform(mut self, platform: Arc<dyn CapturePlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Join the room with current configuration
    pub async fn join(self) -> Result<Room> {
        let session = self
            .session
            .or_else(|| self.meetlink.session().current());

        if self.room_id.trim().is_empty() {
            return Err(missing("room_id"));
        }
        let session = match session {
            Some(s) if !s.user_id.trim().is_empty() => s,
            _ => return Err(missing("user_id")),
        };

        let mut params = JoinParams::new(self.room_id, session.user_id, session.user_name);
        if let Some(password) = &self.config.password {
            params = params.with_password(password.clone());
        }

        let connection_config = self
            .connection
            .unwrap_or_else(|| self.meetlink.config().connection_config());
        let connection = match self.connector {
            Some(connector) => ConnectionManager::with_connector(connection_config, connector)?,
            None => ConnectionManager::new(connection_config)?,
        };
        let platform = self.platform.unwrap_or_else(capture::default_platform);

        Room::start(params, self.config, connection, MediaCaptureManager::new(platform))
    }
}

fn missing(field: &str) -> crate::Error {
    MeetLinkError::MissingConfiguration {
        field: field.to_string(),
    }
    .into()
}

/// A joined room: the room connection plus local media
pub struct Room {
    params: JoinParams,
    config: RoomConfig,
    connection: ConnectionManager,
    media: MediaCaptureManager,
    subscribers: Subscribers,
    pending: Option<EventStream>,
    forwarder: JoinHandle<()>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.params.room_id)
            .field("user_id", &self.params.user_id)
            .field("state", &self.connection.state())
            .finish()
    }
}

impl Room {
    fn start(
        params: JoinParams,
        config: RoomConfig,
        mut connection: ConnectionManager,
        media: MediaCaptureManager,
    ) -> Result<Self> {
        // Subscribe before the session starts so no event is missed
        let connection_events = connection.subscribe();
        let media_events = media.subscribe();

        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        subscribers.lock().push(tx);

        connection.start(params.clone())?;
        let forwarder = tokio::spawn(forward_events(
            connection_events,
            media_events,
            subscribers.clone(),
        ));

        info!("Joined room {} as {}", params.room_id, params.user_id);
        Ok(Self {
            params,
            config,
            connection,
            media,
            subscribers,
            pending: Some(EventStream::new(rx)),
            forwarder,
        })
    }

    /// Get room ID
    pub fn id(&self) -> &str {
        &self.params.room_id
    }

    /// Get the joining user's ID
    pub fn user_id(&self) -> &str {
        &self.params.user_id
    }

    /// Event stream for this room.
    ///
    /// The first call returns every event since the room was joined; later
    /// calls only see events from that point on.
    pub fn events(&mut self) -> EventStream {
        if let Some(stream) = self.pending.take() {
            return stream;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        EventStream::new(rx)
    }

    /// Connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Underlying connection manager
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Send an application event to the room
    pub fn emit(&self, name: &str, payload: Value) -> Result<()> {
        Ok(self.connection.emit(name, payload)?)
    }

    /// Start capture with the room's configured tracks
    pub async fn start_media(&mut self) -> Result<&MediaStream> {
        let constraints = self.config.media_constraints();
        self.start_media_with(constraints).await
    }

    /// Start capture with explicit constraints
    pub async fn start_media_with(&mut self, constraints: MediaConstraints) -> Result<&MediaStream> {
        Ok(self.media.start_stream(Some(constraints)).await?)
    }

    /// Stop capture and release devices
    pub fn stop_media(&mut self) {
        self.media.stop_stream();
    }

    /// Flip the local video track; `false` if there is none
    pub fn toggle_video(&mut self) -> bool {
        self.media.toggle_video()
    }

    /// Flip the local audio track; `false` if there is none
    pub fn toggle_audio(&mut self) -> bool {
        self.media.toggle_audio()
    }

    /// Currently captured stream
    pub fn media_stream(&self) -> Option<&MediaStream> {
        self.media.stream()
    }

    /// Last capture error, cleared by a successful start
    pub fn media_error(&self) -> Option<&MediaError> {
        self.media.last_error()
    }

    /// Connection snapshot for diagnostics
    #[cfg(feature = "diagnostics")]
    pub fn connection_info(&self) -> meetlink_diagnostics::ConnectionInfo {
        meetlink_diagnostics::ConnectionInfo::from_manager(&self.connection)
    }

    /// Leave the room, closing the connection and releasing devices
    pub fn leave(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.connection.shutdown();
        self.media.stop_stream();
        self.forwarder.abort();
        self.subscribers.lock().clear();
        debug!("Left room {}", self.params.room_id);
    }
}

impl Drop for Room {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn forward_events(
    mut connection: ConnectionEvents,
    mut media: broadcast::Receiver<MediaEvent>,
    subscribers: Subscribers,
) {
    let mut connection_open = true;
    let mut media_open = true;

    loop {
        let event: Event = tokio::select! {
            event = connection.next(), if connection_open => match event {
                Some(event) => event.into(),
                None => {
                    connection_open = false;
                    continue;
                }
            },
            event = media.recv(), if media_open => match event {
                Ok(event) => event.into(),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Dropped {} media events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    media_open = false;
                    continue;
                }
            },
            else => break,
        };

        subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }
}
