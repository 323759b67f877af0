//! Event system for room connection and media events

use meetlink_core::{ConnectionEvent, TransportMode};
use meetlink_media::{CaptureApi, CaptureErrorKind, MediaEvent, TrackKind};
use serde_json::Value;
use tokio::sync::mpsc;

/// Events that can occur during a room session
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// First connection attempt started
    Connecting,
    /// Connected to the backend
    Connected {
        /// Transport in use
        transport: TransportMode,
    },
    /// Joined the room
    JoinedRoom {
        /// Room ID
        room_id: String,
    },
    /// Connection lost
    Disconnected {
        /// Reason as reported by the transport
        reason: String,
    },
    /// A connection attempt failed
    ConnectError {
        /// Consecutive failures so far
        attempt: u32,
        /// Error description
        error: String,
    },
    /// Waiting before the next reconnection attempt
    Reconnecting {
        /// Retry number
        attempt: u32,
    },
    /// Connection restored
    Reconnected {
        /// Retries it took
        attempts: u32,
    },
    /// Gave up reconnecting; the user has to rejoin
    ConnectionFailed {
        /// Failed attempts
        attempts: u32,
    },
    /// Application event pushed by the server
    ServerEvent {
        /// Event name
        name: String,
        /// Event arguments
        args: Vec<Value>,
    },
    /// Camera or microphone capture started
    MediaStarted {
        /// Capture API used
        api: CaptureApi,
        /// Video captured
        video: bool,
        /// Audio captured
        audio: bool,
    },
    /// Capture stopped and devices released
    MediaStopped,
    /// A local track was enabled or muted
    TrackToggled {
        /// Track kind
        kind: TrackKind,
        /// New enabled state
        enabled: bool,
    },
    /// Capture failed
    MediaError {
        /// Failure kind, `None` when capture is unsupported
        kind: Option<CaptureErrorKind>,
        /// Message for the user
        message: String,
    },
}

impl Event {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Connecting => "connecting",
            Event::Connected { .. } => "connected",
            Event::JoinedRoom { .. } => "joined_room",
            Event::Disconnected { .. } => "disconnected",
            Event::ConnectError { .. } => "connect_error",
            Event::Reconnecting { .. } => "reconnecting",
            Event::Reconnected { .. } => "reconnected",
            Event::ConnectionFailed { .. } => "connection_failed",
            Event::ServerEvent { .. } => "server_event",
            Event::MediaStarted { .. } => "media_started",
            Event::MediaStopped => "media_stopped",
            Event::TrackToggled { .. } => "track_toggled",
            Event::MediaError { .. } => "media_error",
        }
    }

    /// Check if this is a connection-related event
    pub fn is_connection_event(&self) -> bool {
        matches!(
            self,
            Event::Connecting
                | Event::Connected { .. }
                | Event::JoinedRoom { .. }
                | Event::Disconnected { .. }
                | Event::ConnectError { .. }
                | Event::Reconnecting { .. }
                | Event::Reconnected { .. }
                | Event::ConnectionFailed { .. }
        )
    }

    /// Check if this is a media-related event
    pub fn is_media_event(&self) -> bool {
        matches!(
            self,
            Event::MediaStarted { .. }
                | Event::MediaStopped
                | Event::TrackToggled { .. }
                | Event::MediaError { .. }
        )
    }

    /// Check if this event must be shown to the user
    pub fn is_error_event(&self) -> bool {
        matches!(
            self,
            Event::ConnectionFailed { .. } | Event::MediaError { .. }
        )
    }

    /// Check if this is an application event from the server
    pub fn is_server_event(&self) -> bool {
        matches!(self, Event::ServerEvent { .. })
    }
}

impl From<ConnectionEvent> for Event {
    fn from(event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Connecting => Event::Connecting,
            ConnectionEvent::Connected { mode } => Event::Connected { transport: mode },
            ConnectionEvent::JoinedRoom { room_id } => Event::JoinedRoom { room_id },
            ConnectionEvent::Disconnected { reason } => Event::Disconnected {
                reason: reason.to_string(),
            },
            ConnectionEvent::ConnectError { attempt, error } => {
                Event::ConnectError { attempt, error }
            }
            ConnectionEvent::ReconnectAttempt { attempt } => Event::Reconnecting { attempt },
            ConnectionEvent::Reconnected { attempts } => Event::Reconnected { attempts },
            ConnectionEvent::ReconnectFailed { attempts } => Event::ConnectionFailed { attempts },
            ConnectionEvent::ServerEvent { name, args } => Event::ServerEvent { name, args },
        }
    }
}

impl From<MediaEvent> for Event {
    fn from(event: MediaEvent) -> Self {
        match event {
            MediaEvent::StreamStarted { api, video, audio } => {
                Event::MediaStarted { api, video, audio }
            }
            MediaEvent::StreamStopped => Event::MediaStopped,
            MediaEvent::TrackToggled { kind, enabled } => Event::TrackToggled { kind, enabled },
            MediaEvent::CaptureFailed { kind, message } => Event::MediaError { kind, message },
        }
    }
}

/// Stream of room events for async iteration
#[derive(Debug)]
pub struct EventStream {
    /// Receiver for events
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<Event>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Only yield events matching `filter`
    pub fn filtered(self, filter: EventFilter) -> FilteredEventStream {
        FilteredEventStream::new(self, filter)
    }
}

/// Event filter for selective event processing
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Whether to include connection events
    pub include_connection_events: bool,
    /// Whether to include media events
    pub include_media_events: bool,
    /// Whether to include server application events
    pub include_server_events: bool,
    /// Specific event types to include (if specified, overrides other filters)
    pub specific_event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a filter that includes all events
    pub fn all() -> Self {
        Self {
            include_connection_events: true,
            include_media_events: true,
            include_server_events: true,
            specific_event_types: None,
        }
    }

    /// Create a filter that includes only connection events
    pub fn connection_only() -> Self {
        Self {
            include_connection_events: true,
            include_media_events: false,
            include_server_events: false,
            specific_event_types: None,
        }
    }

    /// Create a filter that includes only media events
    pub fn media_only() -> Self {
        Self {
            include_connection_events: false,
            include_media_events: true,
            include_server_events: false,
            specific_event_types: None,
        }
    }

    /// Create a filter for specific event types
    pub fn specific(event_types: Vec<String>) -> Self {
        Self {
            include_connection_events: false,
            include_media_events: false,
            include_server_events: false,
            specific_event_types: Some(event_types),
        }
    }

    /// Check if an event should be included based on this filter
    pub fn should_include(&self, event: &Event) -> bool {
        if let Some(ref specific_types) = self.specific_event_types {
            return specific_types.iter().any(|t| t == event.event_type());
        }

        (self.include_connection_events && event.is_connection_event())
            || (self.include_media_events && event.is_media_event())
            || (self.include_server_events && event.is_server_event())
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Filtered event stream that only yields events matching a filter
#[derive(Debug)]
pub struct FilteredEventStream {
    stream: EventStream,
    filter: EventFilter,
}

impl FilteredEventStream {
    /// Create a new filtered event stream
    pub fn new(stream: EventStream, filter: EventFilter) -> Self {
        Self { stream, filter }
    }

    /// Get the next event that matches the filter
    pub async fn next(&mut self) -> Option<Event> {
        while let Some(event) = self.stream.next().await {
            if self.filter.should_include(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Try to get the next filtered event without blocking
    pub fn try_next(&mut self) -> Result<Option<Event>, mpsc::error::TryRecvError> {
        while let Some(event) = self.stream.try_next()? {
            if self.filter.should_include(&event) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Get the current filter
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetlink_core::DisconnectReason;

    #[test]
    fn test_event_type_classification() {
        let connection_event = Event::Reconnected { attempts: 2 };
        assert!(connection_event.is_connection_event());
        assert!(!connection_event.is_media_event());

        let media_event = Event::MediaStopped;
        assert!(media_event.is_media_event());
        assert!(!media_event.is_connection_event());

        let failed = Event::ConnectionFailed { attempts: 5 };
        assert!(failed.is_error_event());
        assert!(failed.is_connection_event());

        let server = Event::ServerEvent {
            name: "user-joined".to_string(),
            args: vec![],
        };
        assert!(server.is_server_event());
        assert!(!server.is_error_event());
    }

    #[test]
    fn test_from_connection_event() {
        let event = Event::from(ConnectionEvent::Disconnected {
            reason: DisconnectReason::ServerDisconnect,
        });
        assert_eq!(
            event,
            Event::Disconnected {
                reason: "io server disconnect".to_string()
            }
        );

        let event = Event::from(ConnectionEvent::ReconnectFailed { attempts: 5 });
        assert_eq!(event.event_type(), "connection_failed");
    }

    #[test]
    fn test_from_media_event() {
        let event = Event::from(MediaEvent::CaptureFailed {
            kind: Some(CaptureErrorKind::Busy),
            message: "busy".to_string(),
        });
        assert!(event.is_error_event());
        assert!(event.is_media_event());
    }

    #[test]
    fn test_event_filter() {
        let connection_event = Event::Connecting;
        let media_event = Event::MediaStopped;

        let all_filter = EventFilter::all();
        assert!(all_filter.should_include(&connection_event));
        assert!(all_filter.should_include(&media_event));

        let media_filter = EventFilter::media_only();
        assert!(!media_filter.should_include(&connection_event));
        assert!(media_filter.should_include(&media_event));

        let specific_filter = EventFilter::specific(vec!["connecting".to_string()]);
        assert!(specific_filter.should_include(&connection_event));
        assert!(!specific_filter.should_include(&media_event));
    }

    #[tokio::test]
    async fn test_filtered_event_stream() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut filtered_stream = EventStream::new(rx).filtered(EventFilter::connection_only());

        tx.send(Event::MediaStopped).unwrap();
        tx.send(Event::Connecting).unwrap();

        let received_event = filtered_stream.next().await.unwrap();
        assert_eq!(received_event.event_type(), "connecting");

        tx.send(Event::TrackToggled {
            kind: TrackKind::Audio,
            enabled: false,
        })
        .unwrap();
        assert!(filtered_stream.try_next().unwrap().is_none());
    }
}
