//! Integration tests for the room facade
//!
//! Rooms run against an in-memory transport and the virtual capture
//! platform, so no backend or hardware is needed.

use async_trait::async_trait;
use meetlink::*;
use meetlink_core::{EnginePacket, OpenPayload, SocketPacket, Transport, TransportConnection};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// IN-MEMORY TRANSPORT
// ============================================================================

struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<EnginePacket>,
    outbound: mpsc::UnboundedSender<EnginePacket>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, packet: EnginePacket) -> std::result::Result<(), MeetLinkError> {
        let _ = self.outbound.send(packet);
        Ok(())
    }

    async fn recv(&mut self) -> std::result::Result<Option<EnginePacket>, MeetLinkError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> std::result::Result<(), MeetLinkError> {
        Ok(())
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Polling
    }
}

struct ServerEnd {
    to_client: mpsc::UnboundedSender<EnginePacket>,
    from_client: mpsc::UnboundedReceiver<EnginePacket>,
}

impl ServerEnd {
    fn push(&self, packet: EnginePacket) {
        self.to_client.send(packet).unwrap();
    }

    async fn next_message(&mut self) -> SocketPacket {
        loop {
            let packet = timeout(EVENT_TIMEOUT, self.from_client.recv())
                .await
                .expect("client packet timed out")
                .expect("client transport dropped");
            if let EnginePacket::Message(raw) = packet {
                return SocketPacket::decode(&raw).unwrap();
            }
        }
    }
}

fn accepting_pair() -> (TransportConnection, ServerEnd) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    let handshake = OpenPayload {
        sid: "room-test".to_string(),
        upgrades: vec![],
        ping_interval: 25_000,
        ping_timeout: 20_000,
        max_payload: None,
    };
    let server = ServerEnd {
        to_client,
        from_client,
    };
    server.push(EnginePacket::Message("0{\"sid\":\"ns\"}".to_string()));
    (
        TransportConnection::new(Box::new(ChannelTransport { inbound, outbound }), handshake),
        server,
    )
}

#[derive(Default)]
struct ScriptedConnector {
    script: Mutex<VecDeque<TransportConnection>>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        _config: &ConnectionConfig,
    ) -> std::result::Result<TransportConnection, MeetLinkError> {
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| MeetLinkError::Transport {
                reason: "connection refused".to_string(),
            })
    }
}

fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        timeout: Duration::from_secs(1),
        reconnect_delay: Duration::from_millis(5),
        reconnect_delay_max: Duration::from_millis(20),
        randomization_factor: 0.0,
        ..ConnectionConfig::new("http://localhost:5000")
    }
}

fn meetlink() -> MeetLink {
    assert_ok!(MeetLink::init_with(GlobalConfig::default()))
}

async fn next_event(events: &mut EventStream) -> Event {
    timeout(EVENT_TIMEOUT, events.next())
        .await
        .expect("room event timed out")
        .expect("event stream closed")
}

async fn wait_for(events: &mut EventStream, event_type: &str) -> Vec<Event> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = event.event_type() == event_type;
        seen.push(event);
        if done {
            return seen;
        }
    }
}

// ============================================================================
// JOINING
// ============================================================================

#[tokio::test]
async fn test_join_without_user_is_rejected() {
    let meetlink = meetlink();
    let err = assert_err!(meetlink.room("standup").join().await);
    assert_eq!(err.missing_field(), Some("user_id"));

    let err = assert_err!(
        meetlink
            .room("  ")
            .session(&Session::new("u1", "Ada"))
            .join()
            .await
    );
    assert_eq!(err.missing_field(), Some("room_id"));
}

#[tokio::test]
async fn test_join_uses_signed_in_session() {
    let meetlink = meetlink();
    meetlink.session().sign_in(Session::new("user-7", "Grace"));

    let connector = Arc::new(ScriptedConnector::default());
    let (conn, mut server) = accepting_pair();
    connector.script.lock().push_back(conn);

    let mut room = assert_ok!(
        meetlink
            .room("room-9")
            .password("pw")
            .connection_config(fast_config())
            .connector(connector)
            .join()
            .await
    );
    assert_eq!(room.id(), "room-9");
    assert_eq!(room.user_id(), "user-7");

    let mut events = room.events();
    let seen = wait_for(&mut events, "joined_room").await;
    assert_eq!(seen[0], Event::Connecting);
    assert!(seen.contains(&Event::Connected {
        transport: TransportMode::Polling
    }));
    assert_eq!(room.connection_state(), ConnectionState::Connected);

    assert_eq!(server.next_message().await, SocketPacket::connect());
    match server.next_message().await {
        SocketPacket::Event { name, args, .. } => {
            assert_eq!(name, "join-room");
            assert_eq!(args[0]["roomId"], "room-9");
            assert_eq!(args[0]["userId"], "user-7");
            assert_eq!(args[0]["userName"], "Grace");
            assert_eq!(args[0]["password"], "pw");
        }
        other => panic!("expected join-room, got {:?}", other),
    }
}

#[tokio::test]
async fn test_terminal_failure_reaches_room_events() {
    let meetlink = meetlink();
    let mut room = assert_ok!(
        meetlink
            .room("room-1")
            .session(&Session::new("u1", "Ada"))
            .connection_config(fast_config())
            .connector(Arc::new(ScriptedConnector::default()))
            .join()
            .await
    );

    let mut events = room.events();
    let seen = wait_for(&mut events, "connection_failed").await;
    let errors = seen
        .iter()
        .filter(|e| e.event_type() == "connect_error")
        .count();
    assert_eq!(errors, 5);
    assert!(seen.last().map(Event::is_error_event).unwrap_or(false));
    assert_eq!(room.connection_state(), ConnectionState::Failed);
}

// ============================================================================
// MEDIA
// ============================================================================

#[tokio::test]
async fn test_media_toggles_and_events() {
    let meetlink = meetlink();
    let platform = VirtualPlatform::default();
    let connector = Arc::new(ScriptedConnector::default());
    let (conn, _server) = accepting_pair();
    connector.script.lock().push_back(conn);

    let mut room = assert_ok!(
        meetlink
            .room("room-2")
            .session(&Session::new("u1", "Ada"))
            .enable_video()
            .connection_config(fast_config())
            .connector(connector)
            .capture_platform(Arc::new(platform.clone()))
            .join()
            .await
    );
    let mut events = room.events().filtered(EventFilter::media_only());

    let stream = assert_ok!(room.start_media().await);
    assert!(stream.has(TrackKind::Video));
    assert!(!stream.has(TrackKind::Audio));

    assert!(!room.toggle_video());
    assert!(!room.toggle_audio());

    assert_eq!(
        timeout(EVENT_TIMEOUT, events.next()).await.unwrap(),
        Some(Event::MediaStarted {
            api: CaptureApi::Standard,
            video: true,
            audio: false,
        })
    );
    assert_eq!(
        timeout(EVENT_TIMEOUT, events.next()).await.unwrap(),
        Some(Event::TrackToggled {
            kind: TrackKind::Video,
            enabled: false,
        })
    );

    room.leave();
    assert_eq!(platform.live_tracks(TrackKind::Video), 0);
}

#[tokio::test]
async fn test_media_error_surfaces_user_message() {
    let meetlink = meetlink();
    let platform = VirtualPlatform::builder().deny_permission().build();
    let connector = Arc::new(ScriptedConnector::default());
    let (conn, _server) = accepting_pair();
    connector.script.lock().push_back(conn);

    let mut room = assert_ok!(
        meetlink
            .room("room-3")
            .session(&Session::new("u1", "Ada"))
            .connection_config(fast_config())
            .connector(connector)
            .capture_platform(Arc::new(platform))
            .join()
            .await
    );

    let err = assert_err!(room.start_media().await);
    assert_eq!(
        err.user_message(),
        CaptureErrorKind::PermissionDenied.user_message()
    );
    assert_eq!(
        room.media_error().and_then(|e| e.kind()),
        Some(CaptureErrorKind::PermissionDenied)
    );
}

#[tokio::test]
async fn test_drop_releases_devices() {
    let meetlink = meetlink();
    let platform = VirtualPlatform::default();
    let connector = Arc::new(ScriptedConnector::default());
    let (conn, _server) = accepting_pair();
    connector.script.lock().push_back(conn);

    {
        let mut room = assert_ok!(
            meetlink
                .room("room-4")
                .session(&Session::new("u1", "Ada"))
                .connection_config(fast_config())
                .connector(connector)
                .capture_platform(Arc::new(platform.clone()))
                .join()
                .await
        );
        assert_ok!(room.start_media().await);
        assert_eq!(platform.live_tracks(TrackKind::Audio), 1);
    }
    assert_eq!(platform.live_tracks(TrackKind::Audio), 0);
    assert_eq!(platform.live_tracks(TrackKind::Video), 0);
}

// ============================================================================
// MEETINGS
// ============================================================================

#[tokio::test]
async fn test_meetings_client_uses_config_url() {
    let meetlink = assert_ok!(MeetLink::init_with(GlobalConfig {
        api_url: "https://api.example.com/".to_string(),
        ..Default::default()
    }));
    meetlink
        .session()
        .sign_in(Session::new("u1", "Ada").with_token("tok"));

    let client = assert_ok!(meetlink.meetings());
    assert_eq!(client.base_url(), "https://api.example.com");
}

#[tokio::test]
async fn test_meetings_client_follows_sign_in() {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/meetings"))
        .and(header("Authorization", "Bearer second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let meetlink = assert_ok!(MeetLink::init_with(GlobalConfig {
        api_url: server.uri(),
        ..Default::default()
    }));
    meetlink
        .session()
        .sign_in(Session::new("u1", "Ada").with_token("first"));
    let client = assert_ok!(meetlink.meetings());

    // Token refreshed after the client was created
    meetlink
        .session()
        .sign_in(Session::new("u1", "Ada").with_token("second"));
    let meetings = assert_ok!(client.list().await);
    assert!(meetings.is_empty());
}

#[tokio::test]
async fn test_reminders_start_and_stop() {
    let meetlink = meetlink();
    let poller = assert_ok!(meetlink.reminders(Arc::new(LogNotifier)));
    assert!(poller.is_running());
    poller.stop();
    assert!(!poller.is_running());
}
