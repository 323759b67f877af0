//! Room connection manager
//!
//! Owns one real-time connection per room session. A driver task walks an
//! explicit state machine (`Idle -> Connecting -> Connected -> Reconnecting
//! -> Failed`) and publishes [`ConnectionEvent`]s to subscribers.
//!
//! Teardown closes the event dispatcher before the transport is touched, so
//! once [`ConnectionManager::shutdown`] returns no subscriber observes another
//! event from that session.

use crate::backoff::Backoff;
use crate::error::MeetLinkError;
use crate::protocol::{EnginePacket, JoinRoomPayload, SocketPacket, JOIN_ROOM_EVENT};
use crate::transport::{
    ConnectionConfig, Connector, FallbackConnector, TransportConnection, TransportMode,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Parameters identifying a room session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParams {
    /// Room to join
    pub room_id: String,
    /// Joining user
    pub user_id: String,
    /// Display name
    pub user_name: String,
    /// Room password, if any
    pub password: Option<String>,
}

impl JoinParams {
    /// Create join parameters without a password
    pub fn new(
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            password: None,
        }
    }

    /// Set the room password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Room and user ids are both present
    pub fn is_complete(&self) -> bool {
        !self.room_id.trim().is_empty() && !self.user_id.trim().is_empty()
    }

    fn same_session(&self, other: &JoinParams) -> bool {
        self.room_id == other.room_id && self.user_id == other.user_id
    }

    fn payload(&self) -> JoinRoomPayload {
        JoinRoomPayload {
            room_id: self.room_id.clone(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            password: self.password.clone(),
        }
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No session running
    Idle,
    /// First connection attempt in progress
    Connecting,
    /// Connected and joined
    Connected,
    /// Connection lost, retrying
    Reconnecting,
    /// Gave up after the maximum number of attempts
    Failed,
}

/// Why a connected session dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the namespace
    ServerDisconnect,
    /// Transport closed by the peer
    TransportClose,
    /// Transport failed
    TransportError(String),
    /// Server stopped answering heartbeats
    PingTimeout,
}

impl DisconnectReason {
    /// Reason string as reported by the browser client
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::ServerDisconnect => "io server disconnect",
            DisconnectReason::TransportClose => "transport close",
            DisconnectReason::TransportError(_) => "transport error",
            DisconnectReason::PingTimeout => "ping timeout",
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::TransportError(detail) => write!(f, "transport error: {}", detail),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Events published by a connection session
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// First connection attempt started
    Connecting,
    /// Transport and namespace connected
    Connected {
        /// Transport in use
        mode: TransportMode,
    },
    /// `join-room` was sent
    JoinedRoom {
        /// Room id
        room_id: String,
    },
    /// Connected session dropped
    Disconnected {
        /// Drop reason
        reason: DisconnectReason,
    },
    /// A connection attempt failed
    ConnectError {
        /// Consecutive failures so far
        attempt: u32,
        /// Error description
        error: String,
    },
    /// A delayed reconnection attempt is about to start
    ReconnectAttempt {
        /// Retry number since the connection was lost
        attempt: u32,
    },
    /// Reconnected after a drop or failures
    Reconnected {
        /// Retries it took
        attempts: u32,
    },
    /// Terminal: retries exhausted, the manager stopped
    ReconnectFailed {
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
}

impl ConnectionEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ConnectionEvent::Connecting => "connecting",
            ConnectionEvent::Connected { .. } => "connect",
            ConnectionEvent::JoinedRoom { .. } => "join_room",
            ConnectionEvent::Disconnected { .. } => "disconnect",
            ConnectionEvent::ConnectError { .. } => "connect_error",
            ConnectionEvent::ReconnectAttempt { .. } => "reconnect_attempt",
            ConnectionEvent::Reconnected { .. } => "reconnect",
            ConnectionEvent::ReconnectFailed { .. } => "reconnect_failed",
            ConnectionEvent::ServerEvent { .. } => "server_event",
        }
    }

    /// Whether the caller must report this to the user
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionEvent::ReconnectFailed { .. })
    }
}

#[derive(Debug)]
struct DispatcherInner {
    open: bool,
    subscribers: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
}

/// Fan-out of session events; closing it is synchronous and final
#[derive(Debug)]
struct Dispatcher {
    inner: Mutex<DispatcherInner>,
    closed: Arc<AtomicBool>,
}

impl Dispatcher {
    fn new() -> Self {
        Self {
            inner: Mutex::new(DispatcherInner {
                open: true,
                subscribers: Vec::new(),
            }),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn subscribe(&self) -> ConnectionEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if inner.open {
            inner.subscribers.push(tx);
        }
        ConnectionEvents {
            receiver: rx,
            closed: self.closed.clone(),
        }
    }

    fn dispatch(&self, event: ConnectionEvent) {
        let mut inner = self.inner.lock();
        if !inner.open {
            return;
        }
        debug!("Connection event: {}", event.event_type());
        inner
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.open = false;
        self.closed.store(true, Ordering::SeqCst);
        inner.subscribers.clear();
    }
}

/// Stream of connection events for one session
#[derive(Debug)]
pub struct ConnectionEvents {
    receiver: mpsc::UnboundedReceiver<ConnectionEvent>,
    closed: Arc<AtomicBool>,
}

impl ConnectionEvents {
    /// Next event; `None` once the session was torn down
    pub async fn next(&mut self) -> Option<ConnectionEvent> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let event = self.receiver.recv().await?;
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        Some(event)
    }

    /// Next event without waiting
    pub fn try_next(&mut self) -> Option<ConnectionEvent> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.receiver.try_recv().ok()
    }
}

/// State shared between a session's driver task and the manager
#[derive(Debug)]
struct SessionShared {
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
    mode: RwLock<Option<TransportMode>>,
    connected_at: RwLock<Option<Instant>>,
    dispatcher: Dispatcher,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Idle),
            attempts: AtomicU32::new(0),
            mode: RwLock::new(None),
            connected_at: RwLock::new(None),
            dispatcher: Dispatcher::new(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        if self.dispatcher.closed.load(Ordering::SeqCst) {
            return;
        }
        *self.state.write() = state;
    }
}

#[derive(Debug)]
struct RunningSession {
    params: JoinParams,
    shutdown_tx: watch::Sender<bool>,
    outbound_tx: mpsc::UnboundedSender<SocketPacket>,
}

/// Connection manager for a room page
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<SessionShared>,
    session: Option<RunningSession>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("session", &self.session.as_ref().map(|s| &s.params.room_id))
            .finish()
    }
}

impl ConnectionManager {
    /// Create a manager using the WebSocket/polling fallback connector
    pub fn new(config: ConnectionConfig) -> Result<Self, MeetLinkError> {
        Self::with_connector(config, Arc::new(FallbackConnector))
    }

    /// Create a manager with a custom connector
    pub fn with_connector(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, MeetLinkError> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            shared: Arc::new(SessionShared::new()),
            session: None,
        })
    }

    /// Start a session, replacing any running one.
    ///
    /// Incomplete parameters leave the manager idle without error.
    pub fn start(&mut self, params: JoinParams) -> Result<(), MeetLinkError> {
        self.shutdown();

        if !params.is_complete() {
            debug!("Room or user id missing, connection manager stays idle");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            MeetLinkError::Initialization {
                reason: format!("No async runtime available: {}", e),
            }
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        self.shared.set_state(ConnectionState::Connecting);

        let driver = Driver {
            config: self.config.clone(),
            connector: self.connector.clone(),
            shared: self.shared.clone(),
            params: params.clone(),
            shutdown: shutdown_rx,
            outbound: outbound_rx,
        };
        runtime.spawn(driver.run());

        info!(
            "Connection session started for room {} as {}",
            params.room_id, params.user_id
        );
        self.session = Some(RunningSession {
            params,
            shutdown_tx,
            outbound_tx,
        });
        Ok(())
    }

    /// Restart only if the room or user changed
    pub fn update(&mut self, params: JoinParams) -> Result<(), MeetLinkError> {
        if let Some(session) = &self.session {
            if session.params.same_session(&params) {
                return Ok(());
            }
        }
        self.start(params)
    }

    /// Tear down the running session.
    ///
    /// Subscribers are detached before the driver is told to close the
    /// transport.
    pub fn shutdown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.shared.dispatcher.close();
        let _ = session.shutdown_tx.send(true);
        info!("Connection session for room {} torn down", session.params.room_id);

        self.shared = Arc::new(SessionShared::new());
    }

    /// Subscribe to the current (or next) session's events
    pub fn subscribe(&self) -> ConnectionEvents {
        self.shared.dispatcher.subscribe()
    }

    /// Emit an application event to the room
    pub fn emit(&self, name: &str, payload: Value) -> Result<(), MeetLinkError> {
        let state = self.state();
        if state != ConnectionState::Connected {
            return Err(MeetLinkError::InvalidState {
                expected: "Connected".to_string(),
                actual: format!("{:?}", state),
            });
        }
        let session = self.session.as_ref().ok_or_else(|| MeetLinkError::InvalidState {
            expected: "running session".to_string(),
            actual: "no session".to_string(),
        })?;
        session
            .outbound_tx
            .send(SocketPacket::event(name, payload))
            .map_err(|_| MeetLinkError::Transport {
                reason: "connection driver stopped".to_string(),
            })
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Consecutive failed connection attempts
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Maximum attempts before the session fails
    pub fn max_reconnect_attempts(&self) -> u32 {
        self.config.max_reconnect_attempts
    }

    /// Transport of the current connection
    pub fn transport_mode(&self) -> Option<TransportMode> {
        *self.shared.mode.read()
    }

    /// Time since the current connection was established
    pub fn connected_for(&self) -> Option<Duration> {
        self.shared.connected_at.read().map(|at| at.elapsed())
    }

    /// Parameters of the running session
    pub fn params(&self) -> Option<&JoinParams> {
        self.session.as_ref().map(|s| &s.params)
    }

    /// Connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Step {
    Shutdown,
    Outbound(SocketPacket),
    Inbound(Result<Option<EnginePacket>, MeetLinkError>),
    PingTimeout,
}

enum SessionEnd {
    Shutdown,
    Dropped(DisconnectReason),
}

struct Driver {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<SessionShared>,
    params: JoinParams,
    shutdown: watch::Receiver<bool>,
    outbound: mpsc::UnboundedReceiver<SocketPacket>,
}

impl Driver {
    fn dispatch(&self, event: ConnectionEvent) {
        self.shared.dispatcher.dispatch(event);
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow() || self.shared.dispatcher.closed.load(Ordering::SeqCst)
    }

    async fn run(mut self) {
        let mut backoff = Backoff::new(
            self.config.reconnect_delay,
            self.config.reconnect_delay_max,
            self.config.randomization_factor,
        );
        let mut reconnecting = false;
        let mut immediate = false;

        self.dispatch(ConnectionEvent::Connecting);

        loop {
            if self.shutdown_requested() {
                break;
            }

            if reconnecting && !immediate {
                let delay = backoff.next_delay();
                self.shared.set_state(ConnectionState::Reconnecting);
                self.dispatch(ConnectionEvent::ReconnectAttempt {
                    attempt: backoff.attempts(),
                });
                debug!("Reconnecting to room {} in {:?}", self.params.room_id, delay);

                let stop = tokio::select! {
                    _ = self.shutdown.changed() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if stop {
                    break;
                }
            }
            immediate = false;

            let result = tokio::select! {
                _ = self.shutdown.changed() => None,
                result = Self::connect_once(&self.connector, &self.config) => Some(result),
            };
            let Some(result) = result else {
                break;
            };

            match result {
                Ok(mut conn) => {
                    let retries = backoff.attempts();
                    self.shared.attempts.store(0, Ordering::SeqCst);
                    backoff.reset();
                    *self.shared.mode.write() = Some(conn.mode());
                    *self.shared.connected_at.write() = Some(Instant::now());
                    self.shared.set_state(ConnectionState::Connected);

                    info!(
                        "Connected to room {} over {:?}",
                        self.params.room_id,
                        conn.mode()
                    );
                    self.dispatch(ConnectionEvent::Connected { mode: conn.mode() });
                    if reconnecting {
                        self.dispatch(ConnectionEvent::Reconnected { attempts: retries });
                    }

                    let end = match self.join_room(&mut conn).await {
                        Ok(()) => {
                            self.dispatch(ConnectionEvent::JoinedRoom {
                                room_id: self.params.room_id.clone(),
                            });
                            self.pump(&mut conn).await
                        }
                        Err(e) => SessionEnd::Dropped(DisconnectReason::TransportError(
                            e.to_string(),
                        )),
                    };

                    *self.shared.connected_at.write() = None;

                    match end {
                        SessionEnd::Shutdown => {
                            Self::close_gracefully(&mut conn).await;
                            break;
                        }
                        SessionEnd::Dropped(reason) => {
                            let _ = conn.close().await;
                            warn!(
                                "Disconnected from room {}: {}",
                                self.params.room_id, reason
                            );
                            immediate = reason == DisconnectReason::ServerDisconnect;
                            self.dispatch(ConnectionEvent::Disconnected { reason });

                            if !self.config.reconnection && !immediate {
                                self.shared.set_state(ConnectionState::Idle);
                                break;
                            }
                            reconnecting = true;
                            self.shared.set_state(ConnectionState::Reconnecting);
                        }
                    }
                }
                Err(e) => {
                    let attempt = self.shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    warn!(
                        "Connection attempt {} for room {} failed: {}",
                        attempt, self.params.room_id, e
                    );
                    self.dispatch(ConnectionEvent::ConnectError {
                        attempt,
                        error: e.to_string(),
                    });

                    if attempt >= self.config.max_reconnect_attempts {
                        warn!(
                            "Giving up on room {} after {} attempts",
                            self.params.room_id, attempt
                        );
                        self.shared.set_state(ConnectionState::Failed);
                        self.dispatch(ConnectionEvent::ReconnectFailed { attempts: attempt });
                        break;
                    }
                    if !self.config.reconnection {
                        self.shared.set_state(ConnectionState::Idle);
                        break;
                    }
                    reconnecting = true;
                }
            }
        }

        debug!("Connection driver for room {} stopped", self.params.room_id);
    }

    /// Establish a transport and complete the namespace handshake
    async fn connect_once(
        connector: &Arc<dyn Connector>,
        config: &ConnectionConfig,
    ) -> Result<TransportConnection, MeetLinkError> {
        let mut conn = connector.connect(config).await?;

        let acked = tokio::time::timeout(config.timeout, Self::namespace_connect(&mut conn)).await;

        match acked {
            Ok(Ok(())) => Ok(conn),
            Ok(Err(e)) => {
                let _ = conn.close().await;
                Err(e)
            }
            Err(_) => {
                let _ = conn.close().await;
                Err(MeetLinkError::Timeout {
                    operation: "namespace connect".to_string(),
                    duration: config.timeout,
                })
            }
        }
    }

    async fn namespace_connect(conn: &mut TransportConnection) -> Result<(), MeetLinkError> {
        conn.send(EnginePacket::Message(SocketPacket::connect().encode()?))
            .await?;

        loop {
            match conn.recv().await? {
                Some(EnginePacket::Ping(data)) => conn.send(EnginePacket::Pong(data)).await?,
                Some(EnginePacket::Message(raw)) => match SocketPacket::decode(&raw)? {
                    SocketPacket::Connect { .. } => return Ok(()),
                    SocketPacket::ConnectError { data, .. } => {
                        let message = data
                            .as_ref()
                            .and_then(|d| d.get("message"))
                            .and_then(Value::as_str)
                            .unwrap_or("connection refused")
                            .to_string();
                        return Err(MeetLinkError::ConnectRefused { message });
                    }
                    other => debug!("Ignoring packet before connect ack: {:?}", other),
                },
                Some(EnginePacket::Close) | None => {
                    return Err(MeetLinkError::Transport {
                        reason: "transport closed before connect ack".to_string(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    async fn join_room(&self, conn: &mut TransportConnection) -> Result<(), MeetLinkError> {
        let payload = serde_json::to_value(self.params.payload())?;
        let packet = SocketPacket::event(JOIN_ROOM_EVENT, payload);
        conn.send(EnginePacket::Message(packet.encode()?)).await?;
        debug!("Sent join-room for room {}", self.params.room_id);
        Ok(())
    }

    /// Move packets until the session ends
    async fn pump(&mut self, conn: &mut TransportConnection) -> SessionEnd {
        let liveness = conn.handshake().liveness_timeout();
        let mut deadline = tokio::time::Instant::now() + liveness;

        loop {
            let step = tokio::select! {
                _ = self.shutdown.changed() => Step::Shutdown,
                Some(packet) = self.outbound.recv() => Step::Outbound(packet),
                inbound = conn.recv() => Step::Inbound(inbound),
                _ = tokio::time::sleep_until(deadline) => Step::PingTimeout,
            };

            match step {
                Step::Shutdown => return SessionEnd::Shutdown,
                Step::PingTimeout => return SessionEnd::Dropped(DisconnectReason::PingTimeout),
                Step::Outbound(packet) => {
                    let sent = match packet.encode() {
                        Ok(raw) => conn.send(EnginePacket::Message(raw)).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = sent {
                        return SessionEnd::Dropped(DisconnectReason::TransportError(
                            e.to_string(),
                        ));
                    }
                }
                Step::Inbound(Err(e)) => {
                    return SessionEnd::Dropped(DisconnectReason::TransportError(e.to_string()))
                }
                Step::Inbound(Ok(None)) | Step::Inbound(Ok(Some(EnginePacket::Close))) => {
                    return SessionEnd::Dropped(DisconnectReason::TransportClose)
                }
                Step::Inbound(Ok(Some(packet))) => {
                    deadline = tokio::time::Instant::now() + liveness;
                    if let Some(end) = self.handle_inbound(conn, packet).await {
                        return end;
                    }
                }
            }
        }
    }

    async fn handle_inbound(
        &self,
        conn: &mut TransportConnection,
        packet: EnginePacket,
    ) -> Option<SessionEnd> {
        match packet {
            EnginePacket::Ping(data) => {
                if let Err(e) = conn.send(EnginePacket::Pong(data)).await {
                    return Some(SessionEnd::Dropped(DisconnectReason::TransportError(
                        e.to_string(),
                    )));
                }
            }
            EnginePacket::Message(raw) => match SocketPacket::decode(&raw) {
                Ok(SocketPacket::Disconnect { .. }) => {
                    return Some(SessionEnd::Dropped(DisconnectReason::ServerDisconnect))
                }
                Ok(SocketPacket::Event { name, args, .. }) => {
                    self.dispatch(ConnectionEvent::ServerEvent { name, args });
                }
                Ok(other) => debug!("Ignoring socket packet {:?}", other),
                Err(e) => warn!("Dropping malformed packet: {}", e),
            },
            other => debug!("Ignoring engine packet {:?}", other),
        }
        None
    }

    async fn close_gracefully(conn: &mut TransportConnection) {
        let disconnect = SocketPacket::Disconnect {
            namespace: crate::protocol::DEFAULT_NAMESPACE.to_string(),
        };
        if let Ok(raw) = disconnect.encode() {
            let _ = conn.send(EnginePacket::Message(raw)).await;
        }
        if let Err(e) = conn.close().await {
            debug!("Transport close after shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_params_completeness() {
        assert!(JoinParams::new("room", "user", "Ana").is_complete());
        assert!(!JoinParams::new("", "user", "Ana").is_complete());
        assert!(!JoinParams::new("room", "  ", "Ana").is_complete());
    }

    #[test]
    fn test_join_payload_carries_password() {
        let params = JoinParams::new("room", "user", "Ana").with_password("secret");
        let payload = params.payload();
        assert_eq!(payload.password.as_deref(), Some("secret"));
        assert_eq!(payload.user_name, "Ana");
    }

    #[test]
    fn test_disconnect_reason_strings() {
        assert_eq!(DisconnectReason::ServerDisconnect.as_str(), "io server disconnect");
        assert_eq!(
            DisconnectReason::TransportError("reset".into()).to_string(),
            "transport error: reset"
        );
    }

    #[test]
    fn test_dispatcher_close_detaches_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut events = dispatcher.subscribe();
        dispatcher.dispatch(ConnectionEvent::Connecting);
        dispatcher.close();
        dispatcher.dispatch(ConnectionEvent::Connecting);

        // Buffered events are not surfaced after close either
        assert!(events.try_next().is_none());
        let mut late = dispatcher.subscribe();
        assert!(late.try_next().is_none());
    }

    #[tokio::test]
    async fn test_incomplete_params_stay_idle() {
        let mut manager = ConnectionManager::new(ConnectionConfig::default()).unwrap();
        manager.start(JoinParams::new("", "user", "Ana")).unwrap();
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert!(manager.params().is_none());
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let mut manager = ConnectionManager::new(ConnectionConfig::default()).unwrap();
        let err = manager
            .start(JoinParams::new("room", "user", "Ana"))
            .unwrap_err();
        assert_eq!(err.error_code(), "INITIALIZATION_FAILED");
    }

    #[test]
    fn test_emit_requires_connection() {
        let manager = ConnectionManager::new(ConnectionConfig::default()).unwrap();
        let err = manager.emit("chat", serde_json::json!({})).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");
    }
}
