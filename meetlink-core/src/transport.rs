//! Real-time transport with fallback support
//!
//! A connection is first attempted over WebSocket and falls back to HTTP
//! long-polling. Both transports complete the Engine.IO handshake while
//! establishing, so callers always receive an open session.

use crate::error::MeetLinkError;
use crate::protocol::{EnginePacket, OpenPayload, ENGINE_IO_VERSION};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Transport used for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportMode {
    /// Full-duplex WebSocket
    WebSocket,
    /// HTTP long-polling
    Polling,
}

impl TransportMode {
    /// Value of the `transport` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            TransportMode::WebSocket => "websocket",
            TransportMode::Polling => "polling",
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Backend base URL, e.g. `http://localhost:5000`
    pub url: String,
    /// Engine.IO endpoint path
    pub path: String,
    /// Timeout for establishing a transport and the namespace handshake
    pub timeout: Duration,
    /// Reconnect automatically after transport loss
    pub reconnection: bool,
    /// Consecutive failed attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Initial reconnection delay
    pub reconnect_delay: Duration,
    /// Ceiling for the reconnection delay
    pub reconnect_delay_max: Duration,
    /// Jitter applied to reconnection delays (0.0 to 1.0)
    pub randomization_factor: f64,
    /// Transport modes in order of preference
    pub preferred_transports: Vec<TransportMode>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".to_string(),
            path: "/socket.io/".to_string(),
            timeout: Duration::from_secs(20),
            reconnection: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(5),
            randomization_factor: 0.5,
            preferred_transports: vec![TransportMode::WebSocket, TransportMode::Polling],
        }
    }
}

impl ConnectionConfig {
    /// Default configuration pointed at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Configuration for networks that block WebSocket upgrades
    pub fn polling_only(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            preferred_transports: vec![TransportMode::Polling],
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), MeetLinkError> {
        Url::parse(&self.url).map_err(|e| MeetLinkError::InvalidConfiguration {
            message: format!("invalid server url '{}': {}", self.url, e),
        })?;

        if self.max_reconnect_attempts == 0 {
            return Err(MeetLinkError::InvalidConfiguration {
                message: "max_reconnect_attempts must be > 0".to_string(),
            });
        }

        if self.reconnect_delay.is_zero() || self.reconnect_delay > self.reconnect_delay_max {
            return Err(MeetLinkError::InvalidConfiguration {
                message: "reconnect_delay must be > 0 and <= reconnect_delay_max".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(MeetLinkError::InvalidConfiguration {
                message: "randomization_factor must be within 0.0..=1.0".to_string(),
            });
        }

        if self.preferred_transports.is_empty() {
            return Err(MeetLinkError::InvalidConfiguration {
                message: "at least one transport is required".to_string(),
            });
        }

        Ok(())
    }

    /// Engine.IO endpoint URL for the given transport
    pub fn endpoint(&self, mode: TransportMode) -> Result<Url, MeetLinkError> {
        let mut url = Url::parse(&self.url).map_err(|e| MeetLinkError::InvalidConfiguration {
            message: format!("invalid server url '{}': {}", self.url, e),
        })?;
        url.set_path(&self.path);
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
            .append_pair("transport", mode.as_query());

        if mode == TransportMode::WebSocket {
            let scheme = match url.scheme() {
                "https" | "wss" => "wss",
                _ => "ws",
            };
            url.set_scheme(scheme)
                .map_err(|_| MeetLinkError::InvalidConfiguration {
                    message: format!("cannot use '{}' for a websocket url", self.url),
                })?;
        }

        Ok(url)
    }
}

/// Connection establishment counters
#[derive(Debug, Clone, Default)]
pub struct ConnectionMetrics {
    /// Transport attempts made
    pub connection_attempts: u64,
    /// Transports established
    pub successful_connections: u64,
    /// Failures per transport mode
    pub failed_connections: HashMap<TransportMode, u64>,
    /// When the last attempt started
    pub last_attempt: Option<Instant>,
}

/// Trait for transport implementations
#[async_trait]
pub trait Transport: Send {
    /// Send one packet
    async fn send(&mut self, packet: EnginePacket) -> Result<(), MeetLinkError>;

    /// Receive the next packet; `None` once the peer closed the transport
    async fn recv(&mut self) -> Result<Option<EnginePacket>, MeetLinkError>;

    /// Close the transport
    async fn close(&mut self) -> Result<(), MeetLinkError>;

    /// Transport mode
    fn mode(&self) -> TransportMode;
}

/// Opens transport connections for the connection manager
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a transport with a completed Engine.IO handshake
    async fn connect(&self, config: &ConnectionConfig)
        -> Result<TransportConnection, MeetLinkError>;
}

/// Connector that walks the configured fallback chain
#[derive(Debug, Default, Clone)]
pub struct FallbackConnector;

#[async_trait]
impl Connector for FallbackConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<TransportConnection, MeetLinkError> {
        TransportConnection::establish_with_fallback(config).await
    }
}

/// An established transport plus its handshake
pub struct TransportConnection {
    inner: Box<dyn Transport>,
    handshake: OpenPayload,
    metrics: Arc<RwLock<ConnectionMetrics>>,
    connection_id: Uuid,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection")
            .field("mode", &self.inner.mode())
            .field("sid", &self.handshake.sid)
            .field("connection_id", &self.connection_id)
            .finish()
    }
}

impl TransportConnection {
    /// Wrap an already-handshaken transport
    pub fn new(inner: Box<dyn Transport>, handshake: OpenPayload) -> Self {
        Self {
            inner,
            handshake,
            metrics: Arc::new(RwLock::new(ConnectionMetrics::default())),
            connection_id: Uuid::new_v4(),
        }
    }

    /// Establish connection with automatic fallback
    pub async fn establish_with_fallback(
        config: &ConnectionConfig,
    ) -> Result<Self, MeetLinkError> {
        let connection_id = Uuid::new_v4();
        let metrics = Arc::new(RwLock::new(ConnectionMetrics::default()));

        info!("Attempting connection to {} with fallback chain", config.url);

        let mut last_error = None;
        for transport_mode in &config.preferred_transports {
            {
                let mut m = metrics.write();
                m.connection_attempts += 1;
                m.last_attempt = Some(Instant::now());
            }

            debug!("Trying transport mode: {:?}", transport_mode);

            match Self::try_transport(config, *transport_mode).await {
                Ok((inner, handshake)) => {
                    metrics.write().successful_connections += 1;
                    info!(
                        "Connected using {:?} (sid {})",
                        transport_mode, handshake.sid
                    );
                    return Ok(Self {
                        inner,
                        handshake,
                        metrics,
                        connection_id,
                    });
                }
                Err(e) => {
                    *metrics
                        .write()
                        .failed_connections
                        .entry(*transport_mode)
                        .or_insert(0) += 1;
                    warn!("Transport {:?} failed: {}", transport_mode, e);
                    last_error = Some(e);
                }
            }
        }

        Err(MeetLinkError::Connection {
            room_id: "unknown".to_string(),
            reason: match last_error {
                Some(e) => format!("All transport modes failed, last error: {}", e),
                None => "All transport modes failed".to_string(),
            },
            retry_in: Some(config.reconnect_delay),
            suggested_action: "Check network connectivity and the server URL".to_string(),
        })
    }

    async fn try_transport(
        config: &ConnectionConfig,
        mode: TransportMode,
    ) -> Result<(Box<dyn Transport>, OpenPayload), MeetLinkError> {
        let endpoint = config.endpoint(mode)?;
        match mode {
            TransportMode::WebSocket => {
                let (transport, open) = WebSocketTransport::connect(endpoint, config.timeout).await?;
                Ok((Box::new(transport), open))
            }
            TransportMode::Polling => {
                let (transport, open) = PollingTransport::connect(endpoint, config.timeout).await?;
                Ok((Box::new(transport), open))
            }
        }
    }

    /// Send one packet
    pub async fn send(&mut self, packet: EnginePacket) -> Result<(), MeetLinkError> {
        self.inner.send(packet).await
    }

    /// Receive the next packet
    pub async fn recv(&mut self) -> Result<Option<EnginePacket>, MeetLinkError> {
        self.inner.recv().await
    }

    /// Close the transport
    pub async fn close(&mut self) -> Result<(), MeetLinkError> {
        self.inner.close().await
    }

    /// Engine.IO handshake data
    pub fn handshake(&self) -> &OpenPayload {
        &self.handshake
    }

    /// Transport in use
    pub fn mode(&self) -> TransportMode {
        self.inner.mode()
    }

    /// Establishment counters
    pub fn metrics(&self) -> ConnectionMetrics {
        self.metrics.read().clone()
    }

    /// Local id for log correlation
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }
}

fn expect_open(packet: Option<EnginePacket>) -> Result<OpenPayload, MeetLinkError> {
    match packet {
        Some(EnginePacket::Open(open)) => Ok(open),
        Some(other) => Err(MeetLinkError::ProtocolError {
            message: format!("expected open packet, got {:?}", other),
        }),
        None => Err(MeetLinkError::Transport {
            reason: "transport closed during handshake".to_string(),
        }),
    }
}

/// WebSocket transport
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    endpoint: String,
}

impl WebSocketTransport {
    /// Connect and read the handshake
    pub async fn connect(
        endpoint: Url,
        timeout: Duration,
    ) -> Result<(Self, OpenPayload), MeetLinkError> {
        let (stream, _) = tokio::time::timeout(timeout, connect_async(endpoint.as_str()))
            .await
            .map_err(|_| MeetLinkError::Transport {
                reason: "WebSocket connection timeout".to_string(),
            })?
            .map_err(|e| MeetLinkError::Transport {
                reason: format!("WebSocket connection failed: {}", e),
            })?;

        let mut transport = Self {
            stream,
            endpoint: endpoint.to_string(),
        };

        let first = tokio::time::timeout(timeout, transport.recv())
            .await
            .map_err(|_| MeetLinkError::Timeout {
                operation: "websocket handshake".to_string(),
                duration: timeout,
            })??;
        let open = expect_open(first)?;

        debug!("WebSocket transport open at {}", transport.endpoint);
        Ok((transport, open))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, packet: EnginePacket) -> Result<(), MeetLinkError> {
        let text = packet.encode()?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| MeetLinkError::Transport {
                reason: format!("WebSocket send failed: {}", e),
            })
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>, MeetLinkError> {
        while let Some(message) = self.stream.next().await {
            let message = message.map_err(|e| MeetLinkError::Transport {
                reason: format!("WebSocket receive failed: {}", e),
            })?;
            match message {
                Message::Text(text) => return EnginePacket::decode(&text).map(Some),
                Message::Close(_) => return Ok(None),
                Message::Binary(_) => {
                    return Err(MeetLinkError::ProtocolError {
                        message: "binary websocket frames are not supported".to_string(),
                    })
                }
                _ => continue,
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), MeetLinkError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| MeetLinkError::Transport {
                reason: format!("WebSocket close failed: {}", e),
            })
    }

    fn mode(&self) -> TransportMode {
        TransportMode::WebSocket
    }
}

/// HTTP long-polling transport
///
/// A reader task keeps one GET outstanding at all times and forwards the
/// decoded packets over a channel, so waiting in [`Transport::recv`] never
/// holds an HTTP request. Sends are independent POSTs.
pub struct PollingTransport {
    client: reqwest::Client,
    endpoint: Url,
    inbound: mpsc::UnboundedReceiver<Result<EnginePacket, MeetLinkError>>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl PollingTransport {
    /// Open a polling session and read the handshake
    pub async fn connect(
        endpoint: Url,
        timeout: Duration,
    ) -> Result<(Self, OpenPayload), MeetLinkError> {
        let handshake_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeetLinkError::Initialization {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        let body = Self::get(&handshake_client, &endpoint).await?;
        let mut packets: VecDeque<_> = EnginePacket::decode_payload(&body)?.into();
        let open = expect_open(packets.pop_front())?;

        // Long-poll GETs are held by the server for up to a ping interval.
        let client = reqwest::Client::builder()
            .timeout(open.liveness_timeout() + timeout)
            .build()
            .map_err(|e| MeetLinkError::Initialization {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        let mut session_endpoint = endpoint;
        session_endpoint.query_pairs_mut().append_pair("sid", &open.sid);

        // Packets that arrived with the handshake are delivered first
        let (tx, inbound) = mpsc::unbounded_channel();
        let mut closed_early = false;
        for packet in packets {
            closed_early |= packet == EnginePacket::Close;
            let _ = tx.send(Ok(packet));
        }
        let reader = if closed_early {
            tokio::spawn(async {})
        } else {
            tokio::spawn(Self::poll_loop(client.clone(), session_endpoint.clone(), tx))
        };

        debug!("Polling transport open at {}", session_endpoint);
        Ok((
            Self {
                client,
                endpoint: session_endpoint,
                inbound,
                reader,
                closed: false,
            },
            open,
        ))
    }

    /// Issue GETs back to back until the session closes or the receiver
    /// is dropped
    async fn poll_loop(
        client: reqwest::Client,
        endpoint: Url,
        tx: mpsc::UnboundedSender<Result<EnginePacket, MeetLinkError>>,
    ) {
        while !tx.is_closed() {
            let polled = match Self::get(&client, &endpoint).await {
                Ok(body) => EnginePacket::decode_payload(&body),
                Err(e) => Err(e),
            };
            let packets = match polled {
                Ok(packets) => packets,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };

            for packet in packets {
                let close = packet == EnginePacket::Close;
                if tx.send(Ok(packet)).is_err() || close {
                    return;
                }
            }
        }
    }

    async fn get(client: &reqwest::Client, url: &Url) -> Result<String, MeetLinkError> {
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| MeetLinkError::Transport {
                reason: format!("Polling request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MeetLinkError::Transport {
                reason: format!("Polling request returned {}", status),
            });
        }

        response.text().await.map_err(|e| MeetLinkError::Transport {
            reason: format!("Polling response unreadable: {}", e),
        })
    }
}

#[async_trait]
impl Transport for PollingTransport {
    async fn send(&mut self, packet: EnginePacket) -> Result<(), MeetLinkError> {
        let body = packet.encode()?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(|e| MeetLinkError::Transport {
                reason: format!("Polling send failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(MeetLinkError::Transport {
                reason: format!("Polling send returned {}", response.status()),
            });
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>, MeetLinkError> {
        if self.closed {
            return Ok(None);
        }
        match self.inbound.recv().await {
            Some(Ok(EnginePacket::Close)) | None => {
                self.closed = true;
                Ok(None)
            }
            Some(Ok(packet)) => Ok(Some(packet)),
            Some(Err(e)) => Err(e),
        }
    }

    async fn close(&mut self) -> Result<(), MeetLinkError> {
        self.reader.abort();
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.send(EnginePacket::Close).await
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Polling
    }
}

impl Drop for PollingTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
