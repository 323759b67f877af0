//! # MeetLink Core
//!
//! Real-time room connection management for MeetLink clients.
//! This crate owns the transport layer (WebSocket with long-polling
//! fallback), the Engine.IO/Socket.IO wire protocol and the reconnecting
//! connection manager used by room pages.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export main types
pub use backoff::Backoff;
pub use connection::{
    ConnectionEvent, ConnectionEvents, ConnectionManager, ConnectionState, DisconnectReason,
    JoinParams,
};
pub use error::MeetLinkError;
pub use protocol::{EnginePacket, JoinRoomPayload, OpenPayload, SocketPacket, JOIN_ROOM_EVENT};
pub use transport::{
    ConnectionConfig, ConnectionMetrics, Connector, FallbackConnector, PollingTransport,
    Transport, TransportConnection, TransportMode, WebSocketTransport,
};
