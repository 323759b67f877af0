//! Real-time wire protocol
//!
//! The meeting backend speaks Engine.IO v4 framing with Socket.IO v5 packets
//! carried inside Engine.IO `message` packets. Only text packets are
//! supported; binary attachments are rejected as protocol errors.

use crate::error::MeetLinkError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Engine.IO protocol revision sent in the `EIO` query parameter
pub const ENGINE_IO_VERSION: u8 = 4;

/// Record separator between packets in a long-polling payload
pub const PAYLOAD_SEPARATOR: char = '\u{1e}';

/// Default namespace
pub const DEFAULT_NAMESPACE: &str = "/";

/// Event name emitted once the room connection is established
pub const JOIN_ROOM_EVENT: &str = "join-room";

/// Handshake data carried by the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    /// Engine.IO session id
    pub sid: String,
    /// Transports the server allows upgrading to
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping interval in milliseconds
    pub ping_interval: u64,
    /// Time the server waits for a pong, in milliseconds
    pub ping_timeout: u64,
    /// Maximum payload size accepted by the server
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenPayload {
    /// How long the client may go without hearing from the server
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// Engine.IO transport-level packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// Handshake
    Open(OpenPayload),
    /// Transport close
    Close,
    /// Heartbeat probe
    Ping(Option<String>),
    /// Heartbeat reply
    Pong(Option<String>),
    /// Application message (carries a Socket.IO packet)
    Message(String),
    /// Transport upgrade
    Upgrade,
    /// No-op, used to flush polling requests
    Noop,
}

impl EnginePacket {
    /// Encode to the text wire form
    pub fn encode(&self) -> Result<String, MeetLinkError> {
        let encoded = match self {
            EnginePacket::Open(payload) => format!("0{}", serde_json::to_string(payload)?),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data.as_deref().unwrap_or("")),
            EnginePacket::Pong(data) => format!("3{}", data.as_deref().unwrap_or("")),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        };
        Ok(encoded)
    }

    /// Decode a single packet from its text wire form
    pub fn decode(raw: &str) -> Result<Self, MeetLinkError> {
        let mut chars = raw.chars();
        let kind = chars.next().ok_or_else(|| MeetLinkError::ProtocolError {
            message: "empty engine packet".to_string(),
        })?;
        let rest = chars.as_str();
        let optional = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(optional(rest))),
            '3' => Ok(EnginePacket::Pong(optional(rest))),
            '4' => Ok(EnginePacket::Message(rest.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            'b' => Err(MeetLinkError::ProtocolError {
                message: "binary engine packets are not supported".to_string(),
            }),
            other => Err(MeetLinkError::ProtocolError {
                message: format!("unknown engine packet type '{}'", other),
            }),
        }
    }

    /// Decode a long-polling payload holding one or more packets
    pub fn decode_payload(payload: &str) -> Result<Vec<Self>, MeetLinkError> {
        payload
            .split(PAYLOAD_SEPARATOR)
            .filter(|p| !p.is_empty())
            .map(Self::decode)
            .collect()
    }

    /// Encode several packets into one long-polling payload
    pub fn encode_payload(packets: &[EnginePacket]) -> Result<String, MeetLinkError> {
        let encoded = packets
            .iter()
            .map(EnginePacket::encode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(encoded.join(&PAYLOAD_SEPARATOR.to_string()))
    }
}

/// Socket.IO packet carried in an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connect request (client) or acknowledgement (server)
    Connect {
        /// Namespace
        namespace: String,
        /// Auth payload or server handshake data
        data: Option<Value>,
    },
    /// Namespace disconnect
    Disconnect {
        /// Namespace
        namespace: String,
    },
    /// Named event with arguments
    Event {
        /// Namespace
        namespace: String,
        /// Acknowledgement id requested by the sender
        id: Option<u64>,
        /// Event name
        name: String,
        /// Event arguments
        args: Vec<Value>,
    },
    /// Acknowledgement of an event
    Ack {
        /// Namespace
        namespace: String,
        /// Acknowledged event id
        id: u64,
        /// Acknowledgement arguments
        args: Vec<Value>,
    },
    /// Server refused the namespace connection
    ConnectError {
        /// Namespace
        namespace: String,
        /// Error data
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// Build an event packet on the default namespace
    pub fn event(name: &str, payload: Value) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: name.to_string(),
            args: vec![payload],
        }
    }

    /// Build a connect packet on the default namespace
    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: None,
        }
    }

    fn type_id(&self) -> char {
        match self {
            SocketPacket::Connect { .. } => '0',
            SocketPacket::Disconnect { .. } => '1',
            SocketPacket::Event { .. } => '2',
            SocketPacket::Ack { .. } => '3',
            SocketPacket::ConnectError { .. } => '4',
        }
    }

    fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Encode to the text form placed inside an Engine.IO message
    pub fn encode(&self) -> Result<String, MeetLinkError> {
        let mut out = String::new();
        out.push(self.type_id());

        let namespace = self.namespace();
        let has_body = !matches!(self, SocketPacket::Disconnect { .. });
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            if has_body {
                out.push(',');
            }
        }

        match self {
            SocketPacket::Connect { data, .. } | SocketPacket::ConnectError { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&serde_json::to_string(data)?);
                }
            }
            SocketPacket::Disconnect { .. } => {}
            SocketPacket::Event { id, name, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                out.push_str(&serde_json::to_string(&array)?);
            }
            SocketPacket::Ack { id, args, .. } => {
                out.push_str(&id.to_string());
                out.push_str(&serde_json::to_string(args)?);
            }
        }

        Ok(out)
    }

    /// Decode from the text carried in an Engine.IO message
    pub fn decode(raw: &str) -> Result<Self, MeetLinkError> {
        let mut chars = raw.chars();
        let kind = chars.next().ok_or_else(|| MeetLinkError::ProtocolError {
            message: "empty socket packet".to_string(),
        })?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(MeetLinkError::ProtocolError {
                message: "binary socket packets are not supported".to_string(),
            });
        }

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = rest[..idx].to_string();
                    rest = &rest[idx + 1..];
                    ns
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let id = if digits > 0 {
            let parsed = rest[..digits]
                .parse::<u64>()
                .map_err(|e| MeetLinkError::InvalidMessage {
                    message: raw.to_string(),
                    source: Box::new(e),
                })?;
            rest = &rest[digits..];
            Some(parsed)
        } else {
            None
        };

        let body: Option<Value> = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect {
                namespace,
                data: body,
            }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let mut items = match body {
                    Some(Value::Array(items)) if !items.is_empty() => items,
                    _ => {
                        return Err(MeetLinkError::ProtocolError {
                            message: format!("event packet without name: {}", raw),
                        })
                    }
                };
                let name = match items.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(MeetLinkError::ProtocolError {
                            message: format!("event name must be a string, got {}", other),
                        })
                    }
                };
                Ok(SocketPacket::Event {
                    namespace,
                    id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let id = id.ok_or_else(|| MeetLinkError::ProtocolError {
                    message: format!("ack packet without id: {}", raw),
                })?;
                let args = match body {
                    Some(Value::Array(items)) => items,
                    None => Vec::new(),
                    Some(other) => vec![other],
                };
                Ok(SocketPacket::Ack {
                    namespace,
                    id,
                    args,
                })
            }
            '4' => Ok(SocketPacket::ConnectError {
                namespace,
                data: body,
            }),
            other => Err(MeetLinkError::ProtocolError {
                message: format!("unknown socket packet type '{}'", other),
            }),
        }
    }
}

/// Payload of the `join-room` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    /// Room to join
    pub room_id: String,
    /// Joining user
    pub user_id: String,
    /// Display name of the joining user
    pub user_name: String,
    /// Room password, if the room is protected
    pub password: Option<String>,
}
