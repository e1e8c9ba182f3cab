//! Binary wire protocol for the whiteboard session.
//!
//! All frames are bincode-encoded tagged enums carried in WebSocket binary
//! messages. Clients send [`ClientMessage`]; the server sends [`ServerEvent`].
//! Draw payloads (tool, width, coordinates) are opaque bytes — the server
//! relays and replays them without interpretation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stroke color assigned to a participant that joins without a preference.
pub const DEFAULT_STROKE_COLOR: &str = "#000000";

/// 2D cursor position on the shared surface, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f32,
    pub y: f32,
}

impl CursorPosition {
    pub const ORIGIN: CursorPosition = CursorPosition { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Default for CursorPosition {
    fn default() -> Self {
        Self::ORIGIN
    }
}

/// Profile supplied by a client at join time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinProfile {
    /// Display name, immutable for the connection's lifetime.
    pub name: String,
    /// Preferred stroke color; `None` falls back to [`DEFAULT_STROKE_COLOR`].
    pub color: Option<String>,
}

impl JoinProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }

    pub fn with_color(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Some(color.into()),
        }
    }
}

/// A connected participant as seen by every client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    /// Connection-scoped identity, assigned by the server, never reused.
    pub id: Uuid,
    /// Display name, fixed at join.
    pub name: String,
    /// Current stroke color.
    pub color: String,
    /// Last known cursor position, `(0, 0)` until the first cursor event.
    pub cursor: CursorPosition,
}

impl Participant {
    /// Build a participant from a join profile.
    pub fn from_profile(id: Uuid, profile: JoinProfile) -> Self {
        Self {
            id,
            name: profile.name,
            color: profile
                .color
                .unwrap_or_else(|| DEFAULT_STROKE_COLOR.to_string()),
            cursor: CursorPosition::ORIGIN,
        }
    }
}

/// A persisted stroke segment, stamped by the server on receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrawSegment {
    /// Participant that drew the segment. Remains a valid historical
    /// reference after that participant disconnects.
    pub participant_id: Uuid,
    /// Opaque stroke data (coordinates, tool, width, color).
    pub payload: Vec<u8>,
    /// Server receipt time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// A drawing operation submitted by a joined participant.
///
/// Only `Draw` and `ClearSurface` touch the history; `CursorMove` and
/// `ColorChange` mutate registry state and are relayed without being
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Operation {
    Draw { payload: Vec<u8> },
    CursorMove { position: CursorPosition },
    ColorChange { color: String },
    ClearSurface,
}

/// Client → server frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// First frame on a connection: join the session with a profile.
    Join(JoinProfile),
    /// Any subsequent drawing operation.
    Op(Operation),
}

/// Server → client frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerEvent {
    /// Replay snapshot sent to a joiner so its surface matches the server's.
    DrawingHistory(Vec<DrawSegment>),
    /// Full roster refresh, ordered by join time.
    UsersUpdate(Vec<Participant>),
    /// A new participant joined (sent to everyone else).
    UserJoined(Participant),
    /// A participant disconnected.
    UserLeft(Uuid),
    /// A live stroke segment from another participant.
    Draw(DrawSegment),
    /// Another participant moved their cursor.
    CursorMoved {
        participant_id: Uuid,
        position: CursorPosition,
    },
    /// Another participant changed their stroke color.
    ColorChanged {
        participant_id: Uuid,
        color: String,
    },
    /// The surface was cleared.
    ClearCanvas,
}

impl ClientMessage {
    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(msg)
    }
}

impl ServerEvent {
    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (event, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(event)
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_roundtrip() {
        let msg = ClientMessage::Join(JoinProfile::with_color("Alice", "#ff5733"));
        let encoded = msg.encode().unwrap();
        let decoded = ClientMessage::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_operation_roundtrip() {
        let msg = ClientMessage::Op(Operation::Draw {
            payload: vec![1, 2, 3, 4, 5],
        });
        let encoded = msg.encode().unwrap();
        match ClientMessage::decode(&encoded).unwrap() {
            ClientMessage::Op(Operation::Draw { payload }) => {
                assert_eq!(payload, vec![1, 2, 3, 4, 5]);
            }
            other => panic!("Expected Draw, got {other:?}"),
        }
    }

    #[test]
    fn test_server_event_roundtrip() {
        let segment = DrawSegment {
            participant_id: Uuid::new_v4(),
            payload: vec![9, 8, 7],
            timestamp_ms: 1_700_000_000_000,
        };
        let event = ServerEvent::DrawingHistory(vec![segment.clone()]);
        let encoded = event.encode().unwrap();
        match ServerEvent::decode(&encoded).unwrap() {
            ServerEvent::DrawingHistory(history) => {
                assert_eq!(history, vec![segment]);
            }
            other => panic!("Expected DrawingHistory, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        assert!(ClientMessage::decode(&garbage).is_err());
        assert!(ServerEvent::decode(&garbage).is_err());
    }

    #[test]
    fn test_participant_default_color() {
        let p = Participant::from_profile(Uuid::new_v4(), JoinProfile::new("Bob"));
        assert_eq!(p.color, DEFAULT_STROKE_COLOR);
        assert_eq!(p.cursor, CursorPosition::ORIGIN);
    }

    #[test]
    fn test_participant_preferred_color() {
        let p = Participant::from_profile(
            Uuid::new_v4(),
            JoinProfile::with_color("Carol", "#00aaff"),
        );
        assert_eq!(p.color, "#00aaff");
    }

    #[test]
    fn test_draw_frame_size_efficient() {
        // Typical small stroke segment: ~50 bytes of path data
        let msg = ClientMessage::Op(Operation::Draw {
            payload: vec![0u8; 50],
        });
        let encoded = msg.encode().unwrap();
        assert!(
            encoded.len() < 80,
            "Encoded size {} too large for 50-byte payload",
            encoded.len()
        );
    }
}
