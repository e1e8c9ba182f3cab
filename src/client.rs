//! WebSocket client for joining a whiteboard session.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect)
//! - Join with a display profile
//! - Draw / cursor / color / clear send helpers
//! - Decoded server events through an mpsc channel
//!
//! There is no reconnect-with-identity: a client that reconnects joins as
//! a brand-new participant, and events sent while disconnected are lost
//! (at-most-once relay is accepted by design).

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::protocol::{
    ClientMessage, CursorPosition, DrawSegment, JoinProfile, Operation, Participant,
    ProtocolError, ServerEvent,
};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events emitted by the session client.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Connection established and join sent.
    Connected,
    /// Connection lost.
    Disconnected,
    /// Replay snapshot received at join time.
    History(Vec<DrawSegment>),
    /// Full roster refresh.
    Roster(Vec<Participant>),
    /// Another participant joined.
    ParticipantJoined(Participant),
    /// A participant left.
    ParticipantLeft(Uuid),
    /// A live stroke from another participant.
    Draw(DrawSegment),
    /// Another participant moved their cursor.
    CursorMoved {
        participant_id: Uuid,
        position: CursorPosition,
    },
    /// Another participant changed color.
    ColorChanged {
        participant_id: Uuid,
        color: String,
    },
    /// The surface was cleared.
    Cleared,
}

/// The session client.
pub struct SessionClient {
    profile: JoinProfile,
    state: Arc<RwLock<ConnectionState>>,
    /// Channel to the WebSocket writer task.
    outgoing_tx: Option<mpsc::Sender<Message>>,
    /// Event receiver handed to the application.
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
    /// Event sender (cloned into the reader task).
    event_tx: mpsc::Sender<SessionEvent>,
    server_url: String,
}

impl SessionClient {
    /// Create a new client for the given profile and server URL.
    pub fn new(profile: JoinProfile, server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            profile,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Connect to the server and join the session.
    ///
    /// Spawns background tasks for reading/writing WebSocket messages.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_result = tokio_tungstenite::connect_async(&self.server_url).await;
        let (ws_stream, _) = match ws_result {
            Ok(ok) => ok,
            Err(_) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };

        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward the outgoing channel onto the socket
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
        self.outgoing_tx = Some(out_tx);
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let is_close = matches!(msg, Message::Close(_));
                if ws_writer.send(msg).await.is_err() || is_close {
                    break;
                }
            }
        });

        // Join with our profile before anything else
        let join = ClientMessage::Join(self.profile.clone());
        self.send_frame(&join).await?;

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(SessionEvent::Connected).await;

        // Reader task: decode server events
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        match ServerEvent::decode(&bytes) {
                            Ok(event) => {
                                let _ = event_tx.send(to_session_event(event)).await;
                            }
                            Err(e) => {
                                log::warn!("Failed to decode server event: {e}");
                            }
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(SessionEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Send a stroke segment (opaque payload).
    pub async fn send_draw(&self, payload: Vec<u8>) -> Result<(), ProtocolError> {
        self.send_frame(&ClientMessage::Op(Operation::Draw { payload }))
            .await
    }

    /// Send a cursor position update.
    pub async fn send_cursor(&self, position: CursorPosition) -> Result<(), ProtocolError> {
        self.send_frame(&ClientMessage::Op(Operation::CursorMove { position }))
            .await
    }

    /// Send a stroke color change.
    pub async fn send_color(&self, color: impl Into<String>) -> Result<(), ProtocolError> {
        self.send_frame(&ClientMessage::Op(Operation::ColorChange {
            color: color.into(),
        }))
        .await
    }

    /// Ask the server to clear the shared surface.
    pub async fn send_clear(&self) -> Result<(), ProtocolError> {
        self.send_frame(&ClientMessage::Op(Operation::ClearSurface))
            .await
    }

    /// Close the connection cleanly.
    ///
    /// Reconnecting afterward joins as a brand-new participant.
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.outgoing_tx.take() {
            let _ = tx.send(Message::Close(None)).await;
        }
        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// The join profile this client connects with.
    pub fn profile(&self) -> &JoinProfile {
        &self.profile
    }

    /// The server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn send_frame(&self, msg: &ClientMessage) -> Result<(), ProtocolError> {
        let encoded = msg.encode()?;
        let tx = self
            .outgoing_tx
            .as_ref()
            .ok_or(ProtocolError::ConnectionClosed)?;
        tx.send(Message::Binary(encoded.into()))
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }
}

/// Map a wire event onto the client event surface.
fn to_session_event(event: ServerEvent) -> SessionEvent {
    match event {
        ServerEvent::DrawingHistory(history) => SessionEvent::History(history),
        ServerEvent::UsersUpdate(roster) => SessionEvent::Roster(roster),
        ServerEvent::UserJoined(participant) => SessionEvent::ParticipantJoined(participant),
        ServerEvent::UserLeft(id) => SessionEvent::ParticipantLeft(id),
        ServerEvent::Draw(segment) => SessionEvent::Draw(segment),
        ServerEvent::CursorMoved {
            participant_id,
            position,
        } => SessionEvent::CursorMoved {
            participant_id,
            position,
        },
        ServerEvent::ColorChanged {
            participant_id,
            color,
        } => SessionEvent::ColorChanged {
            participant_id,
            color,
        },
        ServerEvent::ClearCanvas => SessionEvent::Cleared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SessionClient::new(JoinProfile::new("Alice"), "ws://localhost:9090");
        assert_eq!(client.profile().name, "Alice");
        assert_eq!(client.server_url(), "ws://localhost:9090");
    }

    #[tokio::test]
    async fn test_client_initial_state() {
        let client = SessionClient::new(JoinProfile::new("Alice"), "ws://localhost:9090");
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let client = SessionClient::new(JoinProfile::new("Alice"), "ws://localhost:9090");
        assert!(client.send_draw(vec![1, 2, 3]).await.is_err());
        assert!(client.send_clear().await.is_err());
    }

    #[tokio::test]
    async fn test_take_event_rx() {
        let mut client = SessionClient::new(JoinProfile::new("Alice"), "ws://localhost:9090");
        assert!(client.take_event_rx().is_some());
        assert!(client.take_event_rx().is_none());
    }

    #[test]
    fn test_event_mapping() {
        let id = Uuid::new_v4();
        match to_session_event(ServerEvent::UserLeft(id)) {
            SessionEvent::ParticipantLeft(left) => assert_eq!(left, id),
            other => panic!("Expected ParticipantLeft, got {other:?}"),
        }
        assert!(matches!(
            to_session_event(ServerEvent::ClearCanvas),
            SessionEvent::Cleared
        ));
    }
}
