//! WebSocket transport adapter for the session hub.
//!
//! Architecture:
//! ```text
//! Client A ──┐
//!             ├── WebSocket ── reader loop ──► SessionHub
//! Client B ──┘                                    │
//!                                     outbox per connection
//!                                          │
//!                                    writer task ──► WebSocket
//! ```
//!
//! Each accepted connection gets a fresh connection id and splits into a
//! reader loop (decodes [`ClientMessage`] frames and drives the hub) and a
//! writer task (drains the connection's outbox back onto the socket). The
//! adapter owns no session state; consistency lives entirely in
//! [`SessionHub`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::protocol::{ClientMessage, ServerEvent};
use crate::registry::RegistryError;
use crate::session::{SessionConfig, SessionHub, SessionStats};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: String,
    /// Draw segments retained for late-joiner replay.
    pub history_capacity: usize,
    /// Events buffered per connection before dropping.
    pub outbox_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9090".to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            outbox_capacity: 256,
        }
    }
}

/// Server-wide statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_messages: u64,
    pub total_bytes: u64,
}

#[derive(Default)]
struct AtomicServerStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    total_messages: AtomicU64,
    total_bytes: AtomicU64,
}

/// WebSocket server hosting one shared drawing session.
pub struct BoardServer {
    config: ServerConfig,
    hub: Arc<SessionHub>,
    stats: Arc<AtomicServerStats>,
}

impl BoardServer {
    /// Create a server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let hub = Arc::new(SessionHub::new(SessionConfig {
            history_capacity: config.history_capacity,
            outbox_capacity: config.outbox_capacity,
        }));
        Self {
            config,
            hub,
            stats: Arc::new(AtomicServerStats::default()),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Start accepting WebSocket connections.
    ///
    /// Runs the accept loop; call from an async runtime.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Whiteboard server listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let hub = self.hub.clone();
            let stats = self.stats.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, hub, stats).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection until it closes.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        hub: Arc<SessionHub>,
        stats: Arc<AtomicServerStats>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let connection_id = Uuid::new_v4();
        log::info!("WebSocket connection {connection_id} established from {addr}");

        stats.total_connections.fetch_add(1, Ordering::Relaxed);
        stats.active_connections.fetch_add(1, Ordering::Relaxed);

        // Populated once the client joins
        let mut writer_task: Option<tokio::task::JoinHandle<()>> = None;
        let (forward_tx, mut forward_rx) = mpsc::channel::<Vec<u8>>(64);

        loop {
            tokio::select! {
                // Encoded events from the writer side of the join
                frame = forward_rx.recv() => {
                    match frame {
                        Some(bytes) => {
                            if ws_sender.send(Message::Binary(bytes.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => {
                            let bytes: Vec<u8> = data.into();
                            stats.total_messages.fetch_add(1, Ordering::Relaxed);
                            stats.total_bytes.fetch_add(bytes.len() as u64, Ordering::Relaxed);

                            match ClientMessage::decode(&bytes) {
                                Ok(ClientMessage::Join(profile)) => {
                                    match hub.join(connection_id, profile) {
                                        Ok((participant, outbox_rx)) => {
                                            log::debug!(
                                                "Connection {connection_id} joined as {}",
                                                participant.name
                                            );
                                            writer_task = Some(spawn_writer(
                                                outbox_rx,
                                                forward_tx.clone(),
                                                connection_id,
                                            ));
                                        }
                                        Err(RegistryError::DuplicateJoin) => {
                                            log::warn!(
                                                "Connection {connection_id} sent a second join; ignoring"
                                            );
                                        }
                                        Err(e) => {
                                            log::warn!("Join failed for {connection_id}: {e}");
                                        }
                                    }
                                }
                                Ok(ClientMessage::Op(op)) => {
                                    hub.handle_operation(connection_id, op);
                                }
                                Err(e) => {
                                    log::warn!("Failed to decode frame from {addr}: {e}");
                                }
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("Connection {connection_id} closed from {addr}");
                            break;
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if ws_sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }

                        Some(Err(e)) => {
                            log::error!("WebSocket error from {addr}: {e}");
                            break;
                        }

                        _ => {}
                    }
                }
            }
        }

        hub.disconnect(connection_id);
        if let Some(task) = writer_task {
            task.abort();
        }
        stats.active_connections.fetch_sub(1, Ordering::Relaxed);

        Ok(())
    }

    /// The session hub backing this server.
    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    /// The configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Server-wide counters.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.stats.total_connections.load(Ordering::Relaxed),
            active_connections: self.stats.active_connections.load(Ordering::Relaxed),
            total_messages: self.stats.total_messages.load(Ordering::Relaxed),
            total_bytes: self.stats.total_bytes.load(Ordering::Relaxed),
        }
    }

    /// Session counters for the hosted session.
    pub fn session_stats(&self) -> SessionStats {
        self.hub.stats()
    }
}

/// Drain a joined connection's outbox, encoding events onto the socket
/// forwarder. Runs until the outbox or forwarder closes.
fn spawn_writer(
    mut outbox_rx: mpsc::Receiver<ServerEvent>,
    forward_tx: mpsc::Sender<Vec<u8>>,
    connection_id: Uuid,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = outbox_rx.recv().await {
            let encoded = match event.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::error!("Failed to encode event for {connection_id}: {e}");
                    continue;
                }
            };
            if forward_tx.send(encoded).await.is_err() {
                break;
            }
        }
        log::debug!("Writer task for {connection_id} finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:9090");
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.outbox_capacity, 256);
    }

    #[test]
    fn test_server_creation() {
        let server = BoardServer::with_defaults();
        assert_eq!(server.bind_addr(), "127.0.0.1:9090");
        assert_eq!(server.hub().participant_count(), 0);
    }

    #[test]
    fn test_server_custom_config() {
        let server = BoardServer::new(ServerConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
            history_capacity: 50,
            outbox_capacity: 32,
        });
        assert_eq!(server.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_server_stats_initial() {
        let server = BoardServer::with_defaults();
        let stats = server.stats();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.total_messages, 0);
        assert_eq!(stats.total_bytes, 0);
    }
}
