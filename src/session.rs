//! Session hub: the single serialization point for one shared surface.
//!
//! Architecture:
//! ```text
//! Connection A ──┐                       ┌──► outbox A (bounded mpsc)
//! Connection B ──┼──► SessionHub ────────┼──► outbox B
//! Connection C ──┘    (one critical      └──► outbox C
//!                      section: registry
//!                      + drawing history)
//! ```
//!
//! Every join, operation, and disconnect is applied under one lock, so
//! concurrent events from different connections are totally ordered by
//! server receipt. Delivery is decoupled per recipient: events are pushed
//! into each connection's bounded outbox with a non-blocking send, so a
//! slow recipient drops events instead of stalling the hub (at-most-once
//! relay).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::history::{DrawingHistory, DEFAULT_HISTORY_CAPACITY};
use crate::protocol::{DrawSegment, JoinProfile, Operation, Participant, ServerEvent};
use crate::registry::{ParticipantRegistry, RegistryError};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of draw segments retained for late-joiner replay.
    pub history_capacity: usize,
    /// Events buffered per connection before the hub starts dropping.
    pub outbox_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            outbox_capacity: 256,
        }
    }
}

/// Counters for monitoring session health.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub events_sent: u64,
    pub events_dropped: u64,
    pub operations_applied: u64,
    pub stale_operations_dropped: u64,
    pub active_participants: usize,
}

/// Atomic counters — no lock needed on the delivery path.
#[derive(Default)]
struct AtomicSessionStats {
    events_sent: AtomicU64,
    events_dropped: AtomicU64,
    operations_applied: AtomicU64,
    stale_operations_dropped: AtomicU64,
}

/// Mutable session state guarded by the hub's single lock.
struct SessionState {
    registry: ParticipantRegistry,
    history: DrawingHistory,
    /// Outbound queues, keyed by connection id. Present only for joined
    /// connections.
    outboxes: HashMap<Uuid, mpsc::Sender<ServerEvent>>,
}

/// The synchronization hub for one drawing session.
///
/// One instance per shared surface; embedders that need several
/// independent surfaces instantiate several hubs. All methods are
/// synchronous and safe to call concurrently from transport tasks.
pub struct SessionHub {
    state: Mutex<SessionState>,
    outbox_capacity: usize,
    stats: AtomicSessionStats,
}

impl SessionHub {
    /// Create a hub with the given configuration.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: Mutex::new(SessionState {
                registry: ParticipantRegistry::new(),
                history: DrawingHistory::new(config.history_capacity),
                outboxes: HashMap::new(),
            }),
            outbox_capacity: config.outbox_capacity,
            stats: AtomicSessionStats::default(),
        }
    }

    /// Create a hub with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SessionConfig::default())
    }

    /// Join the session on behalf of a connection.
    ///
    /// On success the joiner's outbox receiver is returned; its first
    /// events are the drawing-history replay snapshot followed by a full
    /// roster refresh. Everyone else receives `UserJoined` and the same
    /// roster refresh. Fails with [`RegistryError::DuplicateJoin`] if the
    /// connection already joined; the existing participant is untouched.
    pub fn join(
        &self,
        connection_id: Uuid,
        profile: JoinProfile,
    ) -> Result<(Participant, mpsc::Receiver<ServerEvent>), RegistryError> {
        let mut state = self.lock_state();

        let participant = state.registry.join(connection_id, profile)?;
        let (tx, rx) = mpsc::channel(self.outbox_capacity);
        state.outboxes.insert(connection_id, tx);

        log::info!(
            "Participant {} ({}) joined, {} connected",
            participant.name,
            participant.id,
            state.registry.len()
        );

        let replay = state.history.snapshot();
        let roster = state.registry.snapshot();
        self.send_to(&state, connection_id, ServerEvent::DrawingHistory(replay));
        self.broadcast_except(
            &state,
            connection_id,
            ServerEvent::UserJoined(participant.clone()),
        );
        self.broadcast_all(&state, ServerEvent::UsersUpdate(roster));

        Ok((participant, rx))
    }

    /// Apply an operation from a connection.
    ///
    /// Operations from connections that never joined (or already left)
    /// are dropped silently. Applied operations are relayed to everyone
    /// except the sender, who already holds the authoritative local copy.
    pub fn handle_operation(&self, connection_id: Uuid, op: Operation) {
        let mut state = self.lock_state();

        if !state.registry.contains(connection_id) {
            log::debug!("Dropping {op:?} from unregistered connection {connection_id}");
            self.stats
                .stale_operations_dropped
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        match op {
            Operation::Draw { payload } => {
                let segment = DrawSegment {
                    participant_id: connection_id,
                    payload,
                    timestamp_ms: now_ms(),
                };
                state.history.append(segment.clone());
                self.broadcast_except(&state, connection_id, ServerEvent::Draw(segment));
            }
            Operation::CursorMove { position } => {
                match state.registry.update_cursor(connection_id, position) {
                    Ok(()) => self.broadcast_except(
                        &state,
                        connection_id,
                        ServerEvent::CursorMoved {
                            participant_id: connection_id,
                            position,
                        },
                    ),
                    Err(RegistryError::NotFound) => {
                        log::debug!("Cursor update for departed participant {connection_id}");
                        return;
                    }
                    Err(_) => return,
                }
            }
            Operation::ColorChange { color } => {
                match state.registry.update_color(connection_id, color.clone()) {
                    Ok(()) => self.broadcast_except(
                        &state,
                        connection_id,
                        ServerEvent::ColorChanged {
                            participant_id: connection_id,
                            color,
                        },
                    ),
                    Err(RegistryError::NotFound) => {
                        log::debug!("Color change for departed participant {connection_id}");
                        return;
                    }
                    Err(_) => return,
                }
            }
            Operation::ClearSurface => {
                state.history.clear();
                self.broadcast_except(&state, connection_id, ServerEvent::ClearCanvas);
            }
        }

        self.stats.operations_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Handle a connection closing.
    ///
    /// A disconnect during the connecting phase (never joined) is a silent
    /// no-op, so disconnect races with in-flight operations are harmless.
    pub fn disconnect(&self, connection_id: Uuid) {
        let mut state = self.lock_state();
        state.outboxes.remove(&connection_id);

        let Some(departed) = state.registry.leave(connection_id) else {
            log::debug!("Disconnect for connection {connection_id} that never joined");
            return;
        };

        log::info!(
            "Participant {} ({}) left, {} remaining",
            departed.name,
            departed.id,
            state.registry.len()
        );

        let roster = state.registry.snapshot();
        self.broadcast_all(&state, ServerEvent::UserLeft(departed.id));
        self.broadcast_all(&state, ServerEvent::UsersUpdate(roster));
    }

    /// Number of currently joined participants.
    pub fn participant_count(&self) -> usize {
        self.lock_state().registry.len()
    }

    /// Point-in-time roster, ordered by join time.
    pub fn roster(&self) -> Vec<Participant> {
        self.lock_state().registry.snapshot()
    }

    /// Point-in-time replay snapshot of the drawing history.
    pub fn history_snapshot(&self) -> Vec<DrawSegment> {
        self.lock_state().history.snapshot()
    }

    /// Session counters.
    pub fn stats(&self) -> SessionStats {
        let active_participants = self.participant_count();
        SessionStats {
            events_sent: self.stats.events_sent.load(Ordering::Relaxed),
            events_dropped: self.stats.events_dropped.load(Ordering::Relaxed),
            operations_applied: self.stats.operations_applied.load(Ordering::Relaxed),
            stale_operations_dropped: self
                .stats
                .stale_operations_dropped
                .load(Ordering::Relaxed),
            active_participants,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an event into one connection's outbox without blocking.
    fn send_to(&self, state: &SessionState, target: Uuid, event: ServerEvent) {
        let Some(outbox) = state.outboxes.get(&target) else {
            return;
        };
        match outbox.try_send(event) {
            Ok(()) => {
                self.stats.events_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                // Full or closed outbox: drop and move on, never stall
                log::debug!("Dropping event for {target}: {err}");
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Relay an event to every joined connection except `sender`.
    fn broadcast_except(&self, state: &SessionState, sender: Uuid, event: ServerEvent) {
        let targets: Vec<Uuid> = state
            .outboxes
            .keys()
            .filter(|id| **id != sender)
            .copied()
            .collect();
        for target in targets {
            self.send_to(state, target, event.clone());
        }
    }

    /// Relay an event to every joined connection.
    fn broadcast_all(&self, state: &SessionState, event: ServerEvent) {
        let targets: Vec<Uuid> = state.outboxes.keys().copied().collect();
        for target in targets {
            self.send_to(state, target, event.clone());
        }
    }
}

/// Milliseconds since the Unix epoch, for stamping draw segments.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
