//! # whiteboard-sync — Real-time session synchronization for a shared drawing surface
//!
//! Relays strokes, cursor moves, color changes, and clear commands between
//! every participant of a session, in a single consistent order, and brings
//! late joiners up to the current surface state from a bounded history.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     WebSocket      ┌───────────────┐
//! │ SessionClient │ ◄─────────────────► │  BoardServer  │
//! │ (per user)    │    Binary Proto     │  (central)    │
//! └───────────────┘                     └───────┬───────┘
//!                                               │
//!                                       ┌───────┴───────┐
//!                                       │  SessionHub   │
//!                                       │ (serializes   │
//!                                       │  all events)  │
//!                                       └───┬───────┬───┘
//!                                           │       │
//!                               ┌───────────┴┐     ┌┴──────────────┐
//!                               │ Participant│     │ DrawingHistory│
//!                               │ Registry   │     │ (bounded log) │
//!                               └────────────┘     └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — Binary wire protocol (bincode-encoded frames)
//! - [`registry`] — Roster of connected participants
//! - [`history`] — Bounded log of draw segments for late-joiner replay
//! - [`session`] — The hub: ordering, relay, and replay policy
//! - [`server`] — WebSocket transport adapter
//! - [`client`] — WebSocket client with decoded event stream
//!
//! ## Guarantees
//!
//! | Property | Policy |
//! |----------|--------|
//! | Ordering | Server receipt order, one critical section per session |
//! | Delivery | At-most-once; slow recipients drop, never stall the hub |
//! | Replay | Last N segments (default 1000), cleared on clear-canvas |
//! | Races | Leave is idempotent; stale events degrade to no-ops |

pub mod client;
pub mod history;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

// Re-exports for convenience
pub use client::{ConnectionState, SessionClient, SessionEvent};
pub use history::{DrawingHistory, DEFAULT_HISTORY_CAPACITY};
pub use protocol::{
    ClientMessage, CursorPosition, DrawSegment, JoinProfile, Operation, Participant,
    ProtocolError, ServerEvent, DEFAULT_STROKE_COLOR,
};
pub use registry::{ParticipantRegistry, RegistryError};
pub use server::{BoardServer, ServerConfig, ServerStats};
pub use session::{SessionConfig, SessionHub, SessionStats};
