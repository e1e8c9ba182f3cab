//! Participant registry: the roster of currently connected participants.
//!
//! The registry exclusively owns each [`Participant`]; the session hub
//! reads and writes through it and never holds a second copy. All
//! mutations are synchronous and immediately visible to the next
//! [`snapshot`](ParticipantRegistry::snapshot) — broadcasting is the
//! hub's responsibility.

use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::{CursorPosition, JoinProfile, Participant};

/// Registry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The connection already has a registered participant.
    DuplicateJoin,
    /// No participant with that id — typically a stale event racing a
    /// disconnect. Callers drop the event silently.
    NotFound,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateJoin => write!(f, "Connection already joined"),
            Self::NotFound => write!(f, "Participant not found"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Roster of connected participants, keyed by connection id.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<Uuid, Participant>,
    /// Join order, for deterministic roster snapshots.
    order: Vec<Uuid>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant for the given connection.
    ///
    /// Fails with [`RegistryError::DuplicateJoin`] if the connection
    /// already joined.
    pub fn join(&mut self, id: Uuid, profile: JoinProfile) -> Result<Participant, RegistryError> {
        if self.participants.contains_key(&id) {
            return Err(RegistryError::DuplicateJoin);
        }
        let participant = Participant::from_profile(id, profile);
        self.participants.insert(id, participant.clone());
        self.order.push(id);
        Ok(participant)
    }

    /// Remove the participant for a connection.
    ///
    /// Returns the removed participant, or `None` if the id was absent.
    /// A disconnect-before-join race is tolerated silently.
    pub fn leave(&mut self, id: Uuid) -> Option<Participant> {
        let removed = self.participants.remove(&id);
        if removed.is_some() {
            self.order.retain(|existing| *existing != id);
        }
        removed
    }

    /// Update a participant's cursor position in place.
    pub fn update_cursor(
        &mut self,
        id: Uuid,
        position: CursorPosition,
    ) -> Result<(), RegistryError> {
        let participant = self.participants.get_mut(&id).ok_or(RegistryError::NotFound)?;
        participant.cursor = position;
        Ok(())
    }

    /// Update a participant's stroke color in place.
    pub fn update_color(&mut self, id: Uuid, color: String) -> Result<(), RegistryError> {
        let participant = self.participants.get_mut(&id).ok_or(RegistryError::NotFound)?;
        participant.color = color;
        Ok(())
    }

    /// Whether a connection has a registered participant.
    pub fn contains(&self, id: Uuid) -> bool {
        self.participants.contains_key(&id)
    }

    /// Look up a participant.
    pub fn get(&self, id: Uuid) -> Option<&Participant> {
        self.participants.get(&id)
    }

    /// Number of connected participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Point-in-time copy of the roster, ordered by join time.
    pub fn snapshot(&self) -> Vec<Participant> {
        self.order
            .iter()
            .filter_map(|id| self.participants.get(id).cloned())
            .collect()
    }
}
