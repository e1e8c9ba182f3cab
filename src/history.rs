//! Bounded, append-only log of persisted drawing operations.
//!
//! The log backs replay snapshots for late joiners: a new participant
//! replays the retained segments in insertion order to reconstruct the
//! current surface. Capacity is fixed at construction; once full, the
//! oldest entries are evicted from the head. Eviction never reorders the
//! remaining entries.

use std::collections::VecDeque;

use crate::protocol::DrawSegment;

/// Default number of retained segments.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Capacity-bounded history of draw segments.
///
/// Insertion order is server receipt order. A clear-surface operation
/// truncates the log and is itself not retained — an empty log already
/// represents a blank surface.
#[derive(Debug)]
pub struct DrawingHistory {
    segments: VecDeque<DrawSegment>,
    capacity: usize,
}

impl DrawingHistory {
    /// Create an empty log retaining at most `capacity` segments.
    ///
    /// `capacity = 0` disables history: appends are dropped and snapshots
    /// are always empty.
    pub fn new(capacity: usize) -> Self {
        Self {
            segments: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a segment to the tail, evicting from the head while over
    /// capacity. O(1) amortized.
    pub fn append(&mut self, segment: DrawSegment) {
        if self.capacity == 0 {
            return;
        }
        self.segments.push_back(segment);
        while self.segments.len() > self.capacity {
            self.segments.pop_front();
        }
    }

    /// Empty the log.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Current contents in insertion order, as a point-in-time copy.
    pub fn snapshot(&self) -> Vec<DrawSegment> {
        self.segments.iter().cloned().collect()
    }

    /// Number of retained segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Configured retention bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DrawingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
