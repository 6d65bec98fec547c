//! Room history.
//!
//! Keeps the most recent member messages of each room in memory so a session
//! joining later can catch up. Buffers are bounded: once a room holds
//! `capacity` envelopes, recording another evicts the oldest. Nothing here
//! survives a restart.

use std::collections::{HashMap, VecDeque};

use parley_proto::Envelope;

/// Default number of envelopes kept per room.
pub const DEFAULT_HISTORY_LEN: usize = 500;

/// Bounded per-room message buffers.
#[derive(Debug)]
pub struct RoomHistory {
    rooms: HashMap<String, VecDeque<Envelope>>,
    capacity: usize,
}

impl Default for RoomHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl RoomHistory {
    /// Create empty history keeping up to `capacity` envelopes per room.
    ///
    /// A capacity of zero records nothing.
    pub fn new(capacity: usize) -> Self {
        Self { rooms: HashMap::new(), capacity }
    }

    /// Append an envelope to its room's buffer.
    ///
    /// Envelopes without a room audience are ignored.
    pub fn record(&mut self, envelope: &Envelope) {
        if self.capacity == 0 {
            return;
        }
        let Some(room) = envelope.room() else {
            return;
        };

        let buffer = self.rooms.entry(room.to_string()).or_default();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(envelope.clone());

        debug_assert!(buffer.len() <= self.capacity);
    }

    /// Buffered envelopes of a room, oldest first.
    pub fn replay(&self, room: &str) -> Vec<Envelope> {
        self.rooms.get(room).map(|b| b.iter().cloned().collect()).unwrap_or_default()
    }

    /// Forget a room's buffer. Returns `true` if it held anything.
    pub fn remove(&mut self, room: &str) -> bool {
        self.rooms.remove(room).is_some()
    }

    /// Number of rooms with buffered envelopes.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Buffer capacity per room.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
