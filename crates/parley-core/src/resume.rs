//! Resume book.
//!
//! When an identified session drops, its identity is parked here under its
//! resume token. A later session presenting the token takes the identity back
//! and is placed in the room it was last in. Tickets expire after a
//! configurable time-to-live.
//!
//! Rooms owned by a parked identity stay owned by its old session id until
//! the ticket is claimed or expires.

use std::{collections::HashMap, time::Duration};

use parley_proto::{ResumeToken, SessionId, Visibility};

/// Identity held for a dropped session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkedIdentity<I> {
    /// Session the identity was last bound to
    pub session: SessionId,
    /// Display name to restore
    pub display_name: String,
    /// Room the session was in when it dropped, with its visibility
    pub last_room: Option<(String, Visibility)>,
    /// When the ticket was parked
    pub parked_at: I,
}

/// Parked identities keyed by resume token.
#[derive(Debug)]
pub struct ResumeBook<I> {
    tickets: HashMap<ResumeToken, ParkedIdentity<I>>,
}

impl<I> Default for ResumeBook<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> ResumeBook<I> {
    /// Create an empty book.
    pub fn new() -> Self {
        Self { tickets: HashMap::new() }
    }

    /// Park an identity. Replaces any ticket already under `token`.
    pub fn park(&mut self, token: ResumeToken, identity: ParkedIdentity<I>) {
        self.tickets.insert(token, identity);
    }

    /// Drop a ticket without claiming it.
    pub fn discard(&mut self, token: ResumeToken) -> bool {
        self.tickets.remove(&token).is_some()
    }

    /// Number of parked tickets.
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Check if no ticket is parked.
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

impl<I> ResumeBook<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Claim a ticket.
    ///
    /// Returns `None` for unknown tokens and for tickets older than `ttl`.
    /// An expired ticket stays in the book until [`Self::prune_expired`]
    /// hands it back.
    pub fn take(&mut self, token: ResumeToken, now: I, ttl: Duration) -> Option<ParkedIdentity<I>> {
        let ticket = self.tickets.get(&token)?;
        if now - ticket.parked_at > ttl {
            return None;
        }
        self.tickets.remove(&token)
    }

    /// Remove every ticket older than `ttl` and return them, oldest first.
    pub fn prune_expired(&mut self, now: I, ttl: Duration) -> Vec<ParkedIdentity<I>> {
        let expired: Vec<ResumeToken> = self
            .tickets
            .iter()
            .filter(|(_, ticket)| now - ticket.parked_at > ttl)
            .map(|(&token, _)| token)
            .collect();

        let mut removed: Vec<ParkedIdentity<I>> =
            expired.into_iter().filter_map(|token| self.tickets.remove(&token)).collect();
        removed.sort_by_key(|ticket| ticket.parked_at);
        removed
    }
}
