//! Identity registry.
//!
//! Maps each identified session to its user record, and each resume token to
//! the session currently holding it. The token index is what lets a new
//! transport session take over an identity after a reconnect, so it must stay
//! in lockstep with the record map: one token, at most one live session.
//!
//! The registry owns `current_room` but never validates it. Only the
//! [`RoomDirectory`](crate::RoomDirectory) writes that field, as part of the
//! same join/leave call that updates the room's member list.

use std::collections::{BTreeMap, HashMap};

use parley_proto::{OnlineUser, ResumeToken, SessionId};

use crate::error::IntentError;

/// Default limit for display and room names, in characters.
pub const DEFAULT_MAX_NAME_LEN: usize = 64;

/// The identity behind one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Session this identity is attached to
    pub session: SessionId,
    /// Trimmed display name
    pub display_name: String,
    /// Room the session is in, if any
    pub current_room: Option<String>,
    /// Token that resumes this identity from another session
    pub resume_token: ResumeToken,
}

/// Keyed store of identified sessions.
#[derive(Debug)]
pub struct IdentityRegistry {
    /// Session → record. Ordered so online-user lists are stable.
    users: BTreeMap<SessionId, UserRecord>,
    /// Resume token → session (reverse index)
    tokens: HashMap<ResumeToken, SessionId>,
    max_name_len: usize,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    /// Create an empty registry with the default name limit.
    pub fn new() -> Self {
        Self::with_max_name_len(DEFAULT_MAX_NAME_LEN)
    }

    /// Create an empty registry with a custom name limit.
    pub fn with_max_name_len(max_name_len: usize) -> Self {
        Self { users: BTreeMap::new(), tokens: HashMap::new(), max_name_len }
    }

    /// Trim and validate a display name without registering anything.
    pub fn normalize_name(&self, raw: &str) -> Result<String, IntentError> {
        let name = raw.trim();
        if name.is_empty() || name.chars().count() > self.max_name_len {
            return Err(IntentError::InvalidName { max: self.max_name_len });
        }
        Ok(name.to_string())
    }

    /// Register (or re-register) a session under a display name.
    ///
    /// Re-registering replaces the prior record, including its token. The new
    /// record starts outside any room; callers that re-register a session
    /// already in a room must take it out of the room first.
    ///
    /// If `token` is currently held by a different session, that session's
    /// claim on it is dropped (its record stays, so the caller must detach it).
    pub fn register(
        &mut self,
        session: SessionId,
        display_name: &str,
        token: ResumeToken,
    ) -> Result<&UserRecord, IntentError> {
        let display_name = self.normalize_name(display_name)?;

        if let Some(old) = self.users.get(&session) {
            if old.resume_token != token {
                self.tokens.remove(&old.resume_token);
            }
        }
        self.tokens.insert(token, session);

        let record = UserRecord { session, display_name, current_room: None, resume_token: token };
        self.users.insert(session, record);
        Ok(&self.users[&session])
    }

    /// Record for a session. `None` if the session is not identified.
    pub fn lookup(&self, session: SessionId) -> Option<&UserRecord> {
        self.users.get(&session)
    }

    /// Check if a session is identified.
    pub fn contains(&self, session: SessionId) -> bool {
        self.users.contains_key(&session)
    }

    /// Overwrite a session's current room.
    ///
    /// Returns `false` if the session is not identified.
    pub fn set_room(&mut self, session: SessionId, room: Option<String>) -> bool {
        match self.users.get_mut(&session) {
            Some(record) => {
                record.current_room = room;
                true
            },
            None => false,
        }
    }

    /// Remove a session's record and release its token.
    ///
    /// The session must already be out of its room, or it will linger in the
    /// room's member list with no identity behind it.
    pub fn remove(&mut self, session: SessionId) -> Option<UserRecord> {
        let record = self.users.remove(&session)?;
        if self.tokens.get(&record.resume_token) == Some(&session) {
            self.tokens.remove(&record.resume_token);
        }
        Some(record)
    }

    /// Session currently holding a resume token.
    pub fn session_for_token(&self, token: ResumeToken) -> Option<SessionId> {
        self.tokens.get(&token).copied()
    }

    /// All identified sessions as an online-user list, ordered by session id.
    pub fn online_users(&self) -> Vec<OnlineUser> {
        self.users
            .values()
            .map(|r| OnlineUser { session: r.session, display_name: r.display_name.clone() })
            .collect()
    }

    /// All records, ordered by session id.
    pub fn iter(&self) -> impl Iterator<Item = &UserRecord> + '_ {
        self.users.values()
    }

    /// Number of identified sessions.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check if no session is identified.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_A: ResumeToken = ResumeToken(0xaaaa);
    const TOKEN_B: ResumeToken = ResumeToken(0xbbbb);

    #[test]
    fn register_and_lookup() {
        let mut registry = IdentityRegistry::new();

        let record = registry.register(SessionId(1), "  alice ", TOKEN_A).unwrap();
        assert_eq!(record.display_name, "alice");
        assert_eq!(record.current_room, None);

        assert!(registry.contains(SessionId(1)));
        assert!(!registry.contains(SessionId(2)));
        assert_eq!(registry.session_for_token(TOKEN_A), Some(SessionId(1)));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut registry = IdentityRegistry::new();

        assert_eq!(
            registry.register(SessionId(1), " \t ", TOKEN_A).unwrap_err(),
            IntentError::InvalidName { max: DEFAULT_MAX_NAME_LEN }
        );
        assert!(registry.is_empty());
        assert_eq!(registry.session_for_token(TOKEN_A), None);
    }

    #[test]
    fn overlong_name_is_rejected() {
        let mut registry = IdentityRegistry::with_max_name_len(4);

        assert!(registry.register(SessionId(1), "abcd", TOKEN_A).is_ok());
        assert!(registry.register(SessionId(2), "abcde", TOKEN_B).is_err());
    }

    #[test]
    fn reregister_replaces_record_and_token() {
        let mut registry = IdentityRegistry::new();

        registry.register(SessionId(1), "alice", TOKEN_A).unwrap();
        registry.set_room(SessionId(1), Some("general".into()));
        registry.register(SessionId(1), "alicia", TOKEN_B).unwrap();

        let record = registry.lookup(SessionId(1)).unwrap();
        assert_eq!(record.display_name, "alicia");
        assert_eq!(record.current_room, None);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.session_for_token(TOKEN_A), None);
        assert_eq!(registry.session_for_token(TOKEN_B), Some(SessionId(1)));
    }

    #[test]
    fn token_moves_to_new_session() {
        let mut registry = IdentityRegistry::new();

        registry.register(SessionId(1), "alice", TOKEN_A).unwrap();
        registry.register(SessionId(2), "alice", TOKEN_A).unwrap();
        assert_eq!(registry.session_for_token(TOKEN_A), Some(SessionId(2)));

        // Removing the stale session must not release the moved token
        registry.remove(SessionId(1));
        assert_eq!(registry.session_for_token(TOKEN_A), Some(SessionId(2)));
    }

    #[test]
    fn set_room_on_unknown_session_fails() {
        let mut registry = IdentityRegistry::new();
        assert!(!registry.set_room(SessionId(5), Some("general".into())));
    }

    #[test]
    fn remove_releases_token() {
        let mut registry = IdentityRegistry::new();

        registry.register(SessionId(1), "alice", TOKEN_A).unwrap();
        let record = registry.remove(SessionId(1)).unwrap();

        assert_eq!(record.display_name, "alice");
        assert!(!registry.contains(SessionId(1)));
        assert_eq!(registry.session_for_token(TOKEN_A), None);
        assert!(registry.remove(SessionId(1)).is_none());
    }

    #[test]
    fn online_users_ordered_by_session() {
        let mut registry = IdentityRegistry::new();

        registry.register(SessionId(9), "zed", TOKEN_A).unwrap();
        registry.register(SessionId(3), "amy", TOKEN_B).unwrap();

        let users = registry.online_users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].session, SessionId(3));
        assert_eq!(users[1].display_name, "zed");
    }
}
