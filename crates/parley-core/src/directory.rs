//! Room directory.
//!
//! Owns every room's member list and enforces room lifecycle:
//!
//! - The default room always exists, is public, has no owner, and cannot be
//!   closed.
//! - `join` of an unknown name creates a public room owned by the joiner.
//!   Private rooms only come into being through [`RoomDirectory::ensure_room`].
//! - A room other than the default is deleted the moment its last member
//!   leaves, or when its owner closes it.
//!
//! Join, leave, and close take the [`IdentityRegistry`] so that a member list
//! and the matching `current_room` fields change in the same call. Nothing
//! outside this module writes `current_room`.

use std::collections::HashMap;

use parley_proto::{DEFAULT_ROOM, RoomSummary, SessionId, Visibility};

use crate::{
    error::IntentError,
    registry::{DEFAULT_MAX_NAME_LEN, IdentityRegistry},
};

/// A named group of sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Unique name
    pub name: String,
    /// Public rooms are listed; private rooms are joined by exact name
    pub visibility: Visibility,
    /// Creator, or `None` for the default room and orphaned rooms
    pub owner: Option<SessionId>,
    /// Members in join order
    members: Vec<SessionId>,
    /// Creation order, used to keep the public list stable
    created_seq: u64,
}

impl Room {
    fn new(name: String, visibility: Visibility, owner: Option<SessionId>, created_seq: u64) -> Self {
        Self { name, visibility, owner, members: Vec::new(), created_seq }
    }

    /// Members in join order.
    pub fn members(&self) -> &[SessionId] {
        &self.members
    }

    /// Check if a session is a member.
    pub fn is_member(&self, session: SessionId) -> bool {
        self.members.contains(&session)
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if this is the default room.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ROOM
    }

    /// Point-in-time copy of the room's public attributes.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            name: self.name.clone(),
            owner: self.owner,
            visibility: self.visibility,
            member_count: self.members.len(),
        }
    }

    fn remove_member(&mut self, session: SessionId) -> bool {
        let before = self.members.len();
        self.members.retain(|&m| m != session);
        self.members.len() != before
    }
}

/// Room attributes as of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room name
    pub name: String,
    /// Owner at snapshot time
    pub owner: Option<SessionId>,
    /// Visibility
    pub visibility: Visibility,
    /// Members at snapshot time
    pub member_count: usize,
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The room joined
    pub room: RoomSnapshot,
    /// The room did not exist and was created by this join
    pub created: bool,
    /// The session was already a member; nothing changed
    pub already_member: bool,
    /// Implicit leave of the previous room, if any
    pub left: Option<LeaveOutcome>,
}

/// Result of removing a session from its room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Room that was left
    pub room: String,
    /// Its visibility
    pub visibility: Visibility,
    /// The room became empty and was deleted
    pub deleted: bool,
}

/// Result of a successful close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    /// Room that was closed
    pub room: String,
    /// Its visibility
    pub visibility: Visibility,
    /// Sessions that were in the room, in join order; now in no room
    pub evicted: Vec<SessionId>,
}

/// Directory of all live rooms.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: HashMap<String, Room>,
    next_seq: u64,
    max_name_len: usize,
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomDirectory {
    /// Create a directory holding only the default room.
    pub fn new() -> Self {
        Self::with_max_name_len(DEFAULT_MAX_NAME_LEN)
    }

    /// Create a directory with a custom room-name limit.
    pub fn with_max_name_len(max_name_len: usize) -> Self {
        let mut rooms = HashMap::new();
        rooms.insert(
            DEFAULT_ROOM.to_string(),
            Room::new(DEFAULT_ROOM.to_string(), Visibility::Public, None, 0),
        );
        Self { rooms, next_seq: 1, max_name_len }
    }

    /// Trim and validate a room name.
    pub fn normalize_name(&self, raw: &str) -> Result<String, IntentError> {
        let name = raw.trim();
        if name.is_empty() || name.chars().count() > self.max_name_len {
            return Err(IntentError::InvalidRoomName { max: self.max_name_len });
        }
        Ok(name.to_string())
    }

    /// Create a room if absent.
    ///
    /// An existing room is returned untouched: the first creator's
    /// visibility and ownership win. Returns the snapshot and whether the
    /// room was created by this call.
    pub fn ensure_room(
        &mut self,
        name: &str,
        visibility: Visibility,
        owner: Option<SessionId>,
    ) -> Result<(RoomSnapshot, bool), IntentError> {
        let name = self.normalize_name(name)?;

        if let Some(room) = self.rooms.get(&name) {
            return Ok((room.snapshot(), false));
        }

        let room = Room::new(name.clone(), visibility, owner, self.next_seq);
        self.next_seq += 1;
        let snapshot = room.snapshot();
        self.rooms.insert(name, room);
        Ok((snapshot, true))
    }

    /// Move a session into a room.
    ///
    /// Leaves the session's previous room first. Creates the room as public,
    /// owned by the joiner, if it does not exist; the visibility of an
    /// existing room is never changed by a join.
    pub fn join(
        &mut self,
        registry: &mut IdentityRegistry,
        session: SessionId,
        room: &str,
    ) -> Result<JoinOutcome, IntentError> {
        let name = self.normalize_name(room)?;
        let current = registry.lookup(session).ok_or(IntentError::NotIdentified)?.current_room.clone();

        if current.as_deref() == Some(name.as_str()) {
            if let Some(room) = self.rooms.get_mut(&name) {
                // Repair a member list that lost this session
                if !room.is_member(session) {
                    room.members.push(session);
                }
                return Ok(JoinOutcome {
                    room: room.snapshot(),
                    created: false,
                    already_member: true,
                    left: None,
                });
            }
        }

        let left = match current {
            Some(_) => self.leave(registry, session),
            None => None,
        };

        let (_, created) = self.ensure_room(&name, Visibility::Public, Some(session))?;
        let Some(target) = self.rooms.get_mut(&name) else {
            return Err(IntentError::RoomNotFound(name));
        };
        if !target.is_member(session) {
            target.members.push(session);
        }
        let snapshot = target.snapshot();
        registry.set_room(session, Some(name));

        Ok(JoinOutcome { room: snapshot, created, already_member: false, left })
    }

    /// Take a session out of its current room.
    ///
    /// Deletes the room if it becomes empty, unless it is the default room.
    /// Returns `None` if the session was in no room.
    pub fn leave(
        &mut self,
        registry: &mut IdentityRegistry,
        session: SessionId,
    ) -> Option<LeaveOutcome> {
        let name = registry.lookup(session)?.current_room.clone()?;
        registry.set_room(session, None);

        let room = self.rooms.get_mut(&name)?;
        room.remove_member(session);
        let visibility = room.visibility;
        let deleted = self.delete_if_empty(&name);

        Some(LeaveOutcome { room: name, visibility, deleted })
    }

    /// Close a room on behalf of its owner.
    ///
    /// Every member is removed and left in no room; the caller decides where
    /// they go next.
    pub fn close(
        &mut self,
        registry: &mut IdentityRegistry,
        room: &str,
        requester: SessionId,
    ) -> Result<CloseOutcome, IntentError> {
        let name = self.normalize_name(room)?;
        if name == DEFAULT_ROOM {
            return Err(IntentError::CannotCloseDefault);
        }

        let existing = self.rooms.get(&name).ok_or_else(|| IntentError::RoomNotFound(name.clone()))?;
        if existing.owner != Some(requester) {
            return Err(IntentError::NotOwner(name));
        }

        let Some(closed) = self.rooms.remove(&name) else {
            return Err(IntentError::RoomNotFound(name));
        };
        for &member in &closed.members {
            registry.set_room(member, None);
        }

        Ok(CloseOutcome { room: closed.name, visibility: closed.visibility, evicted: closed.members })
    }

    /// Hand a member's place in a room to another session.
    ///
    /// `to` takes over `from`'s position in the join order, so no leave or
    /// join is observed by the other members. `to` must already be
    /// identified. Returns `None` if `from` is not a member of `room`.
    pub fn transfer_membership(
        &mut self,
        registry: &mut IdentityRegistry,
        from: SessionId,
        to: SessionId,
        room: &str,
    ) -> Option<RoomSnapshot> {
        let target = self.rooms.get_mut(room)?;
        let slot = target.members.iter().position(|&m| m == from)?;
        if !registry.set_room(to, Some(room.to_string())) {
            return None;
        }

        target.members[slot] = to;
        let mut seen = false;
        target.members.retain(|&m| m != to || !std::mem::replace(&mut seen, true));
        Some(target.snapshot())
    }

    /// Move ownership of every room owned by `from` to `to`.
    pub fn transfer_ownership(&mut self, from: SessionId, to: SessionId) {
        for room in self.rooms.values_mut().filter(|r| r.owner == Some(from)) {
            room.owner = Some(to);
        }
    }

    /// Drop a member without touching the registry.
    ///
    /// Only for repairing a member entry that has no identity behind it.
    /// Deletes the room if that leaves it empty. Returns `true` if the
    /// session was a member.
    pub fn evict_member(&mut self, room: &str, session: SessionId) -> bool {
        let removed = self.rooms.get_mut(room).is_some_and(|r| r.remove_member(session));
        if removed {
            self.delete_if_empty(room);
        }
        removed
    }

    /// Change a room's owner. Returns `false` for unknown or default rooms.
    pub fn set_owner(&mut self, room: &str, owner: Option<SessionId>) -> bool {
        match self.rooms.get_mut(room) {
            Some(room) if !room.is_default() => {
                room.owner = owner;
                true
            },
            _ => false,
        }
    }

    /// Names of all rooms owned by a session, in creation order.
    pub fn rooms_owned_by(&self, session: SessionId) -> Vec<String> {
        let mut owned: Vec<&Room> =
            self.rooms.values().filter(|r| r.owner == Some(session)).collect();
        owned.sort_by_key(|r| r.created_seq);
        owned.into_iter().map(|r| r.name.clone()).collect()
    }

    /// Public rooms in creation order.
    pub fn list_public(&self) -> Vec<RoomSummary> {
        let mut public: Vec<&Room> =
            self.rooms.values().filter(|r| r.visibility == Visibility::Public).collect();
        public.sort_by_key(|r| r.created_seq);
        public
            .into_iter()
            .map(|r| RoomSummary {
                name: r.name.clone(),
                member_count: r.members.len(),
                visibility: r.visibility,
            })
            .collect()
    }

    /// Room by exact name.
    pub fn find_by_name(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Members of a room in join order; empty for unknown rooms.
    pub fn members(&self, room: &str) -> &[SessionId] {
        self.rooms.get(room).map(Room::members).unwrap_or_default()
    }

    /// All rooms, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Room> + '_ {
        self.rooms.values()
    }

    /// Number of rooms, the default room included.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Always `false`: the default room cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn delete_if_empty(&mut self, name: &str) -> bool {
        if name == DEFAULT_ROOM {
            return false;
        }
        if self.rooms.get(name).is_some_and(|r| r.members.is_empty()) {
            self.rooms.remove(name);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::ResumeToken;

    use super::*;

    fn identified(sessions: &[u64]) -> IdentityRegistry {
        let mut registry = IdentityRegistry::new();
        for &s in sessions {
            registry.register(SessionId(s), &format!("user{s}"), ResumeToken(u128::from(s))).unwrap();
        }
        registry
    }

    #[test]
    fn default_room_exists_and_is_public() {
        let directory = RoomDirectory::new();
        let general = directory.find_by_name(DEFAULT_ROOM).unwrap();

        assert_eq!(general.visibility, Visibility::Public);
        assert_eq!(general.owner, None);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn ensure_room_first_creator_wins() {
        let mut directory = RoomDirectory::new();

        let (room, created) =
            directory.ensure_room("ops", Visibility::Private, Some(SessionId(1))).unwrap();
        assert!(created);
        assert_eq!(room.visibility, Visibility::Private);

        let (room, created) =
            directory.ensure_room("ops", Visibility::Public, Some(SessionId(2))).unwrap();
        assert!(!created);
        assert_eq!(room.visibility, Visibility::Private);
        assert_eq!(room.owner, Some(SessionId(1)));
    }

    #[test]
    fn join_unknown_room_creates_public_owned_by_joiner() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        let outcome = directory.join(&mut registry, SessionId(1), "standup").unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.room.visibility, Visibility::Public);
        assert_eq!(outcome.room.owner, Some(SessionId(1)));
        assert_eq!(outcome.room.member_count, 1);
        assert_eq!(
            registry.lookup(SessionId(1)).unwrap().current_room.as_deref(),
            Some("standup")
        );
    }

    #[test]
    fn join_switches_rooms_and_deletes_emptied_room() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        directory.join(&mut registry, SessionId(1), "a").unwrap();
        let outcome = directory.join(&mut registry, SessionId(1), "b").unwrap();

        let left = outcome.left.unwrap();
        assert_eq!(left.room, "a");
        assert!(left.deleted);
        assert!(directory.find_by_name("a").is_none());
        assert_eq!(directory.members("b"), &[SessionId(1)]);
    }

    #[test]
    fn join_same_room_is_noop() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        directory.join(&mut registry, SessionId(1), "a").unwrap();
        let outcome = directory.join(&mut registry, SessionId(1), "a").unwrap();

        assert!(outcome.already_member);
        assert!(outcome.left.is_none());
        assert_eq!(directory.members("a").len(), 1);
    }

    #[test]
    fn join_requires_identity() {
        let mut registry = IdentityRegistry::new();
        let mut directory = RoomDirectory::new();

        assert_eq!(
            directory.join(&mut registry, SessionId(1), "a").unwrap_err(),
            IntentError::NotIdentified
        );
        assert!(directory.find_by_name("a").is_none());
    }

    #[test]
    fn default_room_survives_empty() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        directory.join(&mut registry, SessionId(1), DEFAULT_ROOM).unwrap();
        let left = directory.leave(&mut registry, SessionId(1)).unwrap();

        assert!(!left.deleted);
        assert_eq!(directory.find_by_name(DEFAULT_ROOM).unwrap().member_count(), 0);
    }

    #[test]
    fn leave_without_room_is_none() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        assert!(directory.leave(&mut registry, SessionId(1)).is_none());
    }

    #[test]
    fn close_default_room_always_fails() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        assert_eq!(
            directory.close(&mut registry, DEFAULT_ROOM, SessionId(1)).unwrap_err(),
            IntentError::CannotCloseDefault
        );
    }

    #[test]
    fn close_by_non_owner_fails() {
        let mut registry = identified(&[1, 2]);
        let mut directory = RoomDirectory::new();

        directory.join(&mut registry, SessionId(1), "ops").unwrap();
        directory.join(&mut registry, SessionId(2), "ops").unwrap();

        assert_eq!(
            directory.close(&mut registry, "ops", SessionId(2)).unwrap_err(),
            IntentError::NotOwner("ops".into())
        );
        assert_eq!(directory.members("ops").len(), 2);
    }

    #[test]
    fn close_evicts_members() {
        let mut registry = identified(&[1, 2]);
        let mut directory = RoomDirectory::new();

        directory.join(&mut registry, SessionId(1), "ops").unwrap();
        directory.join(&mut registry, SessionId(2), "ops").unwrap();

        let outcome = directory.close(&mut registry, "ops", SessionId(1)).unwrap();

        assert_eq!(outcome.evicted, vec![SessionId(1), SessionId(2)]);
        assert!(directory.find_by_name("ops").is_none());
        assert_eq!(registry.lookup(SessionId(2)).unwrap().current_room, None);
    }

    #[test]
    fn close_unknown_room_fails() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        assert_eq!(
            directory.close(&mut registry, "nope", SessionId(1)).unwrap_err(),
            IntentError::RoomNotFound("nope".into())
        );
    }

    #[test]
    fn list_public_hides_private_and_keeps_creation_order() {
        let mut directory = RoomDirectory::new();

        directory.ensure_room("zeta", Visibility::Public, None).unwrap();
        directory.ensure_room("secret", Visibility::Private, None).unwrap();
        directory.ensure_room("alpha", Visibility::Public, None).unwrap();

        let names: Vec<_> = directory.list_public().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec![DEFAULT_ROOM, "zeta", "alpha"]);
    }

    #[test]
    fn evict_member_deletes_emptied_room() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        directory.join(&mut registry, SessionId(1), "ops").unwrap();
        assert!(directory.evict_member("ops", SessionId(1)));
        assert!(directory.find_by_name("ops").is_none());
        assert!(!directory.evict_member("ops", SessionId(1)));
    }

    #[test]
    fn room_names_are_trimmed_and_validated() {
        let mut registry = identified(&[1]);
        let mut directory = RoomDirectory::new();

        let outcome = directory.join(&mut registry, SessionId(1), "  ops  ").unwrap();
        assert_eq!(outcome.room.name, "ops");

        assert!(matches!(
            directory.join(&mut registry, SessionId(1), "   "),
            Err(IntentError::InvalidRoomName { .. })
        ));
        // Failed join leaves the session where it was
        assert_eq!(registry.lookup(SessionId(1)).unwrap().current_room.as_deref(), Some("ops"));
    }

    #[test]
    fn transfer_membership_keeps_join_order() {
        let mut registry = identified(&[1, 2, 3]);
        let mut directory = RoomDirectory::new();

        directory.join(&mut registry, SessionId(1), "ops").unwrap();
        directory.join(&mut registry, SessionId(2), "ops").unwrap();
        registry.remove(SessionId(1));
        directory.transfer_ownership(SessionId(1), SessionId(3));

        let room =
            directory.transfer_membership(&mut registry, SessionId(1), SessionId(3), "ops").unwrap();

        assert_eq!(room.owner, Some(SessionId(3)));
        assert_eq!(directory.members("ops"), &[SessionId(3), SessionId(2)]);
        assert_eq!(registry.lookup(SessionId(3)).unwrap().current_room.as_deref(), Some("ops"));
        assert!(
            directory.transfer_membership(&mut registry, SessionId(1), SessionId(3), "ops").is_none()
        );
    }

    #[test]
    fn default_room_owner_cannot_be_set() {
        let mut directory = RoomDirectory::new();
        assert!(!directory.set_owner(DEFAULT_ROOM, Some(SessionId(1))));
    }
}
