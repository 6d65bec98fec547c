//! Observable state snapshots for invariant checking.
//!
//! Snapshots copy the coordinator's stores at one point in time, so every
//! invariant sees the same consistent state.

use std::collections::{BTreeMap, BTreeSet};

use parley_core::{Environment, SessionCoordinator};
use parley_proto::{SessionId, Visibility};

/// Snapshot of the whole coordinator.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Live transport sessions.
    pub connections: BTreeSet<SessionId>,
    /// Identified sessions.
    pub users: BTreeMap<SessionId, UserSnapshot>,
    /// Rooms by name.
    pub rooms: BTreeMap<String, RoomSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no sessions, no rooms).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current state of a coordinator.
    pub fn from_coordinator<E: Environment>(coordinator: &SessionCoordinator<E>) -> Self {
        let users = coordinator
            .registry()
            .iter()
            .map(|r| {
                (r.session, UserSnapshot {
                    display_name: r.display_name.clone(),
                    current_room: r.current_room.clone(),
                })
            })
            .collect();

        let rooms = coordinator
            .directory()
            .iter()
            .map(|room| {
                (room.name.clone(), RoomSnapshot {
                    visibility: room.visibility,
                    owner: room.owner,
                    members: room.members().to_vec(),
                })
            })
            .collect();

        Self { connections: coordinator.sessions().collect(), users, rooms }
    }

    /// Add a live session.
    pub fn with_connection(mut self, session: SessionId) -> Self {
        self.connections.insert(session);
        self
    }

    /// Add an identified session.
    pub fn with_user(mut self, session: SessionId, user: UserSnapshot) -> Self {
        self.users.insert(session, user);
        self
    }

    /// Add a room.
    pub fn with_room(mut self, name: &str, room: RoomSnapshot) -> Self {
        self.rooms.insert(name.to_string(), room);
        self
    }
}

/// One identified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    /// Display name.
    pub display_name: String,
    /// Room the registry places the session in.
    pub current_room: Option<String>,
}

impl UserSnapshot {
    /// Create a user snapshot.
    pub fn new(display_name: &str, current_room: Option<&str>) -> Self {
        Self {
            display_name: display_name.to_string(),
            current_room: current_room.map(str::to_string),
        }
    }
}

/// One room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Visibility.
    pub visibility: Visibility,
    /// Owner session, if any.
    pub owner: Option<SessionId>,
    /// Members in join order.
    pub members: Vec<SessionId>,
}

impl RoomSnapshot {
    /// Create an ownerless public room snapshot.
    pub fn public() -> Self {
        Self { visibility: Visibility::Public, owner: None, members: Vec::new() }
    }

    /// Set visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set owner.
    pub fn with_owner(mut self, owner: SessionId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Add members.
    pub fn with_members(mut self, members: impl IntoIterator<Item = SessionId>) -> Self {
        self.members.extend(members);
        self
    }
}
