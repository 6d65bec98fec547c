//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashMap;

use parley_proto::{DEFAULT_ROOM, SessionId, Visibility};

use super::{Invariant, InvariantKind, InvariantResult, SystemSnapshot, Violation};

/// Registry and directory agree on who is where.
///
/// If the registry places a session in room R, then R exists and lists the
/// session. If room R lists a session, the registry places it in R.
pub struct MembershipConsistency;

impl Invariant for MembershipConsistency {
    fn kind(&self) -> InvariantKind {
        InvariantKind::MembershipConsistency
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (session, user) in &state.users {
            let Some(name) = &user.current_room else {
                continue;
            };
            let listed = state.rooms.get(name).is_some_and(|room| room.members.contains(session));
            if !listed {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("session {session} believes it is in {name:?} but is not listed"),
                });
            }
        }

        for (name, room) in &state.rooms {
            for member in &room.members {
                let placed = state
                    .users
                    .get(member)
                    .and_then(|u| u.current_room.as_deref())
                    .is_some_and(|current| current == name);
                if !placed {
                    return Err(Violation {
                        invariant: self.kind(),
                        message: format!("room {name:?} lists {member} but the registry disagrees"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The default room always exists, is public and has no owner.
pub struct DefaultRoomPresent;

impl Invariant for DefaultRoomPresent {
    fn kind(&self) -> InvariantKind {
        InvariantKind::DefaultRoomPresent
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        match state.rooms.get(DEFAULT_ROOM) {
            None => Err(Violation {
                invariant: self.kind(),
                message: format!("room {DEFAULT_ROOM:?} is missing"),
            }),
            Some(room) if room.visibility != Visibility::Public || room.owner.is_some() => {
                Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "room {DEFAULT_ROOM:?} is {} with owner {:?}",
                        room.visibility, room.owner
                    ),
                })
            },
            Some(_) => Ok(()),
        }
    }
}

/// Every room other than the default has at least one member.
pub struct NoEmptyRooms;

impl Invariant for NoEmptyRooms {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NoEmptyRooms
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (name, room) in &state.rooms {
            if name != DEFAULT_ROOM && room.members.is_empty() {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("room {name:?} is empty but still exists"),
                });
            }
        }
        Ok(())
    }
}

/// Every room member is a live, identified session listed exactly once.
pub struct NoGhostMembers;

impl Invariant for NoGhostMembers {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NoGhostMembers
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen: HashMap<SessionId, &str> = HashMap::new();

        for (name, room) in &state.rooms {
            for member in &room.members {
                if !state.users.contains_key(member) {
                    return Err(Violation {
                        invariant: self.kind(),
                        message: format!("room {name:?} lists {member} with no identity"),
                    });
                }
                if !state.connections.contains(member) {
                    return Err(Violation {
                        invariant: self.kind(),
                        message: format!("room {name:?} lists {member} with no live connection"),
                    });
                }
                if let Some(other) = seen.insert(*member, name) {
                    return Err(Violation {
                        invariant: self.kind(),
                        message: format!("{member} is listed in both {other:?} and {name:?}"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every identified session has a live connection.
pub struct IdentitiesAreLive;

impl Invariant for IdentitiesAreLive {
    fn kind(&self) -> InvariantKind {
        InvariantKind::IdentitiesAreLive
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in state.users.keys() {
            if !state.connections.contains(session) {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("session {session} is identified but not connected"),
                });
            }
        }
        Ok(())
    }
}
