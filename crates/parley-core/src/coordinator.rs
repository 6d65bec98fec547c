//! Session coordinator.
//!
//! Top-level state machine of the relay. The runtime feeds it
//! [`CoordinatorEvent`]s (connection accepted, intent received, connection
//! closed, tick) and executes the [`CoordinatorAction`]s it returns. The
//! coordinator never performs I/O: every action carries a fully resolved
//! recipient list, so the runtime can release its lock before writing to the
//! network.
//!
//! Per-session lifecycle:
//!
//! ```text
//! Connected ──join_application──► Identified ──join/create──► InRoom ⇄ InRoom
//!     │                                │   ◄──leave_room────────┘
//!     └────────── disconnect / transport drop ──────────────────► (gone)
//! ```
//!
//! Each event is one atomic step over the [`IdentityRegistry`] and
//! [`RoomDirectory`]. An intent that fails validation yields an
//! `operation_error` for the originator and changes nothing.

use std::{collections::BTreeSet, time::Duration};

use parley_proto::{
    DEFAULT_ROOM, ErrorCode, Intent, MessageContent, ResumeToken, Sender, ServerMessage, SessionId,
    Visibility,
};

use crate::{
    directory::{LeaveOutcome, RoomDirectory},
    env::Environment,
    error::{CoordinatorError, IntentError},
    history::{DEFAULT_HISTORY_LEN, RoomHistory},
    registry::{DEFAULT_MAX_NAME_LEN, IdentityRegistry},
    resume::{ParkedIdentity, ResumeBook},
    router::{Delivery, MessageRouter},
};

/// What happens to a room's ownership when its owner goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OwnershipPolicy {
    /// The room keeps running without an owner and can no longer be closed
    #[default]
    Orphan,
    /// The longest-standing remaining member becomes owner
    TransferToOldestMember,
}

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum concurrent transport sessions
    pub max_connections: usize,
    /// Maximum display and room name length, in characters
    pub max_name_len: usize,
    /// Ownership handling when an owner disconnects or its resume ticket
    /// expires
    pub ownership_policy: OwnershipPolicy,
    /// How long a dropped identity can be resumed
    pub resume_ttl: Duration,
    /// Member messages kept per room for late joiners; zero disables history
    pub history_len: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            ownership_policy: OwnershipPolicy::Orphan,
            resume_ttl: Duration::from_secs(120),
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

/// Events the coordinator processes.
///
/// Produced by the runtime (production or simulation).
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// A new transport session was accepted
    ConnectionAccepted {
        /// Session id assigned by the runtime
        session: SessionId,
    },

    /// A decoded intent arrived on a session
    IntentReceived {
        /// Originating session
        session: SessionId,
        /// The intent
        intent: Intent,
    },

    /// A transport session ended (peer close, error, or timeout)
    ConnectionClosed {
        /// Session that closed
        session: SessionId,
        /// Reason for closure
        reason: String,
    },

    /// Periodic housekeeping
    Tick,
}

/// Actions the coordinator produces.
///
/// Executed in order by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorAction {
    /// Send a message to one session
    SendToSession {
        /// Target session
        session: SessionId,
        /// Message to send
        message: ServerMessage,
    },

    /// Send the same message to several sessions
    Broadcast {
        /// Target sessions, each listed once
        recipients: Vec<SessionId>,
        /// Message to send
        message: ServerMessage,
    },

    /// Close a transport session
    CloseConnection {
        /// Session to close
        session: SessionId,
        /// Reason for closure
        reason: String,
    },

    /// Log a message
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

impl From<Delivery> for CoordinatorAction {
    fn from(delivery: Delivery) -> Self {
        Self::Broadcast { recipients: delivery.recipients, message: delivery.message }
    }
}

/// Log levels for coordinator actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Observable state of one transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport is up, no identity yet
    Connected,
    /// Identity registered, not in any room
    Identified,
    /// Identity registered and in a room
    InRoom,
}

/// Actions accumulated while handling one event.
///
/// Room-list and online-user broadcasts are coalesced and appended once at
/// the end, after every mutation of the event has been applied.
#[derive(Debug, Default)]
struct Effects {
    actions: Vec<CoordinatorAction>,
    rooms_changed: bool,
    users_changed: bool,
}

impl Effects {
    fn send(&mut self, session: SessionId, message: ServerMessage) {
        self.actions.push(CoordinatorAction::SendToSession { session, message });
    }

    fn deliver(&mut self, delivery: Delivery) {
        if !delivery.recipients.is_empty() {
            self.actions.push(delivery.into());
        }
    }

    fn log(&mut self, level: LogLevel, message: String) {
        self.actions.push(CoordinatorAction::Log { level, message });
    }
}

/// Sans-IO session coordinator.
///
/// Owns the identity registry, room directory, router, resume book and room
/// history.
/// Stores can be injected with [`SessionCoordinator::with_stores`] for
/// isolated testing.
pub struct SessionCoordinator<E: Environment> {
    /// Live transport sessions
    connections: BTreeSet<SessionId>,
    registry: IdentityRegistry,
    directory: RoomDirectory,
    router: MessageRouter,
    resume: ResumeBook<E::Instant>,
    history: RoomHistory,
    env: E,
    config: CoordinatorConfig,
}

impl<E: Environment> SessionCoordinator<E> {
    /// Create a coordinator with empty stores.
    pub fn new(env: E, config: CoordinatorConfig) -> Self {
        let registry = IdentityRegistry::with_max_name_len(config.max_name_len);
        let directory = RoomDirectory::with_max_name_len(config.max_name_len);
        Self::with_stores(env, config, registry, directory)
    }

    /// Create a coordinator over existing stores.
    ///
    /// Every session identified in `registry` is treated as a live
    /// connection.
    pub fn with_stores(
        env: E,
        config: CoordinatorConfig,
        registry: IdentityRegistry,
        directory: RoomDirectory,
    ) -> Self {
        let connections = registry.iter().map(|r| r.session).collect();
        Self {
            connections,
            registry,
            directory,
            router: MessageRouter::new(),
            resume: ResumeBook::new(),
            history: RoomHistory::new(config.history_len),
            env,
            config,
        }
    }

    /// Process an event and return the actions to execute.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::SessionAlreadyExists` if a live session id is
    ///   accepted again
    /// - `CoordinatorError::SessionNotFound` if an intent arrives for a
    ///   session that is not live
    ///
    /// Client mistakes never surface here; they become `operation_error`
    /// messages in the returned actions.
    pub fn process_event(
        &mut self,
        event: CoordinatorEvent,
    ) -> Result<Vec<CoordinatorAction>, CoordinatorError> {
        match event {
            CoordinatorEvent::ConnectionAccepted { session } => {
                self.handle_connection_accepted(session)
            },
            CoordinatorEvent::IntentReceived { session, intent } => {
                self.handle_intent(session, intent)
            },
            CoordinatorEvent::ConnectionClosed { session, reason } => {
                Ok(self.handle_connection_closed(session, &reason))
            },
            CoordinatorEvent::Tick => Ok(self.handle_tick()),
        }
    }

    fn handle_connection_accepted(
        &mut self,
        session: SessionId,
    ) -> Result<Vec<CoordinatorAction>, CoordinatorError> {
        if self.connections.contains(&session) {
            return Err(CoordinatorError::SessionAlreadyExists(session));
        }

        if self.connections.len() >= self.config.max_connections {
            return Ok(vec![
                CoordinatorAction::CloseConnection {
                    session,
                    reason: "max connections exceeded".to_string(),
                },
                CoordinatorAction::Log {
                    level: LogLevel::Warn,
                    message: format!(
                        "session {session} refused: {} connections open",
                        self.connections.len()
                    ),
                },
            ]);
        }

        self.connections.insert(session);

        Ok(vec![
            CoordinatorAction::SendToSession {
                session,
                message: ServerMessage::PublicRoomList { rooms: self.directory.list_public() },
            },
            CoordinatorAction::Log {
                level: LogLevel::Debug,
                message: format!("session {session} accepted"),
            },
        ])
    }

    fn handle_intent(
        &mut self,
        session: SessionId,
        intent: Intent,
    ) -> Result<Vec<CoordinatorAction>, CoordinatorError> {
        if !self.connections.contains(&session) {
            return Err(CoordinatorError::SessionNotFound(session));
        }

        let name = intent.name();
        let mut fx = Effects::default();

        let result = match intent {
            Intent::JoinApplication { display_name } => {
                self.join_application(session, &display_name, &mut fx)
            },
            Intent::Resume { token } => self.resume(session, token, &mut fx),
            Intent::JoinRoom { room } => self.join_room(session, &room, &mut fx),
            Intent::CreateRoom { room, visibility } => {
                self.create_room(session, &room, visibility, &mut fx)
            },
            Intent::JoinPrivateRoom { room } => self.join_private_room(session, &room, &mut fx),
            Intent::LeaveRoom => self.leave_room(session, &mut fx),
            Intent::CloseRoom { room } => self.close_room(session, &room, &mut fx),
            Intent::SendMessage { content } => self.send_message(session, content, &mut fx),
            Intent::SendPrivateMessage { to, content } => {
                self.send_private_message(session, to, content, &mut fx)
            },
            Intent::Typing { active } => self.typing(session, active, &mut fx),
            Intent::Disconnect => {
                self.disconnect(session, &mut fx);
                Ok(())
            },
        };

        match result {
            Ok(()) => Ok(self.finish(fx)),
            Err(e) => Ok(vec![
                CoordinatorAction::SendToSession {
                    session,
                    message: ServerMessage::OperationError { code: e.code(), message: e.to_string() },
                },
                CoordinatorAction::Log {
                    level: LogLevel::Debug,
                    message: format!("{name} from session {session} rejected: {e}"),
                },
            ]),
        }
    }

    fn handle_connection_closed(
        &mut self,
        session: SessionId,
        reason: &str,
    ) -> Vec<CoordinatorAction> {
        // Already gone after a graceful disconnect or a resume takeover
        if !self.connections.remove(&session) {
            return Vec::new();
        }

        let mut fx = Effects::default();
        fx.log(LogLevel::Info, format!("session {session} closed: {reason}"));
        self.detach(session, true, &mut fx);
        self.finish(fx)
    }

    fn handle_tick(&mut self) -> Vec<CoordinatorAction> {
        let mut fx = Effects::default();
        self.expire_tickets(&mut fx);
        self.finish(fx)
    }

    /// Drop expired resume tickets and release the rooms they still own.
    fn expire_tickets(&mut self, fx: &mut Effects) {
        let now = self.env.now();
        let expired = self.resume.prune_expired(now, self.config.resume_ttl);
        if expired.is_empty() {
            return;
        }

        fx.log(LogLevel::Debug, format!("pruned {} expired resume tickets", expired.len()));
        for ticket in expired {
            self.apply_ownership_policy(ticket.session, fx);
        }
    }

    fn join_application(
        &mut self,
        session: SessionId,
        display_name: &str,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        let name = self.registry.normalize_name(display_name)?;

        // Re-identification keeps the token but starts over from the default room
        let token = match self.registry.lookup(session) {
            Some(record) => {
                let previous_name = record.display_name.clone();
                let token = record.resume_token;
                if let Some(left) = self.directory.leave(&mut self.registry, session) {
                    self.after_leave(session, &previous_name, left, true, fx);
                }
                token
            },
            None => ResumeToken(self.env.random_u128()),
        };

        let record = self.registry.register(session, &name, token)?;
        fx.send(session, ServerMessage::Identified {
            session,
            display_name: record.display_name.clone(),
            resume_token: token,
        });
        fx.users_changed = true;
        fx.log(LogLevel::Info, format!("session {session} identified as {name:?}"));

        self.enter_room(session, DEFAULT_ROOM, fx)
    }

    fn resume(
        &mut self,
        session: SessionId,
        token: ResumeToken,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        if let Some(record) = self.registry.lookup(session) {
            if record.resume_token == token {
                fx.send(session, ServerMessage::Identified {
                    session,
                    display_name: record.display_name.clone(),
                    resume_token: token,
                });
                return Ok(());
            }
        }

        // Token still bound to a live session: the new transport won the race
        // against the old one's close
        let (previous, display_name, last_room) = match self.registry.session_for_token(token) {
            Some(old) => {
                let record = self.registry.lookup(old).ok_or(IntentError::SessionExpired)?;
                let last_room = record
                    .current_room
                    .as_deref()
                    .and_then(|name| self.directory.find_by_name(name))
                    .map(|room| (room.name.clone(), room.visibility));
                (Some(old), record.display_name.clone(), last_room)
            },
            None => {
                let now = self.env.now();
                let ticket = self
                    .resume
                    .take(token, now, self.config.resume_ttl)
                    .ok_or(IntentError::SessionExpired)?;
                self.directory.transfer_ownership(ticket.session, session);
                (None, ticket.display_name, ticket.last_room)
            },
        };

        if self.registry.contains(session) {
            self.detach(session, true, fx);
        }

        if let Some(old) = previous {
            self.connections.remove(&old);
            self.registry.remove(old);
            self.directory.transfer_ownership(old, session);
            fx.actions.push(CoordinatorAction::CloseConnection {
                session: old,
                reason: "session resumed elsewhere".to_string(),
            });
            fx.log(LogLevel::Info, format!("session {session} took over identity of {old}"));
        }

        let record = self.registry.register(session, &display_name, token)?;
        fx.send(session, ServerMessage::Identified {
            session,
            display_name: record.display_name.clone(),
            resume_token: token,
        });
        fx.users_changed = true;

        let Some((room, visibility)) = last_room else {
            return Ok(());
        };

        if let Some(old) = previous {
            if let Some(snapshot) =
                self.directory.transfer_membership(&mut self.registry, old, session, &room)
            {
                fx.send(session, ServerMessage::JoinedRoom {
                    name: snapshot.name.clone(),
                    owner: snapshot.owner,
                    visibility: snapshot.visibility,
                });
                self.replay_history(session, &snapshot.name, fx);
                return Ok(());
            }
        }

        self.rejoin(session, &room, visibility, fx);
        Ok(())
    }

    /// Put a resumed session back in its last room.
    ///
    /// Public rooms are re-created if needed. A private room that no longer
    /// exists is reported and the session lands in the default room instead.
    fn rejoin(&mut self, session: SessionId, room: &str, visibility: Visibility, fx: &mut Effects) {
        let target = match visibility {
            Visibility::Private if self.directory.find_by_name(room).is_none() => {
                let err = IntentError::RoomNotFound(room.to_string());
                fx.send(session, ServerMessage::OperationError {
                    code: ErrorCode::RoomNotFound,
                    message: err.to_string(),
                });
                DEFAULT_ROOM
            },
            _ => room,
        };

        if let Err(e) = self.enter_room(session, target, fx) {
            fx.log(LogLevel::Error, format!("session {session} could not rejoin {target}: {e}"));
        }
    }

    fn join_room(
        &mut self,
        session: SessionId,
        room: &str,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        self.enter_room(session, room, fx)
    }

    fn create_room(
        &mut self,
        session: SessionId,
        room: &str,
        visibility: Visibility,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        if !self.registry.contains(session) {
            return Err(IntentError::NotIdentified);
        }

        let (snapshot, created) = self.directory.ensure_room(room, visibility, Some(session))?;
        if created {
            fx.log(
                LogLevel::Info,
                format!("room {:?} created by {session} ({visibility})", snapshot.name),
            );
            if visibility == Visibility::Public {
                fx.rooms_changed = true;
            }
        }

        self.enter_room(session, &snapshot.name, fx)
    }

    fn join_private_room(
        &mut self,
        session: SessionId,
        room: &str,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        if !self.registry.contains(session) {
            return Err(IntentError::NotIdentified);
        }

        let name = self.directory.normalize_name(room)?;
        if self.directory.find_by_name(&name).is_none() {
            return Err(IntentError::RoomNotFound(name));
        }

        self.enter_room(session, &name, fx)
    }

    fn leave_room(&mut self, session: SessionId, fx: &mut Effects) -> Result<(), IntentError> {
        let display_name = self.display_name(session)?;
        let left = self.directory.leave(&mut self.registry, session).ok_or(IntentError::NotInRoom)?;
        self.after_leave(session, &display_name, left, true, fx);
        Ok(())
    }

    fn close_room(
        &mut self,
        session: SessionId,
        room: &str,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        if !self.registry.contains(session) {
            return Err(IntentError::NotIdentified);
        }

        let outcome = self.directory.close(&mut self.registry, room, session)?;
        fx.log(
            LogLevel::Info,
            format!(
                "room {:?} closed by {session}, relocating {} members",
                outcome.room,
                outcome.evicted.len()
            ),
        );
        fx.rooms_changed = true;
        self.history.remove(&outcome.room);

        for &member in &outcome.evicted {
            match self.directory.join(&mut self.registry, member, DEFAULT_ROOM) {
                Ok(joined) => {
                    fx.send(member, ServerMessage::LeftRoom { name: outcome.room.clone() });
                    fx.send(member, ServerMessage::JoinedRoom {
                        name: joined.room.name,
                        owner: joined.room.owner,
                        visibility: joined.room.visibility,
                    });
                },
                Err(e) => fx.log(
                    LogLevel::Error,
                    format!("dropped member {member} of closed room {:?}: {e}", outcome.room),
                ),
            }
        }

        self.notify_room(DEFAULT_ROOM, format!("Room {} was closed by its owner.", outcome.room), fx);
        Ok(())
    }

    fn send_message(
        &mut self,
        session: SessionId,
        content: MessageContent,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        let (sender, room) = self.sender_in_room(session)?;

        self.prune_ghosts(&room, fx);
        let envelope = self.router.room_envelope(
            &room,
            content.into(),
            Some(sender),
            self.env.wall_clock_millis(),
        );
        self.history.record(&envelope);
        fx.deliver(self.router.deliver_to_room(&self.directory, envelope));
        Ok(())
    }

    fn send_private_message(
        &mut self,
        session: SessionId,
        to: SessionId,
        content: MessageContent,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        let delivery = self.router.deliver_private(
            &self.registry,
            session,
            to,
            content,
            self.env.wall_clock_millis(),
        )?;
        fx.deliver(delivery);
        Ok(())
    }

    fn typing(&mut self, session: SessionId, active: bool, fx: &mut Effects) -> Result<(), IntentError> {
        let (sender, room) = self.sender_in_room(session)?;

        self.prune_ghosts(&room, fx);
        let recipients: Vec<SessionId> =
            self.directory.members(&room).iter().copied().filter(|&m| m != session).collect();

        fx.deliver(Delivery {
            recipients,
            message: ServerMessage::Typing {
                room,
                session,
                display_name: sender.display_name,
                active,
            },
        });
        Ok(())
    }

    fn disconnect(&mut self, session: SessionId, fx: &mut Effects) {
        self.connections.remove(&session);
        self.detach(session, false, fx);
        fx.actions.push(CoordinatorAction::CloseConnection {
            session,
            reason: "client disconnect".to_string(),
        });
        fx.log(LogLevel::Info, format!("session {session} disconnected"));
    }

    /// Tear down a session's identity.
    ///
    /// Leaves the current room and removes the identity. With `park`, the
    /// identity can be resumed until the TTL runs out and keeps its rooms
    /// until then; otherwise the ownership policy applies at once. The
    /// transport session itself is left to the caller.
    fn detach(&mut self, session: SessionId, park: bool, fx: &mut Effects) {
        let Some(record) = self.registry.lookup(session).cloned() else {
            return;
        };

        let left = self.directory.leave(&mut self.registry, session);
        let last_room = left.as_ref().map(|l| (l.room.clone(), l.visibility));
        if let Some(left) = left {
            self.after_leave(session, &record.display_name, left, false, fx);
        }

        self.registry.remove(session);
        fx.users_changed = true;

        if park {
            self.resume.park(record.resume_token, ParkedIdentity {
                session,
                display_name: record.display_name,
                last_room,
                parked_at: self.env.now(),
            });
        } else {
            self.apply_ownership_policy(session, fx);
        }
    }

    fn apply_ownership_policy(&mut self, session: SessionId, fx: &mut Effects) {
        for room in self.directory.rooms_owned_by(session) {
            let owner = match self.config.ownership_policy {
                OwnershipPolicy::Orphan => None,
                OwnershipPolicy::TransferToOldestMember => {
                    self.directory.members(&room).iter().copied().find(|&m| m != session)
                },
            };
            self.directory.set_owner(&room, owner);

            let message = match owner {
                Some(owner) => format!("room {room:?} ownership moved from {session} to {owner}"),
                None => format!("room {room:?} orphaned by {session}"),
            };
            fx.log(LogLevel::Info, message);
        }
    }

    /// Join a room and announce it.
    fn enter_room(
        &mut self,
        session: SessionId,
        room: &str,
        fx: &mut Effects,
    ) -> Result<(), IntentError> {
        let display_name = self.display_name(session)?;
        let outcome = self.directory.join(&mut self.registry, session, room)?;

        if let Some(left) = outcome.left {
            self.after_leave(session, &display_name, left, true, fx);
        }

        fx.send(session, ServerMessage::JoinedRoom {
            name: outcome.room.name.clone(),
            owner: outcome.room.owner,
            visibility: outcome.room.visibility,
        });
        if outcome.already_member {
            return Ok(());
        }

        self.replay_history(session, &outcome.room.name, fx);

        if outcome.room.visibility == Visibility::Public {
            fx.rooms_changed = true;
        }
        self.notify_room(&outcome.room.name, format!("{display_name} has joined the room."), fx);
        Ok(())
    }

    /// Send a room's buffered messages to one session.
    fn replay_history(&self, session: SessionId, room: &str, fx: &mut Effects) {
        let envelopes = self.history.replay(room);
        if !envelopes.is_empty() {
            fx.send(session, ServerMessage::RoomHistory { room: room.to_string(), envelopes });
        }
    }

    /// Announce a departure that the directory already applied.
    fn after_leave(
        &mut self,
        session: SessionId,
        display_name: &str,
        left: LeaveOutcome,
        notify_self: bool,
        fx: &mut Effects,
    ) {
        if notify_self {
            fx.send(session, ServerMessage::LeftRoom { name: left.room.clone() });
        }
        if left.visibility == Visibility::Public {
            fx.rooms_changed = true;
        }

        if left.deleted {
            self.history.remove(&left.room);
            fx.log(LogLevel::Debug, format!("room {:?} deleted (empty)", left.room));
        } else {
            self.notify_room(&left.room, format!("{display_name} has left the room."), fx);
        }
    }

    fn notify_room(&mut self, room: &str, text: String, fx: &mut Effects) {
        self.prune_ghosts(room, fx);
        let delivery =
            self.router.system_notice(&self.directory, room, text, self.env.wall_clock_millis());
        fx.deliver(delivery);
    }

    /// Drop room members whose identity does not place them in the room.
    fn prune_ghosts(&mut self, room: &str, fx: &mut Effects) {
        let ghosts: Vec<SessionId> = self
            .directory
            .members(room)
            .iter()
            .copied()
            .filter(|&m| {
                self.registry.lookup(m).and_then(|r| r.current_room.as_deref()) != Some(room)
            })
            .collect();

        for ghost in ghosts {
            self.directory.evict_member(room, ghost);
            if self.directory.find_by_name(room).is_none() {
                self.history.remove(room);
            }
            fx.rooms_changed = true;
            fx.log(
                LogLevel::Error,
                format!("dropped member {ghost} of room {room:?} with no matching identity"),
            );
        }
    }

    fn display_name(&self, session: SessionId) -> Result<String, IntentError> {
        self.registry
            .lookup(session)
            .map(|r| r.display_name.clone())
            .ok_or(IntentError::NotIdentified)
    }

    fn sender_in_room(&self, session: SessionId) -> Result<(Sender, String), IntentError> {
        let record = self.registry.lookup(session).ok_or(IntentError::NotIdentified)?;
        let room = record.current_room.clone().ok_or(IntentError::NotInRoom)?;
        Ok((Sender { session, display_name: record.display_name.clone() }, room))
    }

    /// Append coalesced directory broadcasts.
    fn finish(&self, mut fx: Effects) -> Vec<CoordinatorAction> {
        let everyone: Vec<SessionId> = self.connections.iter().copied().collect();
        if everyone.is_empty() {
            return fx.actions;
        }

        if fx.rooms_changed {
            fx.actions.push(CoordinatorAction::Broadcast {
                recipients: everyone.clone(),
                message: ServerMessage::PublicRoomList { rooms: self.directory.list_public() },
            });
        }
        if fx.users_changed {
            fx.actions.push(CoordinatorAction::Broadcast {
                recipients: everyone,
                message: ServerMessage::OnlineUsers { users: self.registry.online_users() },
            });
        }
        fx.actions
    }

    /// State of a transport session; `None` if it is not live.
    pub fn session_state(&self, session: SessionId) -> Option<SessionState> {
        if !self.connections.contains(&session) {
            return None;
        }
        Some(match self.registry.lookup(session) {
            None => SessionState::Connected,
            Some(record) if record.current_room.is_none() => SessionState::Identified,
            Some(_) => SessionState::InRoom,
        })
    }

    /// Live transport sessions, ordered by id.
    pub fn sessions(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.connections.iter().copied()
    }

    /// Number of live transport sessions.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Identity registry.
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Room directory.
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Room history buffers.
    pub fn history(&self) -> &RoomHistory {
        &self.history
    }

    /// Number of parked resume tickets.
    pub fn parked_count(&self) -> usize {
        self.resume.len()
    }

    /// Active configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Environment (time, RNG).
    pub fn env(&self) -> &E {
        &self.env
    }
}

impl<E: Environment> std::fmt::Debug for SessionCoordinator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("connection_count", &self.connections.len())
            .field("identified", &self.registry.len())
            .field("rooms", &self.directory.len())
            .field("parked", &self.resume.len())
            .finish()
    }
}
