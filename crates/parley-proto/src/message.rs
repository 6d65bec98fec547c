//! Outbound server messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Envelope, ResumeToken, SessionId};

/// Room visibility.
///
/// Public rooms appear in the room list. Private rooms never do; their name
/// is the shared secret needed to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Listed, joinable by anyone
    Public,
    /// Unlisted, joinable by exact name
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

/// Entry of the public room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Room name
    pub name: String,
    /// Current number of members
    pub member_count: usize,
    /// Always `Public` in the list; carried for the UI
    pub visibility: Visibility,
}

/// Entry of the online user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUser {
    /// Session to address private messages to
    pub session: SessionId,
    /// Display name
    pub display_name: String,
}

/// Error codes reported to the originating session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Display name empty after trimming, or too long
    InvalidName,
    /// Room name empty after trimming, or too long
    InvalidRoomName,
    /// Explicit private join to a room that does not exist
    RoomNotFound,
    /// Close attempted by someone other than the room owner
    NotOwner,
    /// Close attempted on the default room
    CannotCloseDefault,
    /// Private message to an unknown or disconnected session
    RecipientNotFound,
    /// Room-scoped intent while not in any room
    NotInRoom,
    /// Intent requires `join_application` first
    NotIdentified,
    /// Resume token unknown or expired
    SessionExpired,
}

impl ErrorCode {
    /// Numeric code for clients that prefer integers.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::InvalidName => 0x0100,
            Self::InvalidRoomName => 0x0101,
            Self::RoomNotFound => 0x0200,
            Self::NotOwner => 0x0201,
            Self::CannotCloseDefault => 0x0202,
            Self::NotInRoom => 0x0203,
            Self::RecipientNotFound => 0x0300,
            Self::NotIdentified => 0x0400,
            Self::SessionExpired => 0x0401,
        }
    }
}

/// Messages the relay sends to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Snapshot of all public rooms, in creation order
    PublicRoomList {
        /// Rooms
        rooms: Vec<RoomSummary>,
    },

    /// Snapshot of all identified sessions
    OnlineUsers {
        /// Users
        users: Vec<OnlineUser>,
    },

    /// Identity accepted for this session
    Identified {
        /// This session's id, as others will address it
        session: SessionId,
        /// Registered display name
        display_name: String,
        /// Token for resuming this identity after a transport drop
        resume_token: ResumeToken,
    },

    /// This session is now a member of the named room
    JoinedRoom {
        /// Room name
        name: String,
        /// Owner session; `None` for the default room or orphaned rooms
        owner: Option<SessionId>,
        /// Room visibility
        visibility: Visibility,
    },

    /// This session is no longer in the named room
    LeftRoom {
        /// Room name
        name: String,
    },

    /// Recent member messages of a room just joined, oldest first
    RoomHistory {
        /// Room name
        room: String,
        /// Buffered envelopes
        envelopes: Vec<Envelope>,
    },

    /// Message broadcast to the current room
    RoomMessage {
        /// The envelope
        envelope: Envelope,
    },

    /// Two-party message
    PrivateMessage {
        /// The envelope
        envelope: Envelope,
    },

    /// Another member's typing state changed
    Typing {
        /// Room the indicator applies to
        room: String,
        /// Typing session
        session: SessionId,
        /// Its display name
        display_name: String,
        /// Whether it is currently typing
        active: bool,
    },

    /// An intent from this session failed
    OperationError {
        /// Error code
        code: ErrorCode,
        /// Human-readable description
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_distinct() {
        let codes = [
            ErrorCode::InvalidName,
            ErrorCode::InvalidRoomName,
            ErrorCode::RoomNotFound,
            ErrorCode::NotOwner,
            ErrorCode::CannotCloseDefault,
            ErrorCode::RecipientNotFound,
            ErrorCode::NotInRoom,
            ErrorCode::NotIdentified,
            ErrorCode::SessionExpired,
        ];
        let unique: std::collections::HashSet<u16> = codes.iter().map(|c| c.as_u16()).collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn room_history_keeps_envelope_order_through_a_frame() {
        let envelopes: Vec<Envelope> = (1..=3)
            .map(|n| Envelope {
                id: crate::MessageId(n),
                body: crate::EnvelopeBody::Text { body: format!("m{n}") },
                sender: None,
                timestamp_ms: n,
                audience: crate::Audience::Room { name: "ops".into() },
            })
            .collect();
        let message = ServerMessage::RoomHistory { room: "ops".into(), envelopes };

        let decoded: ServerMessage =
            crate::Frame::from_message(&message).and_then(|f| f.to_message()).unwrap();
        assert_eq!(decoded, message);
    }
}
