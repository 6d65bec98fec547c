//! Inbound client intents.

use serde::{Deserialize, Serialize};

use crate::{ResumeToken, SessionId, Visibility};

/// Something a client asks the relay to do.
///
/// Encoded as a CBOR map tagged by `"type"`. Each intent is validated by the
/// coordinator; a failed precondition produces an `operation_error` for the
/// originator only and leaves shared state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Register a display name for this session and enter the default room
    JoinApplication {
        /// User-chosen name, trimmed before use
        display_name: String,
    },

    /// Re-attach an identity from a previous session
    Resume {
        /// Token issued in the `identified` message of the earlier session
        token: ResumeToken,
    },

    /// Join a room by name, creating it as public if it does not exist
    JoinRoom {
        /// Room name
        room: String,
    },

    /// Create a room (if absent) with the given visibility, then join it
    CreateRoom {
        /// Room name
        room: String,
        /// Visibility used only if the room is created by this intent
        visibility: Visibility,
    },

    /// Join an existing room by exact name; never creates
    JoinPrivateRoom {
        /// Room name
        room: String,
    },

    /// Leave the current room without entering another
    LeaveRoom,

    /// Close a room this session created, evicting everyone in it
    CloseRoom {
        /// Room name
        room: String,
    },

    /// Send a message to everyone in the current room
    SendMessage {
        /// Message content
        content: MessageContent,
    },

    /// Send a message to one other identified session
    SendPrivateMessage {
        /// Recipient session
        to: SessionId,
        /// Message content
        content: MessageContent,
    },

    /// Typing indicator for the current room
    Typing {
        /// `true` while composing, `false` once stopped
        active: bool,
    },

    /// Graceful disconnect
    Disconnect,
}

impl Intent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinApplication { .. } => "join_application",
            Self::Resume { .. } => "resume",
            Self::JoinRoom { .. } => "join_room",
            Self::CreateRoom { .. } => "create_room",
            Self::JoinPrivateRoom { .. } => "join_private_room",
            Self::LeaveRoom => "leave_room",
            Self::CloseRoom { .. } => "close_room",
            Self::SendMessage { .. } => "send_message",
            Self::SendPrivateMessage { .. } => "send_private_message",
            Self::Typing { .. } => "typing",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Message content a client may send.
///
/// `system` notices are deliberately absent: only the relay produces them.
/// File content is opaque to the relay; `reference` is whatever the upload
/// collaborator handed the client (a URL, a data URL, an object key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text {
        /// Message body
        body: String,
    },

    /// Source code snippet
    Code {
        /// Code body
        body: String,
        /// Language tag for highlighting, if known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },

    /// Reference to an uploaded file
    File {
        /// Opaque reference to the file content
        reference: String,
        /// Original file name
        file_name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_names_are_snake_case_tags() {
        assert_eq!(Intent::LeaveRoom.name(), "leave_room");
        assert_eq!(Intent::Typing { active: true }.name(), "typing");
        assert_eq!(
            Intent::CreateRoom { room: "a".into(), visibility: Visibility::Private }.name(),
            "create_room"
        );
    }
}
