//! Error types for the coordination layer.
//!
//! [`IntentError`] is the recoverable, client-facing taxonomy: every variant
//! is reported to the originating session only and leaves shared state
//! untouched. [`CoordinatorError`] covers events the runtime should never
//! produce and never reaches a client.

use parley_proto::{ErrorCode, SessionId};
use thiserror::Error;

/// Why an intent was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    /// Display name empty after trimming, or too long
    #[error("display name must be 1 to {max} characters")]
    InvalidName {
        /// Configured maximum length in characters
        max: usize,
    },

    /// Room name empty after trimming, or too long
    #[error("room name must be 1 to {max} characters")]
    InvalidRoomName {
        /// Configured maximum length in characters
        max: usize,
    },

    /// Explicit private join to a room that does not exist
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// Close attempted by someone other than the owner
    #[error("only the owner can close room {0}")]
    NotOwner(String),

    /// Close attempted on the default room
    #[error("the default room cannot be closed")]
    CannotCloseDefault,

    /// Private message to a session with no identity
    #[error("recipient not found: {0}")]
    RecipientNotFound(SessionId),

    /// Room-scoped intent while outside any room
    #[error("not in a room")]
    NotInRoom,

    /// Intent requires `join_application` first
    #[error("session has not joined the application")]
    NotIdentified,

    /// Resume token unknown or expired
    #[error("resume token unknown or expired")]
    SessionExpired,
}

impl IntentError {
    /// Wire code reported in `operation_error`.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidName { .. } => ErrorCode::InvalidName,
            Self::InvalidRoomName { .. } => ErrorCode::InvalidRoomName,
            Self::RoomNotFound(_) => ErrorCode::RoomNotFound,
            Self::NotOwner(_) => ErrorCode::NotOwner,
            Self::CannotCloseDefault => ErrorCode::CannotCloseDefault,
            Self::RecipientNotFound(_) => ErrorCode::RecipientNotFound,
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::NotIdentified => ErrorCode::NotIdentified,
            Self::SessionExpired => ErrorCode::SessionExpired,
        }
    }
}

/// Errors in the event stream itself.
///
/// These indicate a runtime bug (events for sessions it never announced), not
/// a misbehaving client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Event references a session that was never accepted or already closed
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// `ConnectionAccepted` for a session id that is still live
    #[error("session already exists: {0}")]
    SessionAlreadyExists(SessionId),
}
