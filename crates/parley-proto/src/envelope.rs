//! Routed message envelopes.
//!
//! An [`Envelope`] is the unit of delivery. It is built once by the router,
//! fanned out to its audience, and never modified afterwards.

use serde::{Deserialize, Serialize};

use crate::{MessageContent, MessageId, SessionId};

/// Envelope kind, derived from the body shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text
    Text,
    /// Code snippet
    Code,
    /// File reference
    File,
    /// Relay-generated notice
    System,
}

/// Body of an envelope.
///
/// The kind tag and payload shape travel together, so an envelope can never
/// claim to be `code` while carrying a file reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvelopeBody {
    /// Plain text
    Text {
        /// Message body
        body: String,
    },
    /// Code snippet
    Code {
        /// Code body
        body: String,
        /// Language tag
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// File reference
    File {
        /// Opaque reference
        reference: String,
        /// Original file name
        file_name: String,
    },
    /// Relay-generated notice
    System {
        /// Notice text
        text: String,
    },
}

impl EnvelopeBody {
    /// Kind of this body.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Code { .. } => MessageKind::Code,
            Self::File { .. } => MessageKind::File,
            Self::System { .. } => MessageKind::System,
        }
    }
}

impl From<MessageContent> for EnvelopeBody {
    fn from(content: MessageContent) -> Self {
        match content {
            MessageContent::Text { body } => Self::Text { body },
            MessageContent::Code { body, language } => Self::Code { body, language },
            MessageContent::File { reference, file_name } => Self::File { reference, file_name },
        }
    }
}

/// Who sent a non-system envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Sending session
    pub session: SessionId,
    /// Display name at send time
    pub display_name: String,
}

/// Who an envelope is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Audience {
    /// Every member of a room
    Room {
        /// Room name
        name: String,
    },
    /// Exactly two sessions
    Private {
        /// Sending session
        from: SessionId,
        /// Receiving session
        to: SessionId,
    },
}

/// One routed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique id
    pub id: MessageId,
    /// Kind-tagged payload
    pub body: EnvelopeBody,
    /// Sender; `None` exactly when the body is `System`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    /// Unix milliseconds when the relay accepted the message
    pub timestamp_ms: u64,
    /// Delivery scope
    pub audience: Audience,
}

impl Envelope {
    /// Kind of this envelope.
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Room name if this envelope was broadcast to a room.
    pub fn room(&self) -> Option<&str> {
        match &self.audience {
            Audience::Room { name } => Some(name),
            Audience::Private { .. } => None,
        }
    }
}
