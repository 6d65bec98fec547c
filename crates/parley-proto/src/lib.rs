//! Parley wire protocol.
//!
//! Everything a client and the relay exchange: identifiers, inbound
//! [`Intent`]s, outbound [`ServerMessage`]s, routed [`Envelope`]s, and the
//! length-prefixed CBOR [`Frame`] that carries them.
//!
//! This crate performs no I/O. The server runtime reads frames off the
//! transport, decodes intents, and hands them to `parley-core`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod intent;
pub mod message;

pub use envelope::{Audience, Envelope, EnvelopeBody, MessageKind, Sender};
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use ids::{MessageId, ResumeToken, SessionId};
pub use intent::{Intent, MessageContent};
pub use message::{ErrorCode, OnlineUser, RoomSummary, ServerMessage, Visibility};

/// Name of the room every identified session lands in first.
///
/// Always exists, is public, and can never be closed.
pub const DEFAULT_ROOM: &str = "general";

/// ALPN identifier negotiated on the QUIC handshake.
pub const ALPN_PROTOCOL: &[u8] = b"parley";
