//! Identifiers shared by the protocol and the coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One live transport session.
///
/// Assigned by the runtime when a connection is accepted and stable for the
/// lifetime of that connection only. A reconnecting client gets a new
/// `SessionId`; its identity is recovered through a [`ResumeToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Unique envelope identifier. Never reused within a server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Secret handed to a client on identification.
///
/// Presenting it from a new session re-attaches the prior identity (display
/// name, last room). Treat it like a bearer credential: anyone holding it can
/// resume the identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken(pub u128);

// Tokens are secrets; keep them out of logs.
impl fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResumeToken(..)")
    }
}
