//! Server error types.

use std::fmt;

use parley_core::CoordinatorError;
use parley_proto::ProtocolError;

/// Errors that can occur in the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, unreadable TLS files, etc.).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Transport/network error (handshake failure, stream reset, I/O error).
    ///
    /// Fatal for the affected connection only.
    Transport(String),

    /// Protocol error (oversized or truncated frame, malformed intent).
    ///
    /// The offending stream is dropped; other sessions are unaffected.
    Protocol(String),

    /// Internal error (unexpected runtime state).
    ///
    /// Indicates a bug.
    Internal(String),

    /// Coordinator rejected an event.
    ///
    /// Means the runtime fed an event for a session the coordinator does not
    /// know, usually one it already closed.
    Coordinator(CoordinatorError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Coordinator(err) => write!(f, "coordinator error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Coordinator(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CoordinatorError> for ServerError {
    fn from(err: CoordinatorError) -> Self {
        Self::Coordinator(err)
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use parley_proto::SessionId;

    use super::*;

    #[test]
    fn display_prefixes_category() {
        let err = ServerError::Config("missing key".into());
        assert_eq!(err.to_string(), "configuration error: missing key");

        let err: ServerError = ProtocolError::PayloadTooLarge { size: 10, max: 4 }.into();
        assert_eq!(err.to_string(), "protocol error: payload too large: 10 bytes (max 4)");
    }

    #[test]
    fn coordinator_error_is_source() {
        let err: ServerError = CoordinatorError::SessionNotFound(SessionId(3)).into();
        assert!(err.source().is_some());
        assert!(ServerError::Internal("x".into()).source().is_none());
    }
}
