//! Per-session outbound queues.
//!
//! Coordinator actions are turned into encoded frames and pushed onto one
//! bounded queue per session while the coordinator lock is held. A writer task
//! per session drains its queue onto the relay-to-client stream, so the lock
//! is never held across a network write and each session sees its messages in
//! the order the coordinator produced them.

use std::collections::HashMap;

use bytes::Bytes;
use parley_core::{CoordinatorAction, LogLevel};
use parley_proto::SessionId;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::wire::encode_message;

/// Close reason for sessions that stop reading.
pub const QUEUE_FULL_REASON: &str = "outbound queue full";

/// One item for a session's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Encoded frame to write
    Frame(Bytes),
    /// Flush what was queued, then close the connection
    Close(String),
}

/// A session the runtime must close right away rather than after a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmediateClose {
    /// Session to close
    pub session: SessionId,
    /// Reason sent to the peer
    pub reason: String,
}

/// Queues for every session with a live writer.
#[derive(Debug)]
pub struct OutboundQueues {
    senders: HashMap<SessionId, mpsc::Sender<Outgoing>>,
    depth: usize,
}

impl OutboundQueues {
    /// Create an empty set of queues, each holding at most `depth` items.
    pub fn new(depth: usize) -> Self {
        Self { senders: HashMap::new(), depth: depth.max(1) }
    }

    /// Create the queue for a new session and return its receiving end.
    ///
    /// Replaces any queue already registered for `session`.
    pub fn register(&mut self, session: SessionId) -> mpsc::Receiver<Outgoing> {
        let (tx, rx) = mpsc::channel(self.depth);
        self.senders.insert(session, tx);
        rx
    }

    /// Drop a session's queue. Its writer finishes what was queued and exits.
    pub fn remove(&mut self, session: SessionId) -> bool {
        self.senders.remove(&session).is_some()
    }

    /// Whether `session` has a queue.
    pub fn contains(&self, session: SessionId) -> bool {
        self.senders.contains_key(&session)
    }

    /// Number of registered queues.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Whether no queues are registered.
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Execute coordinator actions.
    ///
    /// Messages are queued, closes are queued behind them, and log actions go
    /// to `tracing`. Returns the sessions whose queue overflowed or vanished
    /// before a close could be queued; the caller closes those directly.
    pub fn dispatch(&mut self, actions: Vec<CoordinatorAction>) -> Vec<ImmediateClose> {
        let mut immediate = Vec::new();

        for action in actions {
            match action {
                CoordinatorAction::SendToSession { session, message } => {
                    let Ok(bytes) = encode_message(&message)
                        .inspect_err(|e| tracing::error!("Failed to encode message for {session}: {e}"))
                    else {
                        continue;
                    };
                    self.push(session, Outgoing::Frame(bytes), &mut immediate);
                },

                CoordinatorAction::Broadcast { recipients, message } => {
                    let Ok(bytes) = encode_message(&message)
                        .inspect_err(|e| tracing::error!("Failed to encode broadcast: {e}"))
                    else {
                        continue;
                    };
                    for session in recipients {
                        self.push(session, Outgoing::Frame(bytes.clone()), &mut immediate);
                    }
                },

                CoordinatorAction::CloseConnection { session, reason } => {
                    tracing::info!("Closing connection {}: {}", session, reason);
                    match self.senders.remove(&session) {
                        Some(tx) => {
                            if tx.try_send(Outgoing::Close(reason.clone())).is_err() {
                                immediate.push(ImmediateClose { session, reason });
                            }
                        },
                        None => immediate.push(ImmediateClose { session, reason }),
                    }
                },

                CoordinatorAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }

        immediate
    }

    fn push(&mut self, session: SessionId, item: Outgoing, immediate: &mut Vec<ImmediateClose>) {
        let Some(tx) = self.senders.get(&session) else {
            tracing::debug!("No outbound queue for {}", session);
            return;
        };

        match tx.try_send(item) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Outbound queue full for {}, closing", session);
                self.senders.remove(&session);
                immediate.push(ImmediateClose { session, reason: QUEUE_FULL_REASON.to_string() });
            },
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Writer for {} already gone", session);
                self.senders.remove(&session);
            },
        }
    }
}
