//! Parley coordination core.
//!
//! Sans-IO implementation of the relay's session and room layer. Nothing in
//! this crate touches sockets, clocks, or threads directly.
//!
//! # Architecture
//!
//! The [`SessionCoordinator`] is a pure state machine: the runtime turns
//! network activity into [`CoordinatorEvent`]s, calls
//! [`SessionCoordinator::process_event`], and executes the returned
//! [`CoordinatorAction`]s. Time and randomness come from an [`Environment`],
//! so the same logic runs under the production runtime and under the
//! deterministic simulation in `parley-harness`.
//!
//! # Components
//!
//! - [`IdentityRegistry`]: session → display name, current room, resume token
//! - [`RoomDirectory`]: room → visibility, owner, members; room lifecycle
//! - [`MessageRouter`]: envelope construction and recipient resolution
//! - [`ResumeBook`]: identities parked after a transport drop
//! - [`RoomHistory`]: recent member messages replayed to late joiners
//! - [`SessionCoordinator`]: composes the above, one event at a time

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod coordinator;
pub mod directory;
pub mod env;
pub mod error;
pub mod history;
pub mod registry;
pub mod resume;
pub mod router;

pub use coordinator::{
    CoordinatorAction, CoordinatorConfig, CoordinatorEvent, LogLevel, OwnershipPolicy,
    SessionCoordinator, SessionState,
};
pub use directory::{CloseOutcome, JoinOutcome, LeaveOutcome, Room, RoomDirectory, RoomSnapshot};
pub use env::Environment;
pub use error::{CoordinatorError, IntentError};
pub use history::{DEFAULT_HISTORY_LEN, RoomHistory};
pub use registry::{DEFAULT_MAX_NAME_LEN, IdentityRegistry, UserRecord};
pub use resume::{ParkedIdentity, ResumeBook};
pub use router::{Delivery, MessageRouter};
