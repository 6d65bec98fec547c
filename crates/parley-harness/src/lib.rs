//! Deterministic simulation harness for the parley relay.
//!
//! Provides a seeded [`SimEnv`] (virtual clock, ChaCha RNG) and a
//! [`SimDriver`] that stands in for the server runtime, so coordinator
//! behavior can be tested step by step and reproduced from a seed.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the
//! coordinator's membership and room-lifecycle invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{
    DefaultRoomPresent, IdentitiesAreLive, Invariant, InvariantKind, InvariantRegistry,
    InvariantResult, MembershipConsistency, NoEmptyRooms, NoGhostMembers, RoomSnapshot,
    SystemSnapshot, UserSnapshot, Violation,
};
pub use sim_driver::SimDriver;
pub use sim_env::{SimEnv, SimInstant};
