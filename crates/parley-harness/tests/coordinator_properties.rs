//! Property-based tests for the session coordinator.
//!
//! Random intent sequences over a handful of sessions, with every standard
//! invariant checked after every step. Room and display names come from small
//! pools so that collisions, re-joins and invalid names are common.

use std::time::Duration;

use parley_core::{CoordinatorConfig, OwnershipPolicy};
use parley_harness::{InvariantRegistry, SimDriver, SimEnv, SystemSnapshot};
use parley_proto::{
    DEFAULT_ROOM, ErrorCode, Intent, MessageContent, ResumeToken, ServerMessage, SessionId,
    Visibility,
};
use proptest::prelude::*;

const SLOTS: usize = 4;
const ROOMS: [&str; 4] = [DEFAULT_ROOM, "alpha", "beta", " beta "];
const NAMES: [&str; 4] = ["ann", "bob", "   ", "carol"];

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Identify(usize, usize),
    JoinRoom(usize, usize),
    CreateRoom(usize, usize, bool),
    JoinPrivate(usize, usize),
    Leave(usize),
    Close(usize, usize),
    Send(usize),
    SendPrivate(usize, usize),
    Typing(usize, bool),
    Disconnect(usize),
    Drop(usize),
    Resume(usize, usize),
    Advance(u64),
    Tick,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let slot = 0..SLOTS;
    let room = 0..ROOMS.len();
    prop_oneof![
        3 => Just(Op::Connect),
        3 => (slot.clone(), 0..NAMES.len()).prop_map(|(s, n)| Op::Identify(s, n)),
        3 => (slot.clone(), room.clone()).prop_map(|(s, r)| Op::JoinRoom(s, r)),
        2 => (slot.clone(), room.clone(), any::<bool>()).prop_map(|(s, r, p)| Op::CreateRoom(s, r, p)),
        2 => (slot.clone(), room.clone()).prop_map(|(s, r)| Op::JoinPrivate(s, r)),
        2 => slot.clone().prop_map(Op::Leave),
        2 => (slot.clone(), room).prop_map(|(s, r)| Op::Close(s, r)),
        2 => slot.clone().prop_map(Op::Send),
        2 => (slot.clone(), slot.clone()).prop_map(|(s, t)| Op::SendPrivate(s, t)),
        1 => (slot.clone(), any::<bool>()).prop_map(|(s, a)| Op::Typing(s, a)),
        1 => slot.clone().prop_map(Op::Disconnect),
        2 => slot.clone().prop_map(Op::Drop),
        2 => (slot.clone(), slot).prop_map(|(s, t)| Op::Resume(s, t)),
        1 => (1u64..200).prop_map(Op::Advance),
        1 => Just(Op::Tick),
    ]
}

/// Sessions and resume tokens known to the test.
struct World {
    driver: SimDriver,
    slots: Vec<Option<SessionId>>,
    tokens: Vec<Option<ResumeToken>>,
}

impl World {
    fn new(seed: u64, policy: OwnershipPolicy) -> Self {
        let config = CoordinatorConfig {
            max_connections: SLOTS + 1,
            ownership_policy: policy,
            resume_ttl: Duration::from_secs(300),
            ..Default::default()
        };
        Self {
            driver: SimDriver::new(SimEnv::with_seed(seed), config),
            slots: vec![None; SLOTS],
            tokens: vec![None; SLOTS],
        }
    }

    /// Live session in a slot, if any.
    fn live(&self, slot: usize) -> Option<SessionId> {
        let session = self.slots[slot]?;
        self.driver.coordinator().session_state(session).map(|_| session)
    }

    fn send(&mut self, slot: usize, intent: Intent) {
        if let Some(session) = self.live(slot) {
            self.driver.send(session, intent).unwrap();
            self.record_token(slot, session);
        }
    }

    fn record_token(&mut self, slot: usize, session: SessionId) {
        if let Some(record) = self.driver.coordinator().registry().lookup(session) {
            self.tokens[slot] = Some(record.resume_token);
        }
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Connect => {
                if let Some(slot) = (0..SLOTS).find(|&s| self.live(s).is_none()) {
                    self.slots[slot] = Some(self.driver.connect().unwrap());
                }
            },
            Op::Identify(s, n) => {
                self.send(s, Intent::JoinApplication { display_name: NAMES[n].into() });
            },
            Op::JoinRoom(s, r) => self.send(s, Intent::JoinRoom { room: ROOMS[r].into() }),
            Op::CreateRoom(s, r, public) => {
                let visibility = if public { Visibility::Public } else { Visibility::Private };
                self.send(s, Intent::CreateRoom { room: ROOMS[r].into(), visibility });
            },
            Op::JoinPrivate(s, r) => self.send(s, Intent::JoinPrivateRoom { room: ROOMS[r].into() }),
            Op::Leave(s) => self.send(s, Intent::LeaveRoom),
            Op::Close(s, r) => self.send(s, Intent::CloseRoom { room: ROOMS[r].into() }),
            Op::Send(s) => self.send(s, Intent::SendMessage {
                content: MessageContent::Text { body: format!("from slot {s}") },
            }),
            Op::SendPrivate(s, t) => {
                let to = self.slots[t].unwrap_or(SessionId(u64::MAX));
                self.send(s, Intent::SendPrivateMessage {
                    to,
                    content: MessageContent::Code { body: "x".into(), language: None },
                });
            },
            Op::Typing(s, active) => self.send(s, Intent::Typing { active }),
            Op::Disconnect(s) => self.send(s, Intent::Disconnect),
            Op::Drop(s) => {
                if let Some(session) = self.live(s) {
                    self.driver.drop_connection(session, "dropped").unwrap();
                }
            },
            Op::Resume(s, t) => {
                if let Some(token) = self.tokens[t] {
                    self.send(s, Intent::Resume { token });
                }
            },
            Op::Advance(secs) => self.driver.advance(Duration::from_secs(secs)),
            Op::Tick => {
                self.driver.tick().unwrap();
            },
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Every invariant holds after every step, under either
    /// ownership policy
    #[test]
    fn prop_invariants_hold_under_random_intents(
        seed in any::<u64>(),
        transfer in any::<bool>(),
        ops in prop::collection::vec(op_strategy(), 1..80)
    ) {
        let policy =
            if transfer { OwnershipPolicy::TransferToOldestMember } else { OwnershipPolicy::Orphan };
        let mut world = World::new(seed, policy);
        let invariants = InvariantRegistry::standard();

        for (step, op) in ops.iter().enumerate() {
            world.apply(op);

            let snapshot = SystemSnapshot::from_coordinator(world.driver.coordinator());
            let result = invariants.check_all(&snapshot);
            prop_assert!(result.is_ok(), "step {} ({:?}): {:?}", step, op, result);
        }

        // The coordinator itself never had to repair a ghost
        prop_assert_eq!(world.driver.error_log_count(), 0);
    }

    /// Property: A valid private message reaches sender and recipient exactly
    /// once each, and nobody else
    #[test]
    fn prop_private_delivery_exactly_once(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 0..40),
        from in 0..SLOTS,
        to in 0..SLOTS
    ) {
        let mut world = World::new(seed, OwnershipPolicy::Orphan);
        for op in &ops {
            world.apply(op);
        }

        let (Some(sender), Some(recipient)) = (world.live(from), world.live(to)) else {
            return Ok(());
        };
        let registry = world.driver.coordinator().registry();
        if !registry.contains(sender) || !registry.contains(recipient) {
            return Ok(());
        }

        world.driver.clear_inboxes();
        world.send(from, Intent::SendPrivateMessage {
            to: recipient,
            content: MessageContent::Text { body: "psst".into() },
        });

        let live: Vec<SessionId> = (0..SLOTS).filter_map(|s| world.live(s)).collect();
        for session in live {
            let received = world
                .driver
                .inbox(session)
                .iter()
                .filter(|m| matches!(m, ServerMessage::PrivateMessage { .. }))
                .count();
            let expected = usize::from(session == sender || session == recipient);
            prop_assert_eq!(received, expected, "session {}", session);
        }
    }

    /// Property: Closing the default room always fails, whoever asks
    #[test]
    fn prop_default_room_never_closes(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 0..40),
        requester in 0..SLOTS
    ) {
        let mut world = World::new(seed, OwnershipPolicy::Orphan);
        for op in &ops {
            world.apply(op);
        }
        let Some(session) = world.live(requester) else {
            return Ok(());
        };

        world.driver.clear_inboxes();
        world.send(requester, Intent::CloseRoom { room: DEFAULT_ROOM.into() });

        let expected = if world.driver.coordinator().registry().contains(session) {
            ErrorCode::CannotCloseDefault
        } else {
            ErrorCode::NotIdentified
        };
        let refused = world.driver.inbox(session).iter().any(|m| matches!(
            m,
            ServerMessage::OperationError { code, .. } if *code == expected
        ));
        prop_assert!(refused);
        prop_assert!(world.driver.coordinator().directory().find_by_name(DEFAULT_ROOM).is_some());
    }
}
