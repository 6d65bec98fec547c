//! Fuzz target for coordinator event sequences
//!
//! Drives a simulated relay with arbitrary intents, transport drops, resumes
//! and clock jumps across a handful of sessions.
//!
//! # Invariants
//!
//! - Registry and room directory always agree on membership
//! - The default room always exists; no other room is ever empty
//! - Every room member has a live identity
//! - The coordinator never has to repair a ghost member (no error logs)
//! - NEVER panic, whatever the client sends

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_core::{CoordinatorConfig, OwnershipPolicy};
use parley_harness::{InvariantRegistry, SimDriver, SimEnv};
use parley_proto::{Intent, MessageContent, ResumeToken, SessionId, Visibility};

const SLOTS: usize = 5;
const ROOMS: [&str; 5] = ["general", "ops", "Ops", "  ops  ", ""];

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    transfer_ownership: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Arbitrary)]
enum Step {
    Connect,
    Identify { slot: u8, name: String },
    Join { slot: u8, room: u8 },
    Create { slot: u8, room: u8, public: bool },
    JoinPrivate { slot: u8, room: u8 },
    Leave { slot: u8 },
    Close { slot: u8, room: u8 },
    Say { slot: u8, body: String },
    Whisper { slot: u8, to: u8, raw_target: Option<u64> },
    Typing { slot: u8, active: bool },
    Disconnect { slot: u8 },
    Drop { slot: u8 },
    Resume { slot: u8, token_of: u8, forged: Option<u128> },
    Advance { secs: u16 },
    Tick,
}

fuzz_target!(|scenario: Scenario| {
    let config = CoordinatorConfig {
        max_connections: SLOTS,
        ownership_policy: if scenario.transfer_ownership {
            OwnershipPolicy::TransferToOldestMember
        } else {
            OwnershipPolicy::Orphan
        },
        resume_ttl: Duration::from_secs(60),
        ..Default::default()
    };
    let mut driver = SimDriver::new(SimEnv::with_seed(scenario.seed), config)
        .with_invariants(InvariantRegistry::standard());
    let mut slots: Vec<Option<SessionId>> = vec![None; SLOTS];
    let mut tokens: Vec<Option<ResumeToken>> = vec![None; SLOTS];

    for step in scenario.steps.into_iter().take(256) {
        let intent = match step {
            Step::Connect => {
                if let Some(free) = (0..SLOTS).find(|&s| live(&driver, &slots, s as u8).is_none()) {
                    slots[free] = driver.connect().ok();
                }
                continue;
            },
            Step::Drop { slot } => {
                if let Some(session) = live(&driver, &slots, slot) {
                    let _ = driver.drop_connection(session, "fuzz drop");
                }
                continue;
            },
            Step::Advance { secs } => {
                driver.advance(Duration::from_secs(u64::from(secs)));
                continue;
            },
            Step::Tick => {
                let _ = driver.tick();
                continue;
            },
            Step::Identify { slot, name } => (slot, Intent::JoinApplication { display_name: name }),
            Step::Join { slot, room } => (slot, Intent::JoinRoom { room: pick(room).into() }),
            Step::Create { slot, room, public } => {
                let visibility = if public { Visibility::Public } else { Visibility::Private };
                (slot, Intent::CreateRoom { room: pick(room).into(), visibility })
            },
            Step::JoinPrivate { slot, room } => {
                (slot, Intent::JoinPrivateRoom { room: pick(room).into() })
            },
            Step::Leave { slot } => (slot, Intent::LeaveRoom),
            Step::Close { slot, room } => (slot, Intent::CloseRoom { room: pick(room).into() }),
            Step::Say { slot, body } => {
                (slot, Intent::SendMessage { content: MessageContent::Text { body } })
            },
            Step::Whisper { slot, to, raw_target } => {
                let to = raw_target
                    .map(SessionId)
                    .or(slots[to as usize % SLOTS])
                    .unwrap_or(SessionId(0));
                (slot, Intent::SendPrivateMessage {
                    to,
                    content: MessageContent::Code { body: "fn main() {}".into(), language: None },
                })
            },
            Step::Typing { slot, active } => (slot, Intent::Typing { active }),
            Step::Disconnect { slot } => (slot, Intent::Disconnect),
            Step::Resume { slot, token_of, forged } => {
                let Some(token) = forged.map(ResumeToken).or(tokens[token_of as usize % SLOTS])
                else {
                    continue;
                };
                (slot, Intent::Resume { token })
            },
        };

        let (slot, intent) = intent;
        let Some(session) = live(&driver, &slots, slot) else {
            continue;
        };
        driver.send(session, intent).expect("live session accepted by coordinator");

        if let Some(record) = driver.coordinator().registry().lookup(session) {
            tokens[slot as usize % SLOTS] = Some(record.resume_token);
        }
    }

    assert_eq!(driver.error_log_count(), 0, "coordinator repaired a ghost member");
});

fn live(driver: &SimDriver, slots: &[Option<SessionId>], slot: u8) -> Option<SessionId> {
    let session = slots[slot as usize % SLOTS]?;
    driver.coordinator().session_state(session).map(|_| session)
}

fn pick(room: u8) -> &'static str {
    ROOMS[room as usize % ROOMS.len()]
}
