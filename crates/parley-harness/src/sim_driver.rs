//! Simulation driver.
//!
//! `SimDriver` plays the part of the production runtime for tests: it feeds
//! events to a [`SessionCoordinator`] running on a [`SimEnv`], executes the
//! returned actions against per-session inboxes, and optionally checks
//! invariants after every step.
//!
//! Like the real runtime, a `CloseConnection` action is followed by the
//! transport's `ConnectionClosed` event, and nothing is delivered to a session
//! after it was closed.

use std::collections::{HashMap, HashSet};

use parley_core::{
    CoordinatorAction, CoordinatorConfig, CoordinatorError, CoordinatorEvent, Environment,
    LogLevel, SessionCoordinator,
};
use parley_proto::{Intent, ServerMessage, SessionId};

use crate::{
    SimEnv,
    invariants::{InvariantRegistry, SystemSnapshot},
};

/// Deterministic stand-in for the server runtime.
pub struct SimDriver {
    coordinator: SessionCoordinator<SimEnv>,
    env: SimEnv,
    inboxes: HashMap<SessionId, Vec<ServerMessage>>,
    closed: HashMap<SessionId, String>,
    issued: HashSet<SessionId>,
    error_logs: usize,
    steps: u64,
    invariants: Option<InvariantRegistry>,
}

impl SimDriver {
    /// Create a driver over a fresh coordinator.
    pub fn new(env: SimEnv, config: CoordinatorConfig) -> Self {
        let coordinator = SessionCoordinator::new(env.clone(), config);
        Self::with_coordinator(env, coordinator)
    }

    /// Create a driver with default configuration and the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(SimEnv::with_seed(seed), CoordinatorConfig::default())
    }

    /// Create a driver over an existing coordinator.
    ///
    /// `env` must be the environment the coordinator was built with.
    pub fn with_coordinator(env: SimEnv, coordinator: SessionCoordinator<SimEnv>) -> Self {
        let issued = coordinator.sessions().collect();
        Self {
            coordinator,
            env,
            inboxes: HashMap::new(),
            closed: HashMap::new(),
            issued,
            error_logs: 0,
            steps: 0,
            invariants: None,
        }
    }

    /// Enable invariant checking after every step.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Open a new transport session with a fresh random id.
    pub fn connect(&mut self) -> Result<SessionId, CoordinatorError> {
        let session = loop {
            let candidate = SessionId(self.env.random_u64());
            if self.issued.insert(candidate) {
                break candidate;
            }
        };
        self.process(CoordinatorEvent::ConnectionAccepted { session })?;
        Ok(session)
    }

    /// Deliver an intent from a session.
    pub fn send(
        &mut self,
        session: SessionId,
        intent: Intent,
    ) -> Result<Vec<CoordinatorAction>, CoordinatorError> {
        self.process(CoordinatorEvent::IntentReceived { session, intent })
    }

    /// Simulate the transport dropping a session.
    pub fn drop_connection(
        &mut self,
        session: SessionId,
        reason: &str,
    ) -> Result<Vec<CoordinatorAction>, CoordinatorError> {
        self.closed.insert(session, reason.to_string());
        self.process(CoordinatorEvent::ConnectionClosed { session, reason: reason.to_string() })
    }

    /// Run periodic housekeeping.
    pub fn tick(&mut self) -> Result<Vec<CoordinatorAction>, CoordinatorError> {
        self.process(CoordinatorEvent::Tick)
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: std::time::Duration) {
        self.env.advance(by);
    }

    /// Process one event and execute its actions.
    ///
    /// Returns the actions of `event` itself; follow-up close events are
    /// processed but their actions are only applied.
    pub fn process(
        &mut self,
        event: CoordinatorEvent,
    ) -> Result<Vec<CoordinatorAction>, CoordinatorError> {
        let actions = self.coordinator.process_event(event)?;
        let closes = self.apply(&actions);
        self.check_invariants();

        for (session, reason) in closes {
            let follow = self
                .coordinator
                .process_event(CoordinatorEvent::ConnectionClosed { session, reason })?;
            self.apply(&follow);
            self.check_invariants();
        }

        Ok(actions)
    }

    fn apply(&mut self, actions: &[CoordinatorAction]) -> Vec<(SessionId, String)> {
        let mut closes = Vec::new();

        for action in actions {
            match action {
                CoordinatorAction::SendToSession { session, message } => {
                    self.deliver(*session, message);
                },
                CoordinatorAction::Broadcast { recipients, message } => {
                    for session in recipients {
                        self.deliver(*session, message);
                    }
                },
                CoordinatorAction::CloseConnection { session, reason } => {
                    if self.closed.insert(*session, reason.clone()).is_none() {
                        closes.push((*session, reason.clone()));
                    }
                },
                CoordinatorAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{message}"),
                    LogLevel::Info => tracing::info!("{message}"),
                    LogLevel::Warn => tracing::warn!("{message}"),
                    LogLevel::Error => {
                        self.error_logs += 1;
                        tracing::error!("{message}");
                    },
                },
            }
        }

        closes
    }

    fn deliver(&mut self, session: SessionId, message: &ServerMessage) {
        if self.closed.contains_key(&session) {
            return;
        }
        self.inboxes.entry(session).or_default().push(message.clone());
    }

    fn check_invariants(&mut self) {
        self.steps += 1;
        if let Some(registry) = &self.invariants {
            let snapshot = SystemSnapshot::from_coordinator(&self.coordinator);
            registry.assert_all(&snapshot, &format!("after step {}", self.steps));
        }
    }

    /// Messages delivered to a session so far.
    pub fn inbox(&self, session: SessionId) -> &[ServerMessage] {
        self.inboxes.get(&session).map(Vec::as_slice).unwrap_or_default()
    }

    /// Take and clear a session's inbox.
    pub fn take_inbox(&mut self, session: SessionId) -> Vec<ServerMessage> {
        self.inboxes.remove(&session).unwrap_or_default()
    }

    /// Clear every inbox.
    pub fn clear_inboxes(&mut self) {
        self.inboxes.clear();
    }

    /// Why a session was closed, if it was.
    pub fn close_reason(&self, session: SessionId) -> Option<&str> {
        self.closed.get(&session).map(String::as_str)
    }

    /// Number of error-level log actions seen.
    pub fn error_log_count(&self) -> usize {
        self.error_logs
    }

    /// The coordinator under test.
    pub fn coordinator(&self) -> &SessionCoordinator<SimEnv> {
        &self.coordinator
    }

    /// Snapshot of the coordinator's current state.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_coordinator(&self.coordinator)
    }

    /// The simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }
}
