//! Parley production server.
//!
//! Runs the sans-IO [`SessionCoordinator`] behind a Quinn QUIC endpoint on
//! the Tokio runtime, with system time and OS randomness.
//!
//! # Architecture
//!
//! The coordinator and the per-session outbound queues live together behind
//! one `tokio::sync::Mutex`. Each event (accepted connection, decoded intent,
//! closed connection, tick) is one critical section: the coordinator
//! processes it and its actions are queued before the lock is released.
//! Writer tasks drain the queues onto the network afterwards.
//!
//! # Ordering
//!
//! A client may send intents on any number of bidirectional streams, but a
//! connection serves them one at a time: a stream is read to its end before
//! the next one is accepted. Intents from one connection therefore reach the
//! coordinator in the order the client sent them.
//!
//! # Components
//!
//! - [`Server`]: accept loop, per-connection tasks, housekeeping ticks
//! - [`QuinnTransport`]: QUIC endpoint and TLS setup
//! - [`OutboundQueues`]: executes coordinator actions into per-session queues
//! - [`SystemEnv`]: production environment (real time, OS RNG)
//! - [`wire`]: frame reading and message encoding on streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod outbound;
mod system_env;
mod transport;
pub mod wire;

use std::{collections::HashMap, future::Future, net::SocketAddr, sync::Arc, time::Duration};

pub use error::ServerError;
pub use outbound::{ImmediateClose, OutboundQueues, Outgoing};
use parley_core::{CoordinatorAction, CoordinatorConfig, CoordinatorEvent, Environment, SessionCoordinator};
use parley_proto::SessionId;
pub use system_env::SystemEnv;
use tokio::sync::{Mutex, mpsc};
pub use transport::{QuinnConnection, QuinnTransport};

/// How long a closing session may take to flush its queued messages.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4433")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Largest inbound frame payload accepted, in bytes
    pub max_frame_bytes: usize,
    /// Messages buffered per session before it is closed as too slow
    pub outbound_queue_depth: usize,
    /// Interval between housekeeping ticks
    pub tick_interval: Duration,
    /// Coordinator configuration (limits, ownership policy, resume TTL)
    pub coordinator: CoordinatorConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            max_frame_bytes: 1024 * 1024,
            outbound_queue_depth: 1024,
            tick_interval: Duration::from_secs(5),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

/// Coordinator plus everything needed to execute its actions.
struct Relay {
    coordinator: SessionCoordinator<SystemEnv>,
    outbound: OutboundQueues,
    /// Live transport connections, for closes that cannot wait for a flush
    connections: HashMap<SessionId, QuinnConnection>,
}

impl Relay {
    /// Process one event and execute its actions.
    fn handle(&mut self, event: CoordinatorEvent) -> Result<(), ServerError> {
        let actions = self.coordinator.process_event(event)?;
        self.execute(actions);
        Ok(())
    }

    fn execute(&mut self, actions: Vec<CoordinatorAction>) {
        for ImmediateClose { session, reason } in self.outbound.dispatch(actions) {
            if let Some(conn) = self.connections.remove(&session) {
                conn.close(&reason);
            }
        }
    }

    /// Draw a session id not currently in use.
    fn fresh_session_id(&self) -> SessionId {
        loop {
            let candidate = SessionId(self.coordinator.env().random_u64());
            if !self.connections.contains_key(&candidate) && !self.outbound.contains(candidate) {
                return candidate;
            }
        }
    }
}

type SharedRelay = Arc<Mutex<Relay>>;

/// Production parley server.
pub struct Server {
    relay: SharedRelay,
    transport: QuinnTransport,
    max_frame_bytes: usize,
    tick_interval: Duration,
}

impl Server {
    /// Create and bind a new server.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        let relay = Relay {
            coordinator: SessionCoordinator::new(SystemEnv::new(), config.coordinator),
            outbound: OutboundQueues::new(config.outbound_queue_depth),
            connections: HashMap::new(),
        };

        Ok(Self {
            relay: Arc::new(Mutex::new(relay)),
            transport,
            max_frame_bytes: config.max_frame_bytes,
            tick_interval: config.tick_interval,
        })
    }

    /// Run the server, accepting connections until the endpoint closes.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let ticker = tokio::spawn(run_ticks(Arc::clone(&self.relay), self.tick_interval));

        while let Some(accepted) = self.transport.accept().await {
            match accepted {
                Ok(conn) => {
                    let relay = Arc::clone(&self.relay);
                    let max_frame_bytes = self.max_frame_bytes;

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, relay, max_frame_bytes).await {
                            tracing::warn!("Connection error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                },
            }
        }

        ticker.abort();
        Ok(())
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

async fn run_ticks(relay: SharedRelay, interval: Duration) {
    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        let mut guard = relay.lock().await;
        if let Err(e) = guard.handle(CoordinatorEvent::Tick) {
            tracing::error!("Tick failed: {}", e);
        }
    }
}

/// Handle a single QUIC connection from handshake to close.
async fn handle_connection(
    conn: QuinnConnection,
    relay: SharedRelay,
    max_frame_bytes: usize,
) -> Result<(), ServerError> {
    let send = conn.open_uni().await?;

    let session = {
        let mut guard = relay.lock().await;
        let session = guard.fresh_session_id();
        let queue = guard.outbound.register(session);
        guard.connections.insert(session, conn.clone());
        tokio::spawn(write_outbound(session, conn.clone(), send, queue));

        guard.handle(CoordinatorEvent::ConnectionAccepted { session })?;
        session
    };

    tracing::debug!("New connection {} from {}", session, conn.remote_addr());

    let reason = serve_streams_in_order(
        || conn.accept_bi(),
        |(send, recv)| {
            let relay = Arc::clone(&relay);
            async move {
                if let Err(e) = handle_stream(session, send, recv, relay, max_frame_bytes).await {
                    tracing::debug!("Stream error on {}: {}", session, e);
                }
            }
        },
    )
    .await
    .to_string();

    tracing::debug!("Connection {} closed: {}", session, reason);

    let mut guard = relay.lock().await;
    guard.connections.remove(&session);
    guard.outbound.remove(session);
    guard.handle(CoordinatorEvent::ConnectionClosed { session, reason })
}

/// Accept streams and serve each to completion before accepting the next.
///
/// Returns the error that ended accepting.
async fn serve_streams_in_order<S, E, A, AF, H, HF>(mut accept: A, mut serve: H) -> E
where
    A: FnMut() -> AF,
    AF: Future<Output = Result<S, E>>,
    H: FnMut(S) -> HF,
    HF: Future<Output = ()>,
{
    loop {
        match accept().await {
            Ok(stream) => serve(stream).await,
            Err(e) => return e,
        }
    }
}

/// Read intents from one client stream, in order, until it ends.
async fn handle_stream(
    session: SessionId,
    send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    relay: SharedRelay,
    max_frame_bytes: usize,
) -> Result<(), ServerError> {
    // Replies travel on the session's outbound stream
    drop(send);

    while let Some(intent) = wire::read_intent(&mut recv, max_frame_bytes).await? {
        tracing::trace!("{} sent {}", session, intent.name());

        let mut guard = relay.lock().await;
        if let Err(e) = guard.handle(CoordinatorEvent::IntentReceived { session, intent }) {
            // Session was closed by the coordinator; later frames are moot
            tracing::debug!("Dropping stream of {}: {}", session, e);
            break;
        }
    }

    Ok(())
}

/// Drain a session's queue onto its outbound stream.
async fn write_outbound(
    session: SessionId,
    conn: QuinnConnection,
    mut send: quinn::SendStream,
    mut queue: mpsc::Receiver<Outgoing>,
) {
    while let Some(item) = queue.recv().await {
        match item {
            Outgoing::Frame(bytes) => {
                if let Err(e) = send.write_all(&bytes).await {
                    tracing::debug!("Write to {} failed: {}", session, e);
                    return;
                }
            },
            Outgoing::Close(reason) => {
                if send.finish().is_ok() {
                    let _ = tokio::time::timeout(CLOSE_GRACE, send.stopped()).await;
                }
                conn.close(&reason);
                return;
            },
        }
    }

    let _ = send.finish();
}
