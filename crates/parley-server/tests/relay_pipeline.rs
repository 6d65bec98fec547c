//! Runtime plumbing without sockets.
//!
//! Intents are framed into byte streams, read back with the server's frame
//! reader, fed to a coordinator on a simulated environment, and the resulting
//! actions executed into outbound queues. What each session would have
//! received on the wire is decoded from its queue.

use std::collections::HashMap;

use parley_core::{CoordinatorConfig, CoordinatorEvent, SessionCoordinator};
use parley_harness::SimEnv;
use parley_proto::{
    EnvelopeBody, Frame, Intent, MessageContent, ServerMessage, SessionId, Visibility,
};
use parley_server::{ImmediateClose, OutboundQueues, Outgoing, wire};
use tokio::sync::mpsc;

const MAX_FRAME: usize = 64 * 1024;

struct Pipeline {
    coordinator: SessionCoordinator<SimEnv>,
    queues: OutboundQueues,
    receivers: HashMap<SessionId, mpsc::Receiver<Outgoing>>,
    immediate: Vec<ImmediateClose>,
}

impl Pipeline {
    fn new(config: CoordinatorConfig) -> Self {
        Self {
            coordinator: SessionCoordinator::new(SimEnv::with_seed(42), config),
            queues: OutboundQueues::new(64),
            receivers: HashMap::new(),
            immediate: Vec::new(),
        }
    }

    fn event(&mut self, event: CoordinatorEvent) {
        let actions = self.coordinator.process_event(event).unwrap();
        self.immediate.extend(self.queues.dispatch(actions));
    }

    fn connect(&mut self, id: u64) -> SessionId {
        let session = SessionId(id);
        self.receivers.insert(session, self.queues.register(session));
        self.event(CoordinatorEvent::ConnectionAccepted { session });
        session
    }

    /// Feed a client's byte stream through the frame reader.
    async fn stream(&mut self, session: SessionId, bytes: &[u8]) {
        let mut recv = bytes;
        while let Some(intent) = wire::read_intent(&mut recv, MAX_FRAME).await.unwrap() {
            self.event(CoordinatorEvent::IntentReceived { session, intent });
        }
    }

    /// Everything queued for a session so far.
    fn drain(&mut self, session: SessionId) -> (Vec<ServerMessage>, Option<String>) {
        let mut messages = Vec::new();
        let mut close = None;
        if let Some(rx) = self.receivers.get_mut(&session) {
            while let Ok(item) = rx.try_recv() {
                match item {
                    Outgoing::Frame(bytes) => {
                        let frame = Frame::decode(&bytes, MAX_FRAME).unwrap();
                        messages.push(frame.to_message().unwrap());
                    },
                    Outgoing::Close(reason) => close = Some(reason),
                }
            }
        }
        (messages, close)
    }
}

fn framed(intents: &[Intent]) -> Vec<u8> {
    let mut buf = Vec::new();
    for intent in intents {
        buf.extend_from_slice(&Frame::from_message(intent).unwrap().to_bytes().unwrap());
    }
    buf
}

#[tokio::test]
async fn room_message_reaches_both_members_on_the_wire() {
    let mut pipeline = Pipeline::new(CoordinatorConfig::default());
    let a = pipeline.connect(1);
    let b = pipeline.connect(2);

    pipeline
        .stream(b, &framed(&[Intent::JoinApplication { display_name: "bea".into() }]))
        .await;
    pipeline
        .stream(a, &framed(&[
            Intent::JoinApplication { display_name: "al".into() },
            Intent::SendMessage { content: MessageContent::Text { body: "morning".into() } },
        ]))
        .await;

    for session in [a, b] {
        let (messages, close) = pipeline.drain(session);
        assert!(close.is_none());
        let got_text = messages.iter().any(|m| matches!(
            m,
            ServerMessage::RoomMessage { envelope }
                if envelope.body == EnvelopeBody::Text { body: "morning".into() }
        ));
        assert!(got_text, "{session} missed the room message");
    }
}

#[tokio::test]
async fn disconnect_queues_close_after_final_messages() {
    let mut pipeline = Pipeline::new(CoordinatorConfig::default());
    let a = pipeline.connect(1);

    pipeline
        .stream(a, &framed(&[
            Intent::JoinApplication { display_name: "al".into() },
            Intent::CreateRoom { room: "ops".into(), visibility: Visibility::Private },
            Intent::Disconnect,
        ]))
        .await;

    let (messages, close) = pipeline.drain(a);
    assert!(messages.contains(&ServerMessage::JoinedRoom {
        name: "ops".into(),
        owner: Some(a),
        visibility: Visibility::Private,
    }));
    assert_eq!(close.as_deref(), Some("client disconnect"));
    assert!(pipeline.immediate.is_empty());

    // The transport's own close event afterwards is a no-op
    pipeline.event(CoordinatorEvent::ConnectionClosed { session: a, reason: "closed".into() });
    assert_eq!(pipeline.coordinator.connection_count(), 0);
}

#[tokio::test]
async fn excess_connection_closed_with_reason() {
    let mut pipeline =
        Pipeline::new(CoordinatorConfig { max_connections: 1, ..Default::default() });
    let first = pipeline.connect(1);
    let second = pipeline.connect(2);

    assert_eq!(pipeline.drain(first).1, None);
    assert_eq!(pipeline.drain(second).1.as_deref(), Some("max connections exceeded"));
}

#[tokio::test]
async fn operation_error_goes_to_originator_only() {
    let mut pipeline = Pipeline::new(CoordinatorConfig::default());
    let a = pipeline.connect(1);
    let b = pipeline.connect(2);
    pipeline.drain(a);
    pipeline.drain(b);

    pipeline.stream(a, &framed(&[Intent::LeaveRoom])).await;

    let (messages, _) = pipeline.drain(a);
    assert!(matches!(messages.as_slice(), [ServerMessage::OperationError { .. }]));
    assert!(pipeline.drain(b).0.is_empty());
}
