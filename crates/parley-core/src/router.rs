//! Message router.
//!
//! Builds envelopes and resolves who receives them. The router keeps no
//! membership of its own: recipients are read from the directory and registry
//! at call time, so a delivery is only as correct as those stores are
//! consistent. The one piece of state is the message id counter.

use parley_proto::{
    Audience, Envelope, EnvelopeBody, MessageContent, MessageId, Sender, ServerMessage, SessionId,
};

use crate::{directory::RoomDirectory, error::IntentError, registry::IdentityRegistry};

/// A message together with the sessions it goes to.
///
/// Recipients are fully resolved, so the runtime can write to them without
/// consulting any shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Target sessions, each listed once
    pub recipients: Vec<SessionId>,
    /// Message for every recipient
    pub message: ServerMessage,
}

/// Envelope factory and recipient resolver.
#[derive(Debug)]
pub struct MessageRouter {
    next_id: u64,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    /// Create a router whose first envelope gets id 1.
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Id the next envelope will receive.
    pub fn peek_next_id(&self) -> MessageId {
        MessageId(self.next_id)
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Build an envelope addressed to a room.
    pub fn room_envelope(
        &mut self,
        room: &str,
        body: EnvelopeBody,
        sender: Option<Sender>,
        timestamp_ms: u64,
    ) -> Envelope {
        Envelope {
            id: self.allocate_id(),
            body,
            sender,
            timestamp_ms,
            audience: Audience::Room { name: room.to_string() },
        }
    }

    /// Deliver an envelope to every current member of its room.
    ///
    /// Private envelopes have no room and resolve to nobody.
    pub fn deliver_to_room(&self, directory: &RoomDirectory, envelope: Envelope) -> Delivery {
        let recipients = envelope.room().map(|room| directory.members(room).to_vec()).unwrap_or_default();
        Delivery { recipients, message: ServerMessage::RoomMessage { envelope } }
    }

    /// Build and deliver a private message.
    ///
    /// Delivered to the recipient and echoed to the sender; a message to
    /// oneself is delivered once.
    ///
    /// # Errors
    ///
    /// - `IntentError::NotIdentified` if the sender has no identity
    /// - `IntentError::RecipientNotFound` if `to` has no identity
    pub fn deliver_private(
        &mut self,
        registry: &IdentityRegistry,
        from: SessionId,
        to: SessionId,
        content: MessageContent,
        timestamp_ms: u64,
    ) -> Result<Delivery, IntentError> {
        let sender = registry.lookup(from).ok_or(IntentError::NotIdentified)?;
        if !registry.contains(to) {
            return Err(IntentError::RecipientNotFound(to));
        }

        let envelope = Envelope {
            id: self.allocate_id(),
            body: content.into(),
            sender: Some(Sender { session: from, display_name: sender.display_name.clone() }),
            timestamp_ms,
            audience: Audience::Private { from, to },
        };

        let recipients = if from == to { vec![to] } else { vec![to, from] };
        Ok(Delivery { recipients, message: ServerMessage::PrivateMessage { envelope } })
    }

    /// Build and deliver a system notice to a room.
    pub fn system_notice(
        &mut self,
        directory: &RoomDirectory,
        room: &str,
        text: String,
        timestamp_ms: u64,
    ) -> Delivery {
        let envelope = self.room_envelope(room, EnvelopeBody::System { text }, None, timestamp_ms);
        self.deliver_to_room(directory, envelope)
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::{MessageKind, ResumeToken};

    use super::*;

    fn text(body: &str) -> MessageContent {
        MessageContent::Text { body: body.into() }
    }

    fn setup() -> (IdentityRegistry, RoomDirectory) {
        let mut registry = IdentityRegistry::new();
        let mut directory = RoomDirectory::new();
        for s in 1..=3 {
            registry.register(SessionId(s), &format!("user{s}"), ResumeToken(u128::from(s))).unwrap();
        }
        directory.join(&mut registry, SessionId(1), "ops").unwrap();
        directory.join(&mut registry, SessionId(2), "ops").unwrap();
        directory.join(&mut registry, SessionId(3), "other").unwrap();
        (registry, directory)
    }

    #[test]
    fn ids_are_never_reused() {
        let mut router = MessageRouter::new();
        let a = router.room_envelope("ops", EnvelopeBody::Text { body: "a".into() }, None, 0);
        let b = router.room_envelope("ops", EnvelopeBody::Text { body: "b".into() }, None, 0);

        assert!(b.id > a.id);
        assert_eq!(router.peek_next_id(), MessageId(b.id.0 + 1));
    }

    #[test]
    fn room_delivery_reaches_current_members_only() {
        let (_registry, directory) = setup();
        let mut router = MessageRouter::new();

        let envelope = router.room_envelope("ops", text("hi").into(), None, 42);
        let delivery = router.deliver_to_room(&directory, envelope);

        assert_eq!(delivery.recipients, vec![SessionId(1), SessionId(2)]);
        match delivery.message {
            ServerMessage::RoomMessage { envelope } => {
                assert_eq!(envelope.room(), Some("ops"));
                assert_eq!(envelope.timestamp_ms, 42);
            },
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn private_delivery_reaches_both_parties_once() {
        let (registry, _directory) = setup();
        let mut router = MessageRouter::new();

        let delivery =
            router.deliver_private(&registry, SessionId(1), SessionId(3), text("psst"), 0).unwrap();

        assert_eq!(delivery.recipients, vec![SessionId(3), SessionId(1)]);
        let ServerMessage::PrivateMessage { envelope } = delivery.message else {
            panic!("expected private message");
        };
        assert_eq!(envelope.audience, Audience::Private { from: SessionId(1), to: SessionId(3) });
        assert_eq!(envelope.sender.unwrap().display_name, "user1");
    }

    #[test]
    fn private_delivery_to_self_is_single() {
        let (registry, _directory) = setup();
        let mut router = MessageRouter::new();

        let delivery =
            router.deliver_private(&registry, SessionId(2), SessionId(2), text("note"), 0).unwrap();
        assert_eq!(delivery.recipients, vec![SessionId(2)]);
    }

    #[test]
    fn private_delivery_to_unknown_fails_without_consuming_id() {
        let (registry, _directory) = setup();
        let mut router = MessageRouter::new();
        let before = router.peek_next_id();

        assert_eq!(
            router.deliver_private(&registry, SessionId(1), SessionId(99), text("?"), 0),
            Err(IntentError::RecipientNotFound(SessionId(99)))
        );
        assert_eq!(router.peek_next_id(), before);
    }

    #[test]
    fn system_notice_has_no_sender() {
        let (_registry, directory) = setup();
        let mut router = MessageRouter::new();

        let delivery = router.system_notice(&directory, "other", "hello".into(), 0);

        assert_eq!(delivery.recipients, vec![SessionId(3)]);
        let ServerMessage::RoomMessage { envelope } = delivery.message else {
            panic!("expected room message");
        };
        assert_eq!(envelope.kind(), MessageKind::System);
        assert!(envelope.sender.is_none());
    }
}
