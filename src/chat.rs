//! One-to-one conversations: creation, message delivery, read receipts and
//! typing indicators.
//!
//! ## Delivery
//!
//! ```text
//! send_message(conv, sender)
//!   │
//!   ├─ store with status = delivered if the recipient is online, else sent
//!   ├─ broadcast receive-message to every connection in the room
//!   └─ recipient online but not in the room → direct message-delivered
//!
//! deliver_pending(user)            (on user-login)
//!   │
//!   ├─ promote the user's incoming sent messages to delivered
//!   └─ direct message-delivered to each sender that is online
//! ```

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::notifier::ChatRelay;
use crate::protocol::ServerEvent;
use crate::storage::{ConversationRecord, Database, MessageRecord, MessageStatus};

/// Chat operations shared by the HTTP API and the WebSocket gateway.
#[derive(Clone)]
pub struct ChatService {
    db: Database,
    relay: Arc<dyn ChatRelay>,
}

impl ChatService {
    pub fn new(db: Database, relay: Arc<dyn ChatRelay>) -> Self {
        Self { db, relay }
    }

    /// The conversation between two users, created on first use.
    pub fn get_or_create_conversation(&self, a: &str, b: &str) -> Result<ConversationRecord> {
        if a == b {
            return Err(Error::InvalidInput(
                "A conversation needs two different users".to_string(),
            ));
        }
        for user_id in [a, b] {
            if !self.db.user_exists(user_id)? {
                return Err(Error::UserNotFound);
            }
        }
        self.db.get_or_create_conversation(a, b)
    }

    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationRecord>> {
        self.db.conversations_for(user_id)
    }

    /// Messages in creation order.
    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>> {
        self.conversation(conversation_id)?;
        self.db.messages_for(conversation_id)
    }

    fn conversation(&self, conversation_id: &str) -> Result<ConversationRecord> {
        self.db
            .get_conversation(conversation_id)?
            .ok_or(Error::ConversationNotFound)
    }

    /// The conversation, provided `user_id` is one of its members.
    pub fn conversation_for_member(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ConversationRecord> {
        let conversation = self.conversation(conversation_id)?;
        if !conversation.has_member(user_id) {
            return Err(Error::NotConversationMember);
        }
        Ok(conversation)
    }

    /// Store a message and push it to the conversation.
    pub fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: Option<&str>,
        image: Option<&str>,
    ) -> Result<MessageRecord> {
        let text = text.filter(|t| !t.trim().is_empty());
        let image = image.filter(|i| !i.trim().is_empty());

        let conversation = self.conversation_for_member(conversation_id, sender_id)?;
        if text.is_none() && image.is_none() {
            return Err(Error::InvalidInput(
                "A message needs text or an image".to_string(),
            ));
        }

        let recipient = conversation
            .other_member(sender_id)
            .ok_or_else(|| Error::Internal("Conversation has no second member".to_string()))?;
        let recipient_online = self.relay.is_online(recipient);
        let status = if recipient_online {
            MessageStatus::Delivered
        } else {
            MessageStatus::Sent
        };

        let message = self
            .db
            .insert_message(conversation_id, sender_id, text, image, status)?;

        let reached = self.relay.broadcast_to_room(
            conversation_id,
            ServerEvent::ReceiveMessage(message.clone()),
            None,
        );
        if recipient_online && !self.relay.is_user_in_room(recipient, conversation_id) {
            self.relay
                .notify(recipient, ServerEvent::MessageDelivered(message.clone()));
        }

        tracing::debug!(
            conversation_id = conversation_id,
            message_id = message.id.as_str(),
            status = message.status.as_str(),
            room_connections = reached,
            "Message sent"
        );
        Ok(message)
    }

    /// Promote messages that waited for `user_id` to come online and tell
    /// their senders. Returns how many were promoted.
    pub fn deliver_pending(&self, user_id: &str) -> Result<usize> {
        let promoted = self.db.mark_delivered_to(user_id)?;
        for message in &promoted {
            self.relay
                .notify(&message.sender_id, ServerEvent::MessageDelivered(message.clone()));
        }
        if !promoted.is_empty() {
            tracing::debug!(
                user_id = user_id,
                count = promoted.len(),
                "Delivered waiting messages"
            );
        }
        Ok(promoted.len())
    }

    /// Mark the other member's messages as read and tell the room.
    /// Returns the IDs that changed.
    pub fn mark_read(&self, conversation_id: &str, reader_id: &str) -> Result<Vec<String>> {
        self.conversation_for_member(conversation_id, reader_id)?;
        let message_ids = self.db.mark_conversation_read(conversation_id, reader_id)?;

        if !message_ids.is_empty() {
            self.relay.broadcast_to_room(
                conversation_id,
                ServerEvent::MessagesRead {
                    conversation_id: conversation_id.to_string(),
                    reader_id: reader_id.to_string(),
                    message_ids: message_ids.clone(),
                },
                None,
            );
        }
        Ok(message_ids)
    }

    /// Relay a typing indicator to the rest of the room. Not persisted.
    pub fn typing(
        &self,
        conversation_id: &str,
        user_id: &str,
        from_conn: &str,
        active: bool,
    ) -> Result<()> {
        self.conversation_for_member(conversation_id, user_id)?;
        let event = if active {
            ServerEvent::Typing {
                conversation_id: conversation_id.to_string(),
                user_id: user_id.to_string(),
            }
        } else {
            ServerEvent::StopTyping {
                conversation_id: conversation_id.to_string(),
                user_id: user_id.to_string(),
            }
        };
        self.relay
            .broadcast_to_room(conversation_id, event, Some(from_conn));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingRelay;
    use crate::storage::database::tests::new_user;

    struct Fixture {
        svc: ChatService,
        db: Database,
        relay: Arc<RecordingRelay>,
        alice: String,
        bob: String,
        conversation: String,
    }

    fn fixture() -> Fixture {
        let db = Database::open(None).unwrap();
        let relay = Arc::new(RecordingRelay::default());
        let svc = ChatService::new(db.clone(), relay.clone());
        let alice = new_user(&db, "alice").id;
        let bob = new_user(&db, "bob").id;
        let conversation = svc.get_or_create_conversation(&alice, &bob).unwrap().id;
        Fixture {
            svc,
            db,
            relay,
            alice,
            bob,
            conversation,
        }
    }

    #[test]
    fn test_conversation_is_unordered_pair() {
        let f = fixture();
        let again = f.svc.get_or_create_conversation(&f.bob, &f.alice).unwrap();
        assert_eq!(again.id, f.conversation);
        assert_eq!(f.svc.list_conversations(&f.alice).unwrap().len(), 1);
    }

    #[test]
    fn test_conversation_with_self_or_ghost() {
        let f = fixture();
        assert!(matches!(
            f.svc.get_or_create_conversation(&f.alice, &f.alice),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            f.svc.get_or_create_conversation(&f.alice, "ghost"),
            Err(Error::UserNotFound)
        ));
    }

    #[test]
    fn test_offline_recipient_gets_sent_status() {
        let f = fixture();
        let msg = f
            .svc
            .send_message(&f.conversation, &f.alice, Some("hi"), None)
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(f.relay.direct.lock().is_empty());
        assert_eq!(f.relay.broadcasts.lock().len(), 1);
    }

    #[test]
    fn test_online_recipient_outside_room_gets_direct_delivery() {
        let f = fixture();
        f.relay.set_online(&f.bob);

        let msg = f
            .svc
            .send_message(&f.conversation, &f.alice, Some("hi"), None)
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Delivered);

        let direct = f.relay.direct_to(&f.bob);
        assert_eq!(direct, vec![ServerEvent::MessageDelivered(msg)]);
    }

    #[test]
    fn test_recipient_in_room_gets_broadcast_only() {
        let f = fixture();
        f.relay.join(&f.bob, &f.conversation);

        let msg = f
            .svc
            .send_message(&f.conversation, &f.alice, None, Some("/img/cat.png"))
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert!(f.relay.direct_to(&f.bob).is_empty());
        assert_eq!(
            f.relay.broadcasts.lock()[0],
            (f.conversation.clone(), ServerEvent::ReceiveMessage(msg))
        );
    }

    #[test]
    fn test_waiting_messages_delivered_when_recipient_arrives() {
        let f = fixture();
        f.relay.set_online(&f.alice);
        let waiting = f
            .svc
            .send_message(&f.conversation, &f.alice, Some("are you there?"), None)
            .unwrap();
        assert_eq!(waiting.status, MessageStatus::Sent);

        f.relay.set_online(&f.bob);
        assert_eq!(f.svc.deliver_pending(&f.bob).unwrap(), 1);

        let delivered = MessageRecord {
            status: MessageStatus::Delivered,
            ..waiting
        };
        assert_eq!(
            f.relay.direct_to(&f.alice),
            vec![ServerEvent::MessageDelivered(delivered.clone())]
        );
        assert_eq!(f.svc.list_messages(&f.conversation).unwrap(), vec![delivered]);

        assert_eq!(f.svc.deliver_pending(&f.bob).unwrap(), 0);
    }

    #[test]
    fn test_send_validation() {
        let f = fixture();
        let carol = new_user(&f.db, "carol").id;

        assert!(matches!(
            f.svc.send_message("missing", &f.alice, Some("hi"), None),
            Err(Error::ConversationNotFound)
        ));
        assert!(matches!(
            f.svc.send_message(&f.conversation, &carol, Some("hi"), None),
            Err(Error::NotConversationMember)
        ));
        assert!(matches!(
            f.svc.send_message(&f.conversation, &f.alice, Some("  "), None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_messages_listed_in_send_order() {
        let f = fixture();
        for i in 0..20 {
            let sender = if i % 2 == 0 { &f.alice } else { &f.bob };
            f.svc
                .send_message(&f.conversation, sender, Some(&format!("m{}", i)), None)
                .unwrap();
        }

        let texts: Vec<String> = f
            .svc
            .list_messages(&f.conversation)
            .unwrap()
            .into_iter()
            .filter_map(|m| m.text)
            .collect();
        let expected: Vec<String> = (0..20).map(|i| format!("m{}", i)).collect();
        assert_eq!(texts, expected);

        assert!(matches!(
            f.svc.list_messages("missing"),
            Err(Error::ConversationNotFound)
        ));
    }

    #[test]
    fn test_mark_read_only_touches_other_members_messages() {
        let f = fixture();
        let from_alice = f
            .svc
            .send_message(&f.conversation, &f.alice, Some("one"), None)
            .unwrap();
        let from_bob = f
            .svc
            .send_message(&f.conversation, &f.bob, Some("two"), None)
            .unwrap();

        let changed = f.svc.mark_read(&f.conversation, &f.bob).unwrap();
        assert_eq!(changed, vec![from_alice.id.clone()]);

        assert_eq!(
            f.db.get_message(&from_alice.id).unwrap().unwrap().status,
            MessageStatus::Read
        );
        assert_eq!(
            f.db.get_message(&from_bob.id).unwrap().unwrap().status,
            MessageStatus::Sent
        );
        assert!(matches!(
            f.relay.broadcasts.lock().last(),
            Some((_, ServerEvent::MessagesRead { .. }))
        ));

        // nothing left to mark
        assert!(f.svc.mark_read(&f.conversation, &f.bob).unwrap().is_empty());
    }

    #[test]
    fn test_typing_requires_membership() {
        let f = fixture();
        let carol = new_user(&f.db, "carol").id;

        f.svc.typing(&f.conversation, &f.alice, "conn-a", true).unwrap();
        f.svc.typing(&f.conversation, &f.alice, "conn-a", false).unwrap();
        assert!(matches!(
            f.svc.typing(&f.conversation, &carol, "conn-c", true),
            Err(Error::NotConversationMember)
        ));

        let broadcasts = f.relay.broadcasts.lock();
        assert!(matches!(broadcasts[0].1, ServerEvent::Typing { .. }));
        assert!(matches!(broadcasts[1].1, ServerEvent::StopTyping { .. }));
    }
}
