//! Realtime protocol event definitions.
//!
//! Every WebSocket frame is a JSON object `{"event": "<name>", "data": {...}}`
//! with kebab-case event names and camelCase data fields. Events without a
//! payload (`ping`, `pong`) omit `data`.

use serde::{Deserialize, Serialize};

use crate::storage::{MessageRecord, PublicProfile};

// ── Client → Server ───────────────────────────────────────────────────────────

/// Events sent from a client to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Authenticate this connection. Must precede everything except `ping`.
    #[serde(rename_all = "camelCase")]
    UserLogin { user_id: String, token: String },

    #[serde(rename_all = "camelCase")]
    SendFriendRequest { to_user_id: String },

    /// Accept the pending request `from_user_id` sent to the logged-in user.
    #[serde(rename_all = "camelCase")]
    AcceptFriendRequest { from_user_id: String },

    /// Start receiving room events for a conversation. Members only.
    #[serde(rename_all = "camelCase")]
    JoinChat { conversation_id: String },

    #[serde(rename_all = "camelCase")]
    LeaveChat { conversation_id: String },

    #[serde(rename_all = "camelCase")]
    Typing { conversation_id: String },

    #[serde(rename_all = "camelCase")]
    StopTyping { conversation_id: String },

    #[serde(rename_all = "camelCase")]
    SendMessage {
        conversation_id: String,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        image: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    MarkMessagesRead { conversation_id: String },

    /// Keepalive.
    Ping,
}

impl ClientEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::UserLogin { .. } => "user-login",
            ClientEvent::SendFriendRequest { .. } => "send-friend-request",
            ClientEvent::AcceptFriendRequest { .. } => "accept-friend-request",
            ClientEvent::JoinChat { .. } => "join-chat",
            ClientEvent::LeaveChat { .. } => "leave-chat",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::StopTyping { .. } => "stop-typing",
            ClientEvent::SendMessage { .. } => "send-message",
            ClientEvent::MarkMessagesRead { .. } => "mark-messages-read",
            ClientEvent::Ping => "ping",
        }
    }
}

// ── Server → Client ───────────────────────────────────────────────────────────

/// Events sent from the gateway to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Acknowledgement of `user-login`.
    #[serde(rename_all = "camelCase")]
    LoggedIn { user_id: String },

    /// Someone sent the recipient a friend request.
    #[serde(rename_all = "camelCase")]
    NewFriendRequest {
        request_id: String,
        from: PublicProfile,
    },

    /// A request the recipient sent was accepted.
    #[serde(rename_all = "camelCase")]
    FriendRequestAccepted { request_id: String, by: PublicProfile },

    #[serde(rename_all = "camelCase")]
    JoinedChat { conversation_id: String },

    #[serde(rename_all = "camelCase")]
    Typing {
        conversation_id: String,
        user_id: String,
    },

    #[serde(rename_all = "camelCase")]
    StopTyping {
        conversation_id: String,
        user_id: String,
    },

    /// A new message, broadcast to the conversation's room.
    ReceiveMessage(MessageRecord),

    /// A message reached its recipient. Sent to a recipient who is online
    /// but not in the room, and to the sender when a waiting message is
    /// delivered at the recipient's login.
    MessageDelivered(MessageRecord),

    /// Messages in a conversation were read by `reader_id`.
    #[serde(rename_all = "camelCase")]
    MessagesRead {
        conversation_id: String,
        reader_id: String,
        message_ids: Vec<String>,
    },

    Pong,

    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
