//! Seams between the services and the outside world.
//!
//! Services push events through these traits and never see sockets. The
//! gateway implements [`Notifier`] and [`ChatRelay`]; tests substitute
//! [`RecordingRelay`]. Password-reset tokens leave through [`ResetMailer`].

use crate::protocol::ServerEvent;

/// Fire-and-forget delivery to a single user.
pub trait Notifier: Send + Sync {
    /// Deliver `event` to the user's current connection. Returns false if
    /// the user is offline; the event is dropped.
    fn notify(&self, user_id: &str, event: ServerEvent) -> bool;
}

/// Conversation rooms on top of [`Notifier`].
pub trait ChatRelay: Notifier {
    /// Send `event` to every connection joined to the conversation's room,
    /// skipping `except_conn`. Returns the number of connections reached.
    fn broadcast_to_room(
        &self,
        conversation_id: &str,
        event: ServerEvent,
        except_conn: Option<&str>,
    ) -> usize;

    /// Whether the user's current connection has joined the room.
    fn is_user_in_room(&self, user_id: &str, conversation_id: &str) -> bool;

    /// Whether the user has a presence entry.
    fn is_online(&self, user_id: &str) -> bool;
}

/// Out-of-band delivery of password-reset tokens to the account's owner.
pub trait ResetMailer: Send + Sync {
    fn send_reset_token(&self, email: &str, user_id: &str, token: &str);
}

/// Writes reset tokens to the server log. Used when no mail transport is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl ResetMailer for LogMailer {
    fn send_reset_token(&self, email: &str, user_id: &str, token: &str) {
        tracing::info!(
            email = email,
            user_id = user_id,
            token = token,
            "Password reset token issued (no mail transport configured)"
        );
    }
}

#[cfg(test)]
pub(crate) use recording::{RecordingMailer, RecordingRelay};

#[cfg(test)]
mod recording {
    use std::collections::{HashMap, HashSet};

    use parking_lot::Mutex;

    use super::*;

    /// Records every event and keeps a scripted view of who is online and
    /// who sits in which room.
    #[derive(Default)]
    pub(crate) struct RecordingRelay {
        pub online: Mutex<HashSet<String>>,
        pub rooms: Mutex<HashMap<String, HashSet<String>>>,
        pub direct: Mutex<Vec<(String, ServerEvent)>>,
        pub broadcasts: Mutex<Vec<(String, ServerEvent)>>,
    }

    impl RecordingRelay {
        pub fn set_online(&self, user_id: &str) {
            self.online.lock().insert(user_id.to_string());
        }

        pub fn join(&self, user_id: &str, conversation_id: &str) {
            self.set_online(user_id);
            self.rooms
                .lock()
                .entry(conversation_id.to_string())
                .or_default()
                .insert(user_id.to_string());
        }

        pub fn direct_to(&self, user_id: &str) -> Vec<ServerEvent> {
            self.direct
                .lock()
                .iter()
                .filter(|(to, _)| to == user_id)
                .map(|(_, event)| event.clone())
                .collect()
        }
    }

    /// Keeps every reset token handed to it, keyed by email.
    #[derive(Default)]
    pub(crate) struct RecordingMailer {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        pub fn last_token_for(&self, email: &str) -> Option<String> {
            self.sent
                .lock()
                .iter()
                .rev()
                .find(|(to, _)| to == email)
                .map(|(_, token)| token.clone())
        }
    }

    impl ResetMailer for RecordingMailer {
        fn send_reset_token(&self, email: &str, _user_id: &str, token: &str) {
            self.sent.lock().push((email.to_string(), token.to_string()));
        }
    }

    impl Notifier for RecordingRelay {
        fn notify(&self, user_id: &str, event: ServerEvent) -> bool {
            if !self.online.lock().contains(user_id) {
                return false;
            }
            self.direct.lock().push((user_id.to_string(), event));
            true
        }
    }

    impl ChatRelay for RecordingRelay {
        fn broadcast_to_room(
            &self,
            conversation_id: &str,
            event: ServerEvent,
            _except_conn: Option<&str>,
        ) -> usize {
            let reached = self
                .rooms
                .lock()
                .get(conversation_id)
                .map(|members| members.len())
                .unwrap_or(0);
            self.broadcasts
                .lock()
                .push((conversation_id.to_string(), event));
            reached
        }

        fn is_user_in_room(&self, user_id: &str, conversation_id: &str) -> bool {
            self.rooms
                .lock()
                .get(conversation_id)
                .map(|members| members.contains(user_id))
                .unwrap_or(false)
        }

        fn is_online(&self, user_id: &str) -> bool {
            self.online.lock().contains(user_id)
        }
    }
}
