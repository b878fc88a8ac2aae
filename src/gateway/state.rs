//! Gateway state: open connections, conversation rooms and presence.
//!
//! All maps are concurrent (DashMap). A connection is anonymous until it
//! logs in; only logged-in connections appear in presence or rooms.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::notifier::{ChatRelay, Notifier};
use crate::presence::{ConnectionId, PresenceService};
use crate::protocol::ServerEvent;

/// A connected client's outbound channel.
pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;

struct Connection {
    sender: ClientSender,
    user_id: Option<String>,
}

/// Shared realtime state.
#[derive(Clone)]
pub struct Gateway {
    /// Connection ID → outbound channel and logged-in user.
    connections: Arc<DashMap<ConnectionId, Connection>>,

    /// Conversation ID → connections joined to its room.
    rooms: Arc<DashMap<String, HashSet<ConnectionId>>>,

    presence: Arc<dyn PresenceService>,
}

impl Gateway {
    pub fn new(presence: Arc<dyn PresenceService>) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            rooms: Arc::new(DashMap::new()),
            presence,
        }
    }

    // ── Connection Management ─────────────────────────────────────────────

    /// Register a new anonymous connection and return its ID.
    pub fn open_connection(&self, sender: ClientSender) -> ConnectionId {
        let conn_id = Uuid::new_v4().to_string();
        self.connections.insert(
            conn_id.clone(),
            Connection {
                sender,
                user_id: None,
            },
        );
        tracing::debug!(conn_id = conn_id.as_str(), "Connection opened");
        conn_id
    }

    /// Bind a connection to a user and make it the user's presence.
    /// Returns false if the connection is unknown or already logged in.
    pub fn login(&self, conn_id: &str, user_id: &str) -> bool {
        let Some(mut conn) = self.connections.get_mut(conn_id) else {
            return false;
        };
        if conn.user_id.is_some() {
            return false;
        }
        conn.user_id = Some(user_id.to_string());
        drop(conn);

        self.presence.set(user_id, conn_id);
        tracing::info!(user_id = user_id, conn_id = conn_id, "User online");
        true
    }

    /// The user a connection is logged in as.
    pub fn user_of(&self, conn_id: &str) -> Option<String> {
        self.connections
            .get(conn_id)
            .and_then(|conn| conn.user_id.clone())
    }

    /// Tear down a connection: leave every room, drop the sender and clear
    /// presence if it still points here.
    pub fn close_connection(&self, conn_id: &str) {
        self.rooms.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });

        if let Some((_, conn)) = self.connections.remove(conn_id) {
            if let Some(user_id) = conn.user_id {
                let cleared = self.presence.clear_if(&user_id, conn_id);
                tracing::info!(
                    user_id = user_id.as_str(),
                    conn_id = conn_id,
                    presence_cleared = cleared,
                    "User disconnected"
                );
            }
        }
    }

    /// Send an event to one connection. Returns true if queued.
    pub fn send_to_connection(&self, conn_id: &str, event: ServerEvent) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(event).is_ok(),
            None => false,
        }
    }

    // ── Rooms ─────────────────────────────────────────────────────────────

    pub fn join_room(&self, conn_id: &str, conversation_id: &str) {
        self.rooms
            .entry(conversation_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
        tracing::debug!(conn_id = conn_id, conversation_id = conversation_id, "Joined room");
    }

    /// Returns true if the connection was in the room.
    pub fn leave_room(&self, conn_id: &str, conversation_id: &str) -> bool {
        let removed = self
            .rooms
            .get_mut(conversation_id)
            .map(|mut members| members.remove(conn_id))
            .unwrap_or(false);
        self.rooms
            .remove_if(conversation_id, |_, members| members.is_empty());
        removed
    }

    // ── Stats ─────────────────────────────────────────────────────────────

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn online_count(&self) -> usize {
        self.presence.online_count()
    }
}

impl Notifier for Gateway {
    fn notify(&self, user_id: &str, event: ServerEvent) -> bool {
        match self.presence.get(user_id) {
            Some(conn_id) => self.send_to_connection(&conn_id, event),
            None => false,
        }
    }
}

impl ChatRelay for Gateway {
    fn broadcast_to_room(
        &self,
        conversation_id: &str,
        event: ServerEvent,
        except_conn: Option<&str>,
    ) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.get(conversation_id) {
            Some(members) => members.iter().cloned().collect(),
            None => return 0,
        };

        members
            .iter()
            .filter(|conn_id| Some(conn_id.as_str()) != except_conn)
            .filter(|conn_id| self.send_to_connection(conn_id, event.clone()))
            .count()
    }

    fn is_user_in_room(&self, user_id: &str, conversation_id: &str) -> bool {
        let Some(conn_id) = self.presence.get(user_id) else {
            return false;
        };
        self.rooms
            .get(conversation_id)
            .map(|members| members.contains(&conn_id))
            .unwrap_or(false)
    }

    fn is_online(&self, user_id: &str) -> bool {
        self.presence.is_online(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::InMemoryPresence;

    fn gateway() -> Gateway {
        Gateway::new(Arc::new(InMemoryPresence::new()))
    }

    fn connect(gw: &Gateway) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (gw.open_connection(tx), rx)
    }

    #[test]
    fn test_login_sets_presence_once() {
        let gw = gateway();
        let (conn, _rx) = connect(&gw);

        assert!(!gw.is_online("alice"));
        assert!(gw.login(&conn, "alice"));
        assert!(gw.is_online("alice"));
        assert_eq!(gw.user_of(&conn).as_deref(), Some("alice"));

        assert!(!gw.login(&conn, "bob"));
        assert_eq!(gw.user_of(&conn).as_deref(), Some("alice"));
        assert!(!gw.login("no-such-conn", "bob"));
    }

    #[test]
    fn test_notify_reaches_current_connection() {
        let gw = gateway();
        let (conn, mut rx) = connect(&gw);
        gw.login(&conn, "alice");

        assert!(gw.notify("alice", ServerEvent::Pong));
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::Pong);
        assert!(!gw.notify("bob", ServerEvent::Pong));
    }

    #[test]
    fn test_broadcast_skips_sender_connection() {
        let gw = gateway();
        let (a, mut rx_a) = connect(&gw);
        let (b, mut rx_b) = connect(&gw);
        gw.login(&a, "alice");
        gw.login(&b, "bob");
        gw.join_room(&a, "c1");
        gw.join_room(&b, "c1");

        let reached = gw.broadcast_to_room("c1", ServerEvent::Pong, Some(&a));
        assert_eq!(reached, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), ServerEvent::Pong);

        assert_eq!(gw.broadcast_to_room("c1", ServerEvent::Pong, None), 2);
        assert_eq!(gw.broadcast_to_room("other", ServerEvent::Pong, None), 0);
    }

    #[test]
    fn test_room_membership_follows_presence() {
        let gw = gateway();
        let (a, _rx) = connect(&gw);
        gw.login(&a, "alice");

        assert!(!gw.is_user_in_room("alice", "c1"));
        gw.join_room(&a, "c1");
        assert!(gw.is_user_in_room("alice", "c1"));
        assert_eq!(gw.room_count(), 1);

        assert!(gw.leave_room(&a, "c1"));
        assert!(!gw.is_user_in_room("alice", "c1"));
        assert_eq!(gw.room_count(), 0);
        assert!(!gw.leave_room(&a, "c1"));
    }

    #[test]
    fn test_close_clears_rooms_and_presence() {
        let gw = gateway();
        let (a, _rx) = connect(&gw);
        gw.login(&a, "alice");
        gw.join_room(&a, "c1");

        gw.close_connection(&a);
        assert!(!gw.is_online("alice"));
        assert_eq!(gw.room_count(), 0);
        assert_eq!(gw.connection_count(), 0);
    }

    #[test]
    fn test_stale_connection_close_keeps_newer_presence() {
        let gw = gateway();
        let (old, _rx_old) = connect(&gw);
        let (new, _rx_new) = connect(&gw);
        gw.login(&old, "alice");
        gw.login(&new, "alice");

        gw.close_connection(&old);
        assert!(gw.is_online("alice"));
        assert_eq!(gw.online_count(), 1);

        gw.close_connection(&new);
        assert!(!gw.is_online("alice"));
    }
}
