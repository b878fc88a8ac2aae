//! Presence: which connection currently speaks for a user.
//!
//! Presence is process-local and never persisted. A user maps to at most
//! one connection; a second login replaces the first (last writer wins).

use std::sync::Arc;

use dashmap::DashMap;

/// Identifier of one WebSocket connection.
pub type ConnectionId = String;

/// User → connection mapping.
pub trait PresenceService: Send + Sync {
    /// Record `conn_id` as the user's current connection.
    fn set(&self, user_id: &str, conn_id: &str);

    /// The user's current connection, if online.
    fn get(&self, user_id: &str) -> Option<ConnectionId>;

    /// Remove the user's entry only if it still points at `conn_id`.
    /// Returns true if an entry was removed.
    fn clear_if(&self, user_id: &str, conn_id: &str) -> bool;

    /// Number of users with a presence entry.
    fn online_count(&self) -> usize;

    fn is_online(&self, user_id: &str) -> bool {
        self.get(user_id).is_some()
    }
}

/// In-memory presence backed by a `DashMap`.
#[derive(Clone, Default)]
pub struct InMemoryPresence {
    entries: Arc<DashMap<String, ConnectionId>>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresenceService for InMemoryPresence {
    fn set(&self, user_id: &str, conn_id: &str) {
        if let Some(previous) = self
            .entries
            .insert(user_id.to_string(), conn_id.to_string())
        {
            if previous != conn_id {
                tracing::debug!(
                    user_id = user_id,
                    previous = previous.as_str(),
                    conn_id = conn_id,
                    "Presence replaced by newer connection"
                );
            }
        }
    }

    fn get(&self, user_id: &str) -> Option<ConnectionId> {
        self.entries.get(user_id).map(|entry| entry.value().clone())
    }

    fn clear_if(&self, user_id: &str, conn_id: &str) -> bool {
        self.entries
            .remove_if(user_id, |_, current| current == conn_id)
            .is_some()
    }

    fn online_count(&self) -> usize {
        self.entries.len()
    }
}
