//! Shared application state handed to every HTTP and WebSocket handler.

use std::sync::Arc;

use crate::accounts::AccountService;
use crate::auth::TokenSigner;
use crate::chat::ChatService;
use crate::config::ServerConfig;
use crate::friends::FriendService;
use crate::gateway::Gateway;
use crate::notifier::{LogMailer, ResetMailer};
use crate::presence::InMemoryPresence;
use crate::storage::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub accounts: AccountService,
    pub friends: FriendService,
    pub chat: ChatService,
    pub gateway: Gateway,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire the services around `db`. Reset tokens go to the server log.
    pub fn new(db: Database, config: ServerConfig) -> Self {
        Self::with_mailer(db, config, Arc::new(LogMailer))
    }

    /// Wire the services around `db`. The gateway is both the friends
    /// notifier and the chat relay.
    pub fn with_mailer(db: Database, config: ServerConfig, mailer: Arc<dyn ResetMailer>) -> Self {
        let signer = match config.token_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                TokenSigner::new(secret.as_bytes().to_vec(), config.token_ttl_secs)
            }
            _ => {
                tracing::warn!(
                    "No token secret configured; using a random one. Sessions end on restart."
                );
                TokenSigner::with_random_secret(config.token_ttl_secs)
            }
        };

        let gateway = Gateway::new(Arc::new(InMemoryPresence::new()));
        let relay = Arc::new(gateway.clone());

        Self {
            accounts: AccountService::new(db.clone(), signer, mailer, config.reset_ttl_secs),
            friends: FriendService::new(db.clone(), relay.clone()),
            chat: ChatService::new(db.clone(), relay),
            gateway,
            db,
            config: Arc::new(config),
        }
    }

    /// Periodic housekeeping. Returns the number of reset tokens cleared.
    pub fn cleanup_expired(&self) -> usize {
        match self.accounts.purge_expired_reset_tokens() {
            Ok(0) => 0,
            Ok(purged) => {
                tracing::info!(purged = purged, "Cleared expired reset tokens");
                purged
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reset token cleanup failed");
                0
            }
        }
    }
}
