//! # Hearth
//!
//! Social networking server: accounts, a friend-request state machine with
//! friend-of-friend recommendations, and realtime one-to-one chat with
//! typing indicators and read receipts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                HEARTH                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   HTTP (api)                          WebSocket (gateway)               │
//! │   REST routes                         /ws event loop                    │
//! │        │                                   │                            │
//! │        └──────────────┬────────────────────┘                            │
//! │                       ▼                                                 │
//! │   ┌───────────────────────────────────────────────┐                     │
//! │   │  accounts        friends           chat       │   services          │
//! │   └───────┬───────────────┬─────────────────┬─────┘                     │
//! │           │               │ Notifier        │ ChatRelay                 │
//! │           │               ▼                 ▼                           │
//! │           │        ┌──────────────────────────────┐                     │
//! │           │        │ Gateway: connections, rooms, │                     │
//! │           │        │ presence                     │                     │
//! │           │        └──────────────────────────────┘                     │
//! │           ▼                                                             │
//! │   ┌───────────────────────────────────────────────┐                     │
//! │   │  storage: SQLite (users, friendships,         │                     │
//! │   │  friend_requests, conversations, messages)    │                     │
//! │   └───────────────────────────────────────────────┘                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod accounts;
pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod friends;
pub mod gateway;
pub mod notifier;
pub mod presence;
pub mod protocol;
pub mod state;
pub mod storage;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use state::AppState;
pub use storage::Database;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
