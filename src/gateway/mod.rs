//! Realtime gateway: the `/ws` endpoint, per-connection event loop, and the
//! connection/room/presence state behind the [`Notifier`](crate::notifier::Notifier)
//! and [`ChatRelay`](crate::notifier::ChatRelay) traits.

mod handler;
mod state;

pub use handler::handle_websocket;
pub use state::{ClientSender, Gateway};
