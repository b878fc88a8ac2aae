//! WebSocket connection handler.
//!
//! Manages individual WebSocket connections: parsing client events, routing
//! them through the services, and streaming server events back.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::state::AppState;

/// Handle a single WebSocket connection.
///
/// This function runs for the lifetime of the connection:
/// 1. Registers an anonymous connection and spawns its sender task
/// 2. Processes incoming events; everything but `ping` waits for `user-login`
/// 3. Cleans up rooms and presence when the socket closes
pub async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // ── Step 1: Register Connection ───────────────────────────────────────

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn_id = state.gateway.open_connection(tx);

    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize server event: {}", e);
                }
            }
        }
    });

    // ── Step 2: Process Events ────────────────────────────────────────────

    let mut user_id: Option<String> = None;

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if let Err(e) = handle_client_event(&state, &conn_id, &mut user_id, event) {
                        tracing::debug!(
                            conn_id = conn_id.as_str(),
                            error = %e,
                            "Client event rejected"
                        );
                        state
                            .gateway
                            .send_to_connection(&conn_id, ServerEvent::error(e.public_message()));
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        conn_id = conn_id.as_str(),
                        error = %e,
                        "Failed to parse client event"
                    );
                    state.gateway.send_to_connection(
                        &conn_id,
                        ServerEvent::error(format!("Invalid event format: {}", e)),
                    );
                }
            },
            Ok(Message::Close(_)) => {
                tracing::debug!(conn_id = conn_id.as_str(), "Client sent close frame");
                break;
            }
            Err(e) => {
                tracing::warn!(
                    conn_id = conn_id.as_str(),
                    error = %e,
                    "WebSocket error"
                );
                break;
            }
            _ => {} // Binary, Ping, Pong: axum answers pings itself
        }
    }

    // ── Step 3: Cleanup ───────────────────────────────────────────────────

    state.gateway.close_connection(&conn_id);
    sender_task.abort();
}

/// Handle a parsed client event. Errors are reported back to the client.
fn handle_client_event(
    state: &AppState,
    conn_id: &str,
    user_id: &mut Option<String>,
    event: ClientEvent,
) -> Result<()> {
    let current = match (user_id.clone(), &event) {
        (_, ClientEvent::Ping) => {
            state.gateway.send_to_connection(conn_id, ServerEvent::Pong);
            return Ok(());
        }
        (None, ClientEvent::UserLogin { user_id: claimed, token }) => {
            let user = state.accounts.authenticate(claimed, token)?;
            if !state.gateway.login(conn_id, &user.id) {
                return Err(Error::InvalidInput("Connection already logged in".to_string()));
            }
            state.gateway.send_to_connection(
                conn_id,
                ServerEvent::LoggedIn {
                    user_id: user.id.clone(),
                },
            );
            if let Err(e) = state.chat.deliver_pending(&user.id) {
                tracing::warn!(user_id = user.id.as_str(), error = %e, "Pending delivery failed");
            }
            *user_id = Some(user.id);
            return Ok(());
        }
        (Some(_), ClientEvent::UserLogin { .. }) => {
            return Err(Error::InvalidInput("Already logged in".to_string()));
        }
        (None, other) => {
            return Err(Error::InvalidInput(format!(
                "Must log in before sending '{}'",
                other.name()
            )));
        }
        (Some(current), _) => current,
    };

    match event {
        ClientEvent::SendFriendRequest { to_user_id } => {
            state.friends.send_request(&current, &to_user_id)?;
        }

        ClientEvent::AcceptFriendRequest { from_user_id } => {
            state.friends.accept_from(&current, &from_user_id)?;
        }

        ClientEvent::JoinChat { conversation_id } => {
            state
                .chat
                .conversation_for_member(&conversation_id, &current)?;
            state.gateway.join_room(conn_id, &conversation_id);
            state
                .gateway
                .send_to_connection(conn_id, ServerEvent::JoinedChat { conversation_id });
        }

        ClientEvent::LeaveChat { conversation_id } => {
            state.gateway.leave_room(conn_id, &conversation_id);
        }

        ClientEvent::Typing { conversation_id } => {
            state.chat.typing(&conversation_id, &current, conn_id, true)?;
        }

        ClientEvent::StopTyping { conversation_id } => {
            state
                .chat
                .typing(&conversation_id, &current, conn_id, false)?;
        }

        ClientEvent::SendMessage {
            conversation_id,
            text,
            image,
        } => {
            state.chat.send_message(
                &conversation_id,
                &current,
                text.as_deref(),
                image.as_deref(),
            )?;
        }

        ClientEvent::MarkMessagesRead { conversation_id } => {
            state.chat.mark_read(&conversation_id, &current)?;
        }

        // Handled above.
        ClientEvent::UserLogin { .. } | ClientEvent::Ping => {}
    }

    Ok(())
}
