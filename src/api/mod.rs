//! HTTP surface: REST routes, the `/ws` upgrade, health and stats.

mod accounts;
mod chat;
mod extract;
mod friends;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::gateway;
use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        // Accounts
        .route("/signup", post(accounts::signup))
        .route("/login", post(accounts::login))
        .route("/user/:user_id", get(accounts::get_profile))
        .route("/edit-profile/:user_id", put(accounts::edit_profile))
        .route("/change-password/:user_id", post(accounts::change_password))
        .route("/forgot-password", post(accounts::forgot_password))
        .route("/reset-password", post(accounts::reset_password))
        .route("/delete-profile/:user_id", delete(accounts::delete_profile))
        // Friends
        .route("/search-users", get(friends::search_users))
        .route("/send-friend-request", post(friends::send_friend_request))
        .route("/respond-friend-request", post(friends::respond_friend_request))
        .route(
            "/pending-friend-requests/:user_id",
            get(friends::pending_friend_requests),
        )
        .route(
            "/friend-recommendations/:user_id",
            get(friends::friend_recommendations),
        )
        .route("/friend-list/:user_id", get(friends::friend_list))
        .route("/unfriend", post(friends::unfriend))
        // Chat
        .route("/api/conversations", post(chat::create_conversation))
        .route("/api/conversations/:user_id", get(chat::list_conversations))
        .route("/api/messages", post(chat::send_message))
        .route("/api/messages/:conversation_id", get(chat::list_messages))
        // Realtime + ambient
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = origin.as_str(), "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Run password hashing and other CPU-heavy work off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("Blocking task failed: {}", e)))?
}

// ── Ambient Handlers ─────────────────────────────────────────────────────────

/// WebSocket upgrade handler for client connections.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| gateway::handle_websocket(socket, state))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "hearth",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Statistics endpoint.
async fn stats_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(json!({
        "online_users": state.gateway.online_count(),
        "open_connections": state.gateway.connection_count(),
        "active_rooms": state.gateway.room_count(),
        "users": state.db.user_count()?,
        "conversations": state.db.conversation_count()?,
    })))
}
