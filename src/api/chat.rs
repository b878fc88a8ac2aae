//! Conversation and message REST handlers.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::extract::ApiJson;
use crate::error::Result;
use crate::state::AppState;

/// POST /api/conversations
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationBody {
    pub sender_id: String,
    pub receiver_id: String,
}

/// POST /api/messages
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageBody {
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewConversationBody>,
) -> Result<impl IntoResponse> {
    Ok(Json(
        state
            .chat
            .get_or_create_conversation(&body.sender_id, &body.receiver_id)?,
    ))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.chat.list_conversations(&user_id)?))
}

pub async fn send_message(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewMessageBody>,
) -> Result<impl IntoResponse> {
    let message = state.chat.send_message(
        &body.conversation_id,
        &body.sender_id,
        body.text.as_deref(),
        body.image.as_deref(),
    )?;
    Ok(Json(message))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.chat.list_messages(&conversation_id)?))
}
