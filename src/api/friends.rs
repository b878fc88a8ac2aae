//! Friend-graph REST handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::extract::{ApiJson, ApiQuery};
use crate::error::{Error, Result};
use crate::state::AppState;

/// GET /search-users?query=&userId=
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub user_id: Option<String>,
}

/// POST /send-friend-request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestBody {
    pub from_user_id: String,
    pub to_user_id: String,
}

/// POST /respond-friend-request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondBody {
    pub request_id: String,
    pub status: String,
}

/// POST /unfriend
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfriendBody {
    pub user_id: String,
    pub friend_id: String,
}

pub async fn search_users(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<impl IntoResponse> {
    let user_id = params
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::InvalidInput("userId is required".to_string()))?;
    Ok(Json(state.friends.search_users(&params.query, &user_id)?))
}

pub async fn send_friend_request(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendRequestBody>,
) -> Result<impl IntoResponse> {
    let request = state
        .friends
        .send_request(&body.from_user_id, &body.to_user_id)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Friend request sent successfully", "request": request })),
    ))
}

pub async fn respond_friend_request(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RespondBody>,
) -> Result<impl IntoResponse> {
    let request = state.friends.respond(&body.request_id, &body.status)?;
    Ok(Json(json!({
        "message": format!("Friend request {}", request.status.as_str()),
        "request": request,
    })))
}

pub async fn pending_friend_requests(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.friends.list_pending(&user_id)?))
}

pub async fn friend_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.friends.recommend(&user_id)?))
}

pub async fn friend_list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.friends.friend_list(&user_id)?))
}

pub async fn unfriend(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UnfriendBody>,
) -> Result<impl IntoResponse> {
    state.friends.unfriend(&body.user_id, &body.friend_id)?;
    Ok(Json(json!({ "message": "Unfriended successfully" })))
}
