//! Account REST handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::blocking;
use super::extract::ApiJson;
use crate::accounts::SignupRequest;
use crate::error::Result;
use crate::state::AppState;
use crate::storage::ProfileUpdate;

// ── Request Types ────────────────────────────────────────────────────────────

/// POST /login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /change-password/:userId
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /forgot-password
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// POST /reset-password
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse> {
    let user = blocking(move || state.accounts.signup(req)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "user": user })),
    ))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let session = blocking(move || state.accounts.login(&req.username, &req.password)).await?;
    Ok(Json(session))
}

/// GET /user/:userId
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.accounts.profile(&user_id)?))
}

/// PUT /edit-profile/:userId
pub async fn edit_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<impl IntoResponse> {
    let user = state.accounts.edit_profile(&user_id, &update)?;
    Ok(Json(json!({ "message": "Profile updated successfully", "user": user })))
}

/// POST /change-password/:userId
pub async fn change_password(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    blocking(move || {
        state
            .accounts
            .change_password(&user_id, &req.current_password, &req.new_password)
    })
    .await?;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// POST /forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse> {
    state.accounts.forgot_password(&req.email)?;
    Ok(Json(json!({ "message": "Password reset token sent" })))
}

/// POST /reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse> {
    blocking(move || state.accounts.reset_password(&req.token, &req.new_password)).await?;
    Ok(Json(json!({ "message": "Password has been reset successfully" })))
}

/// DELETE /delete-profile/:userId
pub async fn delete_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.accounts.delete(&user_id)?;
    Ok(Json(json!({ "message": "Profile deleted successfully" })))
}
