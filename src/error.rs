//! # Error Handling
//!
//! Error type shared by the stores, services and HTTP handlers.
//!
//! ## Error Categories
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ERROR → HTTP STATUS                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Validation (400)          Not Found (404)          Internal (500)      │
//! │  ─────────────────         ───────────────          ──────────────      │
//! │  InvalidInput              UserNotFound             Database            │
//! │  WeakPassword              RequestNotFound          PasswordHash        │
//! │  UsernameOrEmailTaken      ConversationNotFound     Internal            │
//! │  EmailTaken                                                             │
//! │  InvalidCredentials        Unauthorized (401)                           │
//! │  IncorrectPassword         ──────────────────                           │
//! │  InvalidResetToken         InvalidToken                                 │
//! │  CannotAddSelf                                                          │
//! │  AlreadyFriends                                                         │
//! │  RequestExists                                                          │
//! │  RequestNotPending                                                      │
//! │  InvalidDecision                                                        │
//! │  NotConversationMember                                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal errors are logged with their detail and reported to the client
//! as a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for Hearth operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Hearth
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// A request field is missing or malformed
    #[error("{0}")]
    InvalidInput(String),

    /// Password does not satisfy the password policy
    #[error(
        "Password must be at least 8 characters long, contain at least one uppercase letter, \
         one lowercase letter, one number, and one special character (@$!%*?&)."
    )]
    WeakPassword,

    /// Signup collided with an existing username or email
    #[error("Username or email already exists")]
    UsernameOrEmailTaken,

    /// Profile edit collided with another account's email
    #[error("Email is already in use")]
    EmailTaken,

    /// Login failed
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Change-password with a wrong current password
    #[error("Current password is incorrect")]
    IncorrectPassword,

    /// Reset token unknown or expired
    #[error("Password reset token is invalid or has expired")]
    InvalidResetToken,

    /// Friend request to yourself
    #[error("You cannot send a friend request to yourself.")]
    CannotAddSelf,

    /// Friend request between users who are already friends
    #[error("You are already friends with this user.")]
    AlreadyFriends,

    /// A request already exists between the pair
    #[error("Friend request already sent or received.")]
    RequestExists,

    /// Response to a request that already reached a terminal state
    #[error("Friend request has already been answered.")]
    RequestNotPending,

    /// Response status outside {accepted, rejected}
    #[error("Invalid friend request status: {0}")]
    InvalidDecision(String),

    /// Acting on a conversation the user does not belong to
    #[error("User is not a member of this conversation")]
    NotConversationMember,

    // ========================================================================
    // Authentication Errors
    // ========================================================================

    /// Session token missing, malformed, forged or expired
    #[error("Invalid or expired session token")]
    InvalidToken,

    // ========================================================================
    // Not Found Errors
    // ========================================================================

    #[error("User not found")]
    UserNotFound,

    #[error("Friend request not found")]
    RequestNotFound,

    #[error("Conversation not found")]
    ConversationNotFound,

    // ========================================================================
    // Internal Errors
    // ========================================================================

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Password hashing failed
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_)
            | Error::WeakPassword
            | Error::UsernameOrEmailTaken
            | Error::EmailTaken
            | Error::InvalidCredentials
            | Error::IncorrectPassword
            | Error::InvalidResetToken
            | Error::CannotAddSelf
            | Error::AlreadyFriends
            | Error::RequestExists
            | Error::RequestNotPending
            | Error::InvalidDecision(_)
            | Error::NotConversationMember => StatusCode::BAD_REQUEST,

            Error::InvalidToken => StatusCode::UNAUTHORIZED,

            Error::UserNotFound | Error::RequestNotFound | Error::ConversationNotFound => {
                StatusCode::NOT_FOUND
            }

            Error::Database(_) | Error::PasswordHash(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> String {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            "Something went wrong".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(json!({ "message": self.public_message() }))).into_response()
    }
}

// ============================================================================
// TESTS
// ============================================================================
