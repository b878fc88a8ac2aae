//! # Storage Module
//!
//! SQLite persistence for users, friendships, friend requests,
//! conversations and messages.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │    Services     │  accounts / friends / chat                         │
//! │  └────────┬────────┘                                                    │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                    │
//! │  │    Database     │  database.rs  users                                │
//! │  │                 │  social.rs    friendships, requests, recommend     │
//! │  │                 │  chat.rs      conversations, messages              │
//! │  └────────┬────────┘                                                    │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                    │
//! │  │   SQLite DB     │  unique indexes are the only race guard:           │
//! │  │  (file/memory)  │  • friend_requests (from_id, to_id)                │
//! │  │                 │  • conversations (member_low, member_high)         │
//! │  │                 │  • friendships (user_id, friend_id)                │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod chat;
pub(crate) mod database;
mod schema;
mod social;

pub use database::Database;

use serde::{Deserialize, Serialize};

/// Current time as Unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether a SQLite error is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

/// Whether a SQLite error is a CHECK constraint violation.
pub(crate) fn is_check_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_CHECK
    )
}

// ============================================================================
// RECORD TYPES
// ============================================================================

/// A full user row, including credentials.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub name: String,
    pub bio: String,
    pub work: String,
    pub location: String,
    pub profile_picture: String,
    pub created_at: i64,
}

impl UserRecord {
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
            email: Some(self.email.clone()),
            profile_picture: self.profile_picture.clone(),
            bio: self.bio.clone(),
            work: self.work.clone(),
            location: self.location.clone(),
        }
    }
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub profile_picture: String,
}

/// Partial profile update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub work: Option<String>,
    pub location: Option<String>,
    pub profile_picture: Option<String>,
}

/// What other users see in lists and search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    pub profile_picture: String,
}

/// Full profile page. `email` is only present for the account owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub profile_picture: String,
    pub bio: String,
    pub work: String,
    pub location: String,
}

/// Friend request status. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// A friend request row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestRecord {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub status: RequestStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A pending request enriched with the requester's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: String,
    pub from: PublicProfile,
    pub status: RequestStatus,
    pub created_at: i64,
}

/// A friend-of-friend suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub mutual_friends: i64,
}

/// Conversation between exactly two users. `members` is stored sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    pub members: Vec<String>,
    pub created_at: i64,
}

impl ConversationRecord {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    /// The member that isn't `user_id`.
    pub fn other_member(&self, user_id: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.as_str() != user_id)
            .map(String::as_str)
    }
}

/// Message delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            _ => None,
        }
    }
}

/// A chat message row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub status: MessageStatus,
    pub created_at: i64,
}
