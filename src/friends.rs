//! Friend-request lifecycle, friend list, search and recommendations.
//!
//! ```text
//!            send_request
//!   (none) ───────────────▶ pending ──accept──▶ accepted  (friends)
//!                              │
//!                              └────reject────▶ rejected
//! ```
//!
//! `accepted` and `rejected` are terminal. Duplicate and concurrent sends
//! are settled by the `(from_id, to_id)` unique index, not by the checks
//! made here before the insert.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::notifier::Notifier;
use crate::protocol::ServerEvent;
use crate::storage::{
    Database, FriendRequestRecord, PendingRequest, PublicProfile, Recommendation, RequestStatus,
    UserRecord,
};

/// Maximum number of recommendations returned.
pub const MAX_RECOMMENDATIONS: usize = 10;

/// Relationship of a search hit to the searching user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchRequestStatus {
    None,
    /// The searcher has a pending request out to this user.
    Sent,
    /// This user has a pending request out to the searcher.
    Received,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub request_status: SearchRequestStatus,
}

/// Friend-graph operations.
#[derive(Clone)]
pub struct FriendService {
    db: Database,
    notifier: Arc<dyn Notifier>,
}

impl FriendService {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    fn require_user(&self, user_id: &str) -> Result<UserRecord> {
        self.db.get_user(user_id)?.ok_or(Error::UserNotFound)
    }

    /// Send a friend request and notify the recipient if online.
    pub fn send_request(&self, from_id: &str, to_id: &str) -> Result<FriendRequestRecord> {
        if from_id == to_id {
            return Err(Error::CannotAddSelf);
        }
        let sender = self.require_user(from_id)?;
        self.require_user(to_id)?;

        if self.db.are_friends(from_id, to_id)? {
            return Err(Error::AlreadyFriends);
        }
        if let Some(existing) = self.db.active_request_between(from_id, to_id)? {
            return Err(match existing.status {
                RequestStatus::Accepted => Error::AlreadyFriends,
                _ => Error::RequestExists,
            });
        }

        let request = self.db.create_friend_request(from_id, to_id)?;

        let delivered = self.notifier.notify(
            to_id,
            ServerEvent::NewFriendRequest {
                request_id: request.id.clone(),
                from: sender.public_profile(),
            },
        );
        tracing::info!(
            request_id = request.id.as_str(),
            from_id = from_id,
            to_id = to_id,
            notified = delivered,
            "Friend request sent"
        );

        Ok(request)
    }

    /// Resolve a pending request. `decision` must be `accepted` or
    /// `rejected`.
    pub fn respond(&self, request_id: &str, decision: &str) -> Result<FriendRequestRecord> {
        let status = match RequestStatus::parse(decision) {
            Some(status @ (RequestStatus::Accepted | RequestStatus::Rejected)) => status,
            _ => return Err(Error::InvalidDecision(decision.to_string())),
        };
        self.resolve(request_id, status)
    }

    /// Accept the pending request `from_id` sent to `user_id`.
    pub fn accept_from(&self, user_id: &str, from_id: &str) -> Result<FriendRequestRecord> {
        let request = self
            .db
            .pending_request_between(from_id, user_id)?
            .filter(|r| r.from_id == from_id)
            .ok_or(Error::RequestNotFound)?;
        self.resolve(&request.id, RequestStatus::Accepted)
    }

    fn resolve(&self, request_id: &str, status: RequestStatus) -> Result<FriendRequestRecord> {
        let request = self.db.resolve_friend_request(request_id, status)?;

        if request.status == RequestStatus::Accepted {
            if let Some(accepter) = self.db.get_user(&request.to_id)? {
                self.notifier.notify(
                    &request.from_id,
                    ServerEvent::FriendRequestAccepted {
                        request_id: request.id.clone(),
                        by: accepter.public_profile(),
                    },
                );
            }
        }

        tracing::info!(
            request_id = request.id.as_str(),
            status = request.status.as_str(),
            "Friend request resolved"
        );
        Ok(request)
    }

    /// Remove the friendship between `user_id` and `friend_id`. Idempotent.
    pub fn unfriend(&self, user_id: &str, friend_id: &str) -> Result<()> {
        let removed = self.db.remove_friendship(user_id, friend_id)?;
        if removed > 0 {
            tracing::info!(user_id = user_id, friend_id = friend_id, "Unfriended");
        }
        Ok(())
    }

    /// Pending requests addressed to `user_id`.
    pub fn list_pending(&self, user_id: &str) -> Result<Vec<PendingRequest>> {
        self.db.pending_requests_to(user_id)
    }

    /// Friends-of-friends ranked by mutual friend count.
    pub fn recommend(&self, user_id: &str) -> Result<Vec<Recommendation>> {
        self.require_user(user_id)?;
        self.db.recommendations(user_id, MAX_RECOMMENDATIONS)
    }

    pub fn friend_list(&self, user_id: &str) -> Result<Vec<PublicProfile>> {
        self.require_user(user_id)?;
        self.db.friend_profiles(user_id)
    }

    /// Username substring search, excluding the searcher and their friends.
    pub fn search_users(&self, query: &str, user_id: &str) -> Result<Vec<SearchResult>> {
        self.require_user(user_id)?;
        let hits = self.db.search_users(query, user_id)?;
        let (sent_to, received_from) = self.db.pending_counterparts(user_id)?;

        Ok(hits
            .into_iter()
            .map(|profile| {
                let request_status = if sent_to.contains(&profile.id) {
                    SearchRequestStatus::Sent
                } else if received_from.contains(&profile.id) {
                    SearchRequestStatus::Received
                } else {
                    SearchRequestStatus::None
                };
                SearchResult {
                    profile,
                    request_status,
                }
            })
            .collect())
    }
}
