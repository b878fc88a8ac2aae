//! Friend graph storage: the symmetric friend set, friend requests and the
//! friends-of-friends recommendation query.

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::database::profile_from_row;
use super::{
    is_check_violation, is_unique_violation, now_millis, Database, FriendRequestRecord,
    PendingRequest, PublicProfile, Recommendation, RequestStatus,
};
use crate::error::{Error, Result};

const REQUEST_COLUMNS: &str = "id, from_id, to_id, status, created_at, updated_at";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<FriendRequestRecord> {
    let status: String = row.get(3)?;
    Ok(FriendRequestRecord {
        id: row.get(0)?,
        from_id: row.get(1)?,
        to_id: row.get(2)?,
        status: RequestStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown request status '{}'", status).into(),
            )
        })?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Database {
    // ========================================================================
    // FRIEND SET
    // ========================================================================

    /// Whether `a` and `b` are friends.
    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM friendships WHERE user_id = ? AND friend_id = ?",
                params![a, b],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("Failed to check friendship: {}", e)))?;
        Ok(count > 0)
    }

    /// Friend IDs of a user.
    pub fn friend_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT friend_id FROM friendships WHERE user_id = ? ORDER BY created_at")
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| row.get(0))
            .map_err(|e| Error::Database(format!("Failed to query friends: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| Error::Database(format!("Failed to read friend row: {}", e)))
    }

    /// Friend profiles of a user, sorted by username.
    pub fn friend_profiles(&self, user_id: &str) -> Result<Vec<PublicProfile>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT u.id, u.username, u.name, u.profile_picture
                 FROM friendships f JOIN users u ON u.id = f.friend_id
                 WHERE f.user_id = ?
                 ORDER BY u.username",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], profile_from_row)
            .map_err(|e| Error::Database(format!("Failed to query friends: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("Failed to read friend row: {}", e)))
    }

    /// Remove both directions of a friendship, plus the accepted request
    /// that created it so either side may send a new one. Idempotent;
    /// returns the number of friendship rows removed (0 or 2).
    pub fn remove_friendship(&self, a: &str, b: &str) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let rows = tx
            .execute(
                "DELETE FROM friendships
                 WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
                params![a, b],
            )
            .map_err(|e| Error::Database(format!("Failed to remove friendship: {}", e)))?;

        tx.execute(
            "DELETE FROM friend_requests
             WHERE ((from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1))
               AND status = 'accepted'",
            params![a, b],
        )
        .map_err(|e| Error::Database(format!("Failed to clear accepted request: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit: {}", e)))?;

        Ok(rows)
    }

    // ========================================================================
    // FRIEND REQUESTS
    // ========================================================================

    /// Insert a pending request. The `(from_id, to_id)` unique index turns a
    /// duplicate into [`Error::RequestExists`]; the self-request check
    /// constraint into [`Error::CannotAddSelf`].
    pub fn create_friend_request(&self, from_id: &str, to_id: &str) -> Result<FriendRequestRecord> {
        let conn = self.conn.lock();
        let id = Uuid::new_v4().to_string();
        let now = now_millis();

        conn.execute(
            "INSERT INTO friend_requests (id, from_id, to_id, status, created_at, updated_at)
             VALUES (?, ?, ?, 'pending', ?, ?)",
            params![id, from_id, to_id, now, now],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::RequestExists
            } else if is_check_violation(&e) {
                Error::CannotAddSelf
            } else {
                Error::Database(format!("Failed to create friend request: {}", e))
            }
        })?;

        Ok(FriendRequestRecord {
            id,
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a friend request by ID
    pub fn get_friend_request(&self, id: &str) -> Result<Option<FriendRequestRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM friend_requests WHERE id = ?", REQUEST_COLUMNS);
        conn.query_row(&sql, params![id], request_from_row)
            .optional()
            .map_err(|e| Error::Database(format!("Failed to get friend request: {}", e)))
    }

    /// A pending or accepted request between `a` and `b` in either direction.
    pub fn active_request_between(&self, a: &str, b: &str) -> Result<Option<FriendRequestRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM friend_requests
             WHERE ((from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1))
               AND status IN ('pending', 'accepted')
             LIMIT 1",
            REQUEST_COLUMNS
        );
        conn.query_row(&sql, params![a, b], request_from_row)
            .optional()
            .map_err(|e| Error::Database(format!("Failed to look up friend request: {}", e)))
    }

    /// The pending request between `a` and `b` in either direction.
    pub fn pending_request_between(&self, a: &str, b: &str) -> Result<Option<FriendRequestRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM friend_requests
             WHERE ((from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1))
               AND status = 'pending'
             LIMIT 1",
            REQUEST_COLUMNS
        );
        conn.query_row(&sql, params![a, b], request_from_row)
            .optional()
            .map_err(|e| Error::Database(format!("Failed to look up friend request: {}", e)))
    }

    /// Pending requests addressed to `user_id`, oldest first, each with the
    /// requester's profile.
    pub fn pending_requests_to(&self, user_id: &str) -> Result<Vec<PendingRequest>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.created_at, u.id, u.username, u.name, u.profile_picture
                 FROM friend_requests r JOIN users u ON u.id = r.from_id
                 WHERE r.to_id = ? AND r.status = 'pending'
                 ORDER BY r.created_at",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(PendingRequest {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    status: RequestStatus::Pending,
                    from: PublicProfile {
                        id: row.get(2)?,
                        username: row.get(3)?,
                        name: row.get(4)?,
                        profile_picture: row.get(5)?,
                    },
                })
            })
            .map_err(|e| Error::Database(format!("Failed to query pending requests: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("Failed to read request row: {}", e)))
    }

    /// Users with a pending request involving `user_id`, split into
    /// `(sent_to, received_from)`.
    pub fn pending_counterparts(&self, user_id: &str) -> Result<(Vec<String>, Vec<String>)> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT from_id, to_id FROM friend_requests
                 WHERE status = 'pending' AND (from_id = ?1 OR to_id = ?1)",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::Database(format!("Failed to query pending requests: {}", e)))?;

        let mut sent_to = Vec::new();
        let mut received_from = Vec::new();
        for row in rows {
            let (from_id, to_id) =
                row.map_err(|e| Error::Database(format!("Failed to read request row: {}", e)))?;
            if from_id == user_id {
                sent_to.push(to_id);
            } else {
                received_from.push(from_id);
            }
        }
        Ok((sent_to, received_from))
    }

    /// Move a pending request to `decision`. Accepting also inserts both
    /// directions of the friendship, in the same transaction.
    pub fn resolve_friend_request(
        &self,
        id: &str,
        decision: RequestStatus,
    ) -> Result<FriendRequestRecord> {
        if decision == RequestStatus::Pending {
            return Err(Error::InvalidDecision(decision.as_str().to_string()));
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let sql = format!("SELECT {} FROM friend_requests WHERE id = ?", REQUEST_COLUMNS);
        let mut request = tx
            .query_row(&sql, params![id], request_from_row)
            .optional()
            .map_err(|e| Error::Database(format!("Failed to get friend request: {}", e)))?
            .ok_or(Error::RequestNotFound)?;

        if request.status != RequestStatus::Pending {
            return Err(Error::RequestNotPending);
        }

        let now = now_millis();
        tx.execute(
            "UPDATE friend_requests SET status = ?, updated_at = ? WHERE id = ? AND status = 'pending'",
            params![decision.as_str(), now, id],
        )
        .map_err(|e| Error::Database(format!("Failed to update friend request: {}", e)))?;

        if decision == RequestStatus::Accepted {
            tx.execute(
                "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at)
                 VALUES (?1, ?2, ?3), (?2, ?1, ?3)",
                params![request.from_id, request.to_id, now],
            )
            .map_err(|e| Error::Database(format!("Failed to add friendship: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit: {}", e)))?;

        request.status = decision;
        request.updated_at = now;
        Ok(request)
    }

    // ========================================================================
    // RECOMMENDATIONS
    // ========================================================================

    /// Friends of `user_id`'s friends, ranked by mutual friend count.
    ///
    /// Excludes the user, their current friends and anyone with a pending
    /// request to or from them. Ties keep whatever order SQLite produces.
    pub fn recommendations(&self, user_id: &str, limit: usize) -> Result<Vec<Recommendation>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT u.id, u.username, u.name, u.profile_picture, COUNT(*) AS mutual
                 FROM friendships mine
                 JOIN friendships theirs ON theirs.friend_id = mine.friend_id
                 JOIN users u ON u.id = theirs.user_id
                 WHERE mine.user_id = ?1
                   AND theirs.user_id <> ?1
                   AND theirs.user_id NOT IN
                       (SELECT friend_id FROM friendships WHERE user_id = ?1)
                   AND theirs.user_id NOT IN
                       (SELECT to_id FROM friend_requests WHERE from_id = ?1 AND status = 'pending'
                        UNION
                        SELECT from_id FROM friend_requests WHERE to_id = ?1 AND status = 'pending')
                 GROUP BY u.id
                 ORDER BY mutual DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(Recommendation {
                    profile: profile_from_row(row)?,
                    mutual_friends: row.get(4)?,
                })
            })
            .map_err(|e| Error::Database(format!("Failed to query recommendations: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("Failed to read recommendation row: {}", e)))
    }
}
