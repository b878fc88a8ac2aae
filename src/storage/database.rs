//! # Database
//!
//! SQLite handle plus the account (user) operations. Social graph and chat
//! operations live in `social.rs` and `chat.rs` as further `impl Database`
//! blocks.
//!
//! The connection sits behind a mutex that is held for exactly one store
//! call or one transaction.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    is_unique_violation, now_millis, schema, NewUser, ProfileUpdate, PublicProfile, UserRecord,
};
use crate::error::{Error, Result};

/// Column list matching [`user_from_row`].
pub(super) const USER_COLUMNS: &str =
    "id, username, email, password_hash, name, bio, work, location, profile_picture, created_at";

pub(super) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        name: row.get(4)?,
        bio: row.get(5)?,
        work: row.get(6)?,
        location: row.get(7)?,
        profile_picture: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub(super) fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<PublicProfile> {
    Ok(PublicProfile {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        profile_picture: row.get(3)?,
    })
}

/// The main database handle
#[derive(Clone)]
pub struct Database {
    /// The underlying SQLite connection
    pub(super) conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::Database(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Database(format!("Failed to enable foreign keys: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        match version {
            None => {
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::Database(format!("Failed to create tables: {}", e)))?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| Error::Database(format!("Failed to set schema version: {}", e)))?;

                tracing::info!("Database schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(Error::Database(format!(
                    "Database schema version {} is newer than supported version {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(v) => {
                tracing::debug!("Database schema version: {}", v);
            }
        }

        Ok(())
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Create a new account. Duplicate username or email is reported as
    /// [`Error::UsernameOrEmailTaken`].
    pub fn create_user(&self, user: &NewUser) -> Result<UserRecord> {
        let conn = self.conn.lock();
        let id = Uuid::new_v4().to_string();
        let now = now_millis();

        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, name, profile_picture, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                user.username,
                user.email,
                user.password_hash,
                user.name,
                user.profile_picture,
                now,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::UsernameOrEmailTaken
            } else {
                Error::Database(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(UserRecord {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            name: user.name.clone(),
            bio: String::new(),
            work: String::new(),
            location: String::new(),
            profile_picture: user.profile_picture.clone(),
            created_at: now,
        })
    }

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        self.find_user_where("id = ?", id)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        self.find_user_where("username = ?", username)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.find_user_where("email = ?", email)
    }

    fn find_user_where(&self, clause: &str, value: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, clause);
        conn.query_row(&sql, params![value], user_from_row)
            .optional()
            .map_err(|e| Error::Database(format!("Failed to get user: {}", e)))
    }

    /// Whether a user row exists.
    pub fn user_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .map_err(|e| Error::Database(format!("Failed to check user: {}", e)))?;
        Ok(count > 0)
    }

    /// Username substring search, excluding `exclude_id` and everyone
    /// already in their friend set.
    ///
    /// Matching folds case with Unicode rules in Rust; SQLite's `LIKE` only
    /// folds ASCII.
    pub fn search_users(&self, query: &str, exclude_id: &str) -> Result<Vec<PublicProfile>> {
        let needle = query.to_lowercase();
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(
                "SELECT id, username, name, profile_picture FROM users
                 WHERE id <> ?1
                   AND id NOT IN (SELECT friend_id FROM friendships WHERE user_id = ?1)
                 ORDER BY username",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![exclude_id], profile_from_row)
            .map_err(|e| Error::Database(format!("Failed to search users: {}", e)))?;

        let mut found = Vec::new();
        for row in rows {
            let profile =
                row.map_err(|e| Error::Database(format!("Failed to read user row: {}", e)))?;
            if profile.username.to_lowercase().contains(&needle) {
                found.push(profile);
            }
        }
        Ok(found)
    }

    /// Apply a partial profile update. Returns the updated row, or None if
    /// the user does not exist.
    pub fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<UserRecord>> {
        {
            let conn = self.conn.lock();
            let rows = conn
                .execute(
                    "UPDATE users SET
                        name = COALESCE(?2, name),
                        email = COALESCE(?3, email),
                        bio = COALESCE(?4, bio),
                        work = COALESCE(?5, work),
                        location = COALESCE(?6, location),
                        profile_picture = COALESCE(?7, profile_picture)
                     WHERE id = ?1",
                    params![
                        id,
                        update.name,
                        update.email,
                        update.bio,
                        update.work,
                        update.location,
                        update.profile_picture,
                    ],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        Error::EmailTaken
                    } else {
                        Error::Database(format!("Failed to update profile: {}", e))
                    }
                })?;

            if rows == 0 {
                return Ok(None);
            }
        }

        self.get_user(id)
    }

    /// Replace the password hash and clear any outstanding reset token.
    pub fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?, reset_token = NULL, reset_expires_at = NULL
                 WHERE id = ?",
                params![password_hash, id],
            )
            .map_err(|e| Error::Database(format!("Failed to set password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Store a password-reset token with its expiry (Unix ms).
    pub fn set_reset_token(&self, id: &str, token: &str, expires_at: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET reset_token = ?, reset_expires_at = ? WHERE id = ?",
                params![token, expires_at, id],
            )
            .map_err(|e| Error::Database(format!("Failed to set reset token: {}", e)))?;
        Ok(rows > 0)
    }

    /// Find the user owning a reset token that has not expired at `now`.
    pub fn get_user_by_reset_token(&self, token: &str, now: i64) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM users WHERE reset_token = ? AND reset_expires_at > ?",
            USER_COLUMNS
        );
        conn.query_row(&sql, params![token, now], user_from_row)
            .optional()
            .map_err(|e| Error::Database(format!("Failed to look up reset token: {}", e)))
    }

    /// Clear reset tokens whose expiry has passed. Returns how many were cleared.
    pub fn purge_expired_reset_tokens(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET reset_token = NULL, reset_expires_at = NULL
             WHERE reset_token IS NOT NULL AND reset_expires_at <= ?",
            params![now],
        )
        .map_err(|e| Error::Database(format!("Failed to purge reset tokens: {}", e)))
    }

    /// Delete an account. Friend requests touching the user and both
    /// directions of every friendship go with it, in one transaction.
    /// Conversations and messages are kept.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM friend_requests WHERE from_id = ?1 OR to_id = ?1",
            params![id],
        )
        .map_err(|e| Error::Database(format!("Failed to delete friend requests: {}", e)))?;

        tx.execute(
            "DELETE FROM friendships WHERE user_id = ?1 OR friend_id = ?1",
            params![id],
        )
        .map_err(|e| Error::Database(format!("Failed to delete friendships: {}", e)))?;

        let rows = tx
            .execute("DELETE FROM users WHERE id = ?", params![id])
            .map_err(|e| Error::Database(format!("Failed to delete user: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit: {}", e)))?;

        Ok(rows > 0)
    }

    /// Number of accounts.
    pub fn user_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("Failed to count users: {}", e)))?;
        Ok(count as usize)
    }
}
