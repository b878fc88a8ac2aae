//! Conversation and message storage.

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{now_millis, ConversationRecord, Database, MessageRecord, MessageStatus};
use crate::error::{Error, Result};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, text, image, status, created_at";

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get(0)?,
        members: vec![row.get(1)?, row.get(2)?],
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let status: String = row.get(5)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        text: row.get(3)?,
        image: row.get(4)?,
        status: MessageStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("unknown message status '{}'", status).into(),
            )
        })?,
        created_at: row.get(6)?,
    })
}

/// Sort a member pair so the unordered pair maps to one row.
fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Database {
    // ========================================================================
    // CONVERSATION OPERATIONS
    // ========================================================================

    /// Return the conversation between `a` and `b`, creating it if needed.
    ///
    /// One `INSERT … ON CONFLICT DO NOTHING` against the member-pair unique
    /// index, then a select, so concurrent callers converge on one row.
    pub fn get_or_create_conversation(&self, a: &str, b: &str) -> Result<ConversationRecord> {
        if a == b {
            return Err(Error::InvalidInput(
                "A conversation needs two different users".to_string(),
            ));
        }
        let (low, high) = ordered_pair(a, b);

        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT INTO conversations (id, member_low, member_high, created_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (member_low, member_high) DO NOTHING",
                params![Uuid::new_v4().to_string(), low, high, now_millis()],
            )
            .map_err(|e| Error::Database(format!("Failed to create conversation: {}", e)))?;

        if inserted > 0 {
            tracing::debug!(member_low = low, member_high = high, "Created conversation");
        }

        conn.query_row(
            "SELECT id, member_low, member_high, created_at FROM conversations
             WHERE member_low = ? AND member_high = ?",
            params![low, high],
            conversation_from_row,
        )
        .map_err(|e| Error::Database(format!("Failed to get conversation: {}", e)))
    }

    /// Get a conversation by ID
    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, member_low, member_high, created_at FROM conversations WHERE id = ?",
            params![id],
            conversation_from_row,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get conversation: {}", e)))
    }

    /// All conversations `user_id` is a member of, oldest first.
    pub fn conversations_for(&self, user_id: &str) -> Result<Vec<ConversationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, member_low, member_high, created_at FROM conversations
                 WHERE member_low = ?1 OR member_high = ?1
                 ORDER BY created_at, id",
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], conversation_from_row)
            .map_err(|e| Error::Database(format!("Failed to query conversations: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("Failed to read conversation row: {}", e)))
    }

    /// Number of conversations.
    pub fn conversation_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("Failed to count conversations: {}", e)))?;
        Ok(count as usize)
    }

    // ========================================================================
    // MESSAGE OPERATIONS
    // ========================================================================

    /// Store a new message.
    pub fn insert_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: Option<&str>,
        image: Option<&str>,
        status: MessageStatus,
    ) -> Result<MessageRecord> {
        let conn = self.conn.lock();
        let id = Uuid::new_v4().to_string();
        let now = now_millis();

        conn.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, text, image, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![id, conversation_id, sender_id, text, image, status.as_str(), now],
        )
        .map_err(|e| Error::Database(format!("Failed to store message: {}", e)))?;

        Ok(MessageRecord {
            id,
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.map(str::to_string),
            image: image.map(str::to_string),
            status,
            created_at: now,
        })
    }

    /// Messages of a conversation in the order they were stored.
    pub fn messages_for(&self, conversation_id: &str) -> Result<Vec<MessageRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY seq",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![conversation_id], message_from_row)
            .map_err(|e| Error::Database(format!("Failed to query messages: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("Failed to read message row: {}", e)))
    }

    /// Get a message by ID
    pub fn get_message(&self, id: &str) -> Result<Option<MessageRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM messages WHERE id = ?", MESSAGE_COLUMNS);
        conn.query_row(&sql, params![id], message_from_row)
            .optional()
            .map_err(|e| Error::Database(format!("Failed to get message: {}", e)))
    }

    /// Promote every `sent` message addressed to `recipient_id` to
    /// `delivered`. Returns the promoted messages, oldest first.
    pub fn mark_delivered_to(&self, recipient_id: &str) -> Result<Vec<MessageRecord>> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut messages = {
            let sql = format!(
                "SELECT {} FROM messages
                 WHERE status = 'sent' AND sender_id <> ?1
                   AND conversation_id IN (
                       SELECT id FROM conversations WHERE member_low = ?1 OR member_high = ?1
                   )
                 ORDER BY seq",
                MESSAGE_COLUMNS
            );
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;
            let rows = stmt
                .query_map(params![recipient_id], message_from_row)
                .map_err(|e| Error::Database(format!("Failed to query undelivered: {}", e)))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::Database(format!("Failed to read message row: {}", e)))?
        };

        for message in &mut messages {
            tx.execute(
                "UPDATE messages SET status = 'delivered' WHERE id = ? AND status = 'sent'",
                params![message.id],
            )
            .map_err(|e| Error::Database(format!("Failed to mark message delivered: {}", e)))?;
            message.status = MessageStatus::Delivered;
        }

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit: {}", e)))?;

        Ok(messages)
    }

    /// Mark every message in the conversation not sent by `reader_id` as
    /// read. Returns the IDs that changed, in conversation order.
    pub fn mark_conversation_read(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<Vec<String>> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let ids = {
            let mut stmt = tx
                .prepare(
                    "SELECT id FROM messages
                     WHERE conversation_id = ? AND sender_id <> ? AND status <> 'read'
                     ORDER BY seq",
                )
                .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;
            let rows = stmt
                .query_map(params![conversation_id, reader_id], |row| row.get(0))
                .map_err(|e| Error::Database(format!("Failed to query unread: {}", e)))?;
            rows.collect::<rusqlite::Result<Vec<String>>>()
                .map_err(|e| Error::Database(format!("Failed to read message row: {}", e)))?
        };

        tx.execute(
            "UPDATE messages SET status = 'read'
             WHERE conversation_id = ? AND sender_id <> ? AND status <> 'read'",
            params![conversation_id, reader_id],
        )
        .map_err(|e| Error::Database(format!("Failed to mark messages read: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit: {}", e)))?;

        Ok(ids)
    }
}
