//! # Database Schema
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐      │
//! │  │     users       │    │  friendships    │    │ friend_requests │      │
//! │  ├─────────────────┤    ├─────────────────┤    ├─────────────────┤      │
//! │  │ id              │◄───│ user_id         │    │ id              │      │
//! │  │ username  (U)   │◄───│ friend_id       │    │ from_id ─┐ (U)  │      │
//! │  │ email     (U)   │    │ created_at      │    │ to_id   ─┘      │      │
//! │  │ password_hash   │    └─────────────────┘    │ status          │      │
//! │  │ name, bio, ...  │                           │ created_at      │      │
//! │  │ reset_token     │                           │ updated_at      │      │
//! │  └─────────────────┘                           └─────────────────┘      │
//! │                                                                         │
//! │  ┌─────────────────┐    ┌─────────────────┐                             │
//! │  │  conversations  │    │    messages     │                             │
//! │  ├─────────────────┤    ├─────────────────┤                             │
//! │  │ id              │◄───│ conversation_id │                             │
//! │  │ member_low ─┐(U)│    │ seq (order)     │                             │
//! │  │ member_high─┘   │    │ sender_id       │                             │
//! │  │ created_at      │    │ text, image     │                             │
//! │  └─────────────────┘    │ status          │                             │
//! │                         └─────────────────┘                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Accounts
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    -- Argon2id PHC string
    password_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    bio TEXT NOT NULL DEFAULT '',
    work TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    profile_picture TEXT NOT NULL DEFAULT '',
    reset_token TEXT,
    -- Unix ms
    reset_expires_at INTEGER,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_reset_token ON users(reset_token) WHERE reset_token IS NOT NULL;

-- Symmetric friend set: every friendship is stored in both directions
CREATE TABLE IF NOT EXISTS friendships (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    friend_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, friend_id),
    CHECK (user_id <> friend_id)
);
CREATE INDEX IF NOT EXISTS idx_friendships_friend ON friendships(friend_id);

-- Friend requests: one row per ordered pair, ever
CREATE TABLE IF NOT EXISTS friend_requests (
    id TEXT PRIMARY KEY,
    from_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    to_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'accepted', 'rejected')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (from_id <> to_id),
    UNIQUE (from_id, to_id)
);
CREATE INDEX IF NOT EXISTS idx_friend_requests_to ON friend_requests(to_id, status);

-- Conversations: the unordered member pair is stored sorted
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    member_low TEXT NOT NULL,
    member_high TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    CHECK (member_low < member_high),
    UNIQUE (member_low, member_high)
);
CREATE INDEX IF NOT EXISTS idx_conversations_high ON conversations(member_high);

-- Messages: seq fixes creation order within a conversation
CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    sender_id TEXT NOT NULL,
    text TEXT,
    image TEXT,
    status TEXT NOT NULL DEFAULT 'sent'
        CHECK (status IN ('sent', 'delivered', 'read')),
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, seq);
"#;
