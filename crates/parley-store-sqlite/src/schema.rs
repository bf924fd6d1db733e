//! SQL schema for the Parley SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Owned by registration and department administration; read-only to the
-- messaging core.
CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,
    department  TEXT NOT NULL DEFAULT '',
    role        TEXT NOT NULL DEFAULT 'user'   -- 'user' | 'admin' | 'superadmin'
);

CREATE TABLE IF NOT EXISTS events (
    event_id          TEXT PRIMARY KEY,
    title             TEXT NOT NULL,
    author_email      TEXT NOT NULL,
    author_department TEXT NOT NULL,           -- captured at submission
    tagged            TEXT NOT NULL DEFAULT '[]',  -- JSON list of requirements
    created_at        TEXT NOT NULL
);

-- Messages are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
-- `seq` breaks timestamp ties in insertion order.
CREATE TABLE IF NOT EXISTS messages (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id    TEXT NOT NULL UNIQUE,
    chat_id       TEXT NOT NULL,
    participant_a TEXT NOT NULL,
    participant_b TEXT NOT NULL,
    body          TEXT NOT NULL,
    sender_email  TEXT NOT NULL,
    sent_at       TEXT NOT NULL,               -- fixed-width RFC 3339 UTC
    CHECK (participant_a < participant_b)
);

CREATE INDEX IF NOT EXISTS messages_chat_idx ON messages(chat_id, sent_at);
CREATE INDEX IF NOT EXISTS messages_a_idx    ON messages(participant_a);
CREATE INDEX IF NOT EXISTS messages_b_idx    ON messages(participant_b);
CREATE INDEX IF NOT EXISTS events_author_idx ON events(author_email);

PRAGMA user_version = 1;
";
