//! SQL DDL for the conversation tables.
//!
//! Defines the `conversations`, `messages`, and `schema_meta` tables. All DDL
//! uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for the context store.
const SCHEMA_SQL: &str = r#"
-- One row per channel that has ever been persisted
CREATE TABLE IF NOT EXISTS conversations (
    channel_id TEXT PRIMARY KEY,
    last_updated TEXT NOT NULL
);

-- Channel message history, newest snapshot only
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id TEXT NOT NULL REFERENCES conversations(channel_id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    role TEXT NOT NULL CHECK(role IN ('user','assistant','system')),
    timestamp TEXT NOT NULL,
    user_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel_id);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
