//! Durable backends for channel history.
//!
//! [`ContextStore`] is implemented by [`JsonContextStore`] (one pretty-printed
//! file per channel) and [`SqliteContextStore`] (the `messages` table). Both
//! persist whole-channel snapshots; the last write wins.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::{Message, Role};
use crate::config::{CleoConfig, ContextBackend};

/// Storage for per-channel message snapshots.
///
/// All methods are synchronous; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait ContextStore: Send + Sync {
    /// The newest `limit` messages of a channel in chronological order.
    fn load(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Replace the stored history of a channel.
    fn save(&self, channel_id: &str, messages: &[Message]) -> Result<()>;

    /// Ids of every channel with stored history.
    fn channels(&self) -> Result<Vec<String>>;
}

/// Create the store selected by `context.backend`.
pub fn create_store(config: &CleoConfig) -> Result<Box<dyn ContextStore>> {
    match config.context.backend {
        ContextBackend::Sqlite => {
            let conn = crate::db::open_database(config.resolved_db_path())?;
            Ok(Box::new(SqliteContextStore::new(conn)))
        }
        ContextBackend::Json => Ok(Box::new(JsonContextStore::new(
            config.resolved_context_dir(),
        )?)),
    }
}

/// Reject channel ids that could escape the data directory.
fn validate_channel_id(channel_id: &str) -> Result<()> {
    let valid = !channel_id.is_empty()
        && channel_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        bail!("invalid channel id: {channel_id:?}");
    }
    Ok(())
}

// ── JSON files ───────────────────────────────────────────────────────────────

pub struct JsonContextStore {
    dir: PathBuf,
}

impl JsonContextStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create context dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, channel_id: &str) -> PathBuf {
        self.dir.join(format!("context_{channel_id}.json"))
    }
}

impl ContextStore for JsonContextStore {
    fn load(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>> {
        validate_channel_id(channel_id)?;
        let path = self.path_for(channel_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut messages: Vec<Message> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let skip = messages.len().saturating_sub(limit);
        messages.drain(..skip);
        Ok(messages)
    }

    fn save(&self, channel_id: &str, messages: &[Message]) -> Result<()> {
        validate_channel_id(channel_id)?;
        let path = self.path_for(channel_id);
        let json = serde_json::to_string_pretty(messages)?;
        write_atomic(&path, json.as_bytes())
    }

    fn channels(&self) -> Result<Vec<String>> {
        let mut channels = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name
                .strip_prefix("context_")
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                channels.push(id.to_string());
            }
        }
        channels.sort();
        Ok(channels)
    }
}

/// Write to a sibling temp file then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)
        .with_context(|| format!("failed to write temp file: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename temp file to {}", path.display()))?;
    Ok(())
}

// ── SQLite ───────────────────────────────────────────────────────────────────

pub struct SqliteContextStore {
    conn: Mutex<Connection>,
}

impl SqliteContextStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
    }
}

impl ContextStore for SqliteContextStore {
    fn load(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT content, role, timestamp, user_id FROM messages \
             WHERE channel_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;

        let rows: Vec<(String, String, String, Option<String>)> = stmt
            .query_map(params![channel_id, limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut messages = rows
            .into_iter()
            .map(|(content, role, timestamp, user_id)| {
                let role: Role = role.parse().map_err(anyhow::Error::msg)?;
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .with_context(|| format!("bad timestamp in messages: {timestamp}"))?
                    .with_timezone(&Utc);
                Ok(Message {
                    content,
                    role,
                    timestamp,
                    user_id,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        messages.reverse();
        Ok(messages)
    }

    fn save(&self, channel_id: &str, messages: &[Message]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO conversations (channel_id, last_updated) VALUES (?1, ?2) \
             ON CONFLICT(channel_id) DO UPDATE SET last_updated = excluded.last_updated",
            params![channel_id, Utc::now().to_rfc3339()],
        )?;
        tx.execute(
            "DELETE FROM messages WHERE channel_id = ?1",
            params![channel_id],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO messages (channel_id, content, role, timestamp, user_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for message in messages {
                insert.execute(params![
                    channel_id,
                    message.content,
                    message.role.as_str(),
                    message.timestamp.to_rfc3339(),
                    message.user_id,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn channels(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT channel_id FROM conversations ORDER BY channel_id")?;
        let channels = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(channels)
    }
}
