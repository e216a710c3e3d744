//! Per-user note log.
//!
//! Notes are short facts the model asks to remember about a user, emitted as
//! `<user_note>...</user_note>` tags in its replies. Each user's notes live in
//! `<dir>/<user_id>_notes.json` as a pretty-printed JSON array and are never
//! evicted. Reads and writes fail open: errors are logged, reads return an
//! empty list.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static NOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<user_note>(.*?)</user_note>").expect("valid note regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNote {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

pub struct NotesStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Vec<UserNote>>>,
}

impl NotesStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf> {
        if user_id.is_empty() || !user_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("invalid user id: {user_id:?}");
        }
        Ok(self.dir.join(format!("{user_id}_notes.json")))
    }

    /// Append a note for a user. Failures are logged and the note is dropped.
    pub async fn add_note(&self, user_id: &str, content: &str) {
        if let Err(e) = self.try_add_note(user_id, content).await {
            tracing::error!(user = %user_id, error = %e, "failed to add note");
        }
    }

    async fn try_add_note(&self, user_id: &str, content: &str) -> Result<()> {
        let path = self.path_for(user_id)?;
        let mut cache = self.cache.lock().await;

        let mut notes = match cache.get(user_id) {
            Some(notes) => notes.clone(),
            None => read_notes(&path).await?,
        };
        notes.push(UserNote {
            content: content.to_string(),
            timestamp: Utc::now(),
        });

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create notes dir {}", self.dir.display()))?;
        let json = serde_json::to_string_pretty(&notes)?;
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("failed to write temp file: {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .context("failed to rename temp file")?;

        tracing::debug!(user = %user_id, total = notes.len(), "note added");
        cache.insert(user_id.to_string(), notes);
        Ok(())
    }

    /// All notes for a user, oldest first. Empty when none exist or on error.
    pub async fn get_user_notes(&self, user_id: &str) -> Vec<UserNote> {
        let mut cache = self.cache.lock().await;
        if let Some(notes) = cache.get(user_id) {
            return notes.clone();
        }

        let notes = match self.path_for(user_id) {
            Ok(path) => read_notes(&path).await,
            Err(e) => Err(e),
        };
        match notes {
            Ok(notes) => {
                tracing::debug!(user = %user_id, count = notes.len(), "notes loaded");
                cache.insert(user_id.to_string(), notes.clone());
                notes
            }
            Err(e) => {
                tracing::error!(user = %user_id, error = %e, "failed to read notes");
                Vec::new()
            }
        }
    }
}

async fn read_notes(path: &PathBuf) -> Result<Vec<UserNote>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Remove `<user_note>` tags from model output, returning the trimmed text and
/// the trimmed, non-empty note bodies in order.
pub fn extract_user_notes(text: &str) -> (String, Vec<String>) {
    let notes = NOTE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|note| !note.is_empty())
        .collect();
    let cleaned = NOTE_RE.replace_all(text, "").trim().to_string();
    (cleaned, notes)
}

/// Prompt section listing the newest `limit` notes, or `None` when there are none.
pub fn notes_summary(notes: &[UserNote], limit: usize) -> Option<String> {
    if notes.is_empty() || limit == 0 {
        return None;
    }
    let start = notes.len().saturating_sub(limit);
    let lines: Vec<String> = notes[start..]
        .iter()
        .map(|n| format!("- {}", n.content))
        .collect();
    Some(format!("Previous notes about this user:\n{}", lines.join("\n")))
}
