//! Conversation message types.
//!
//! Defines [`Role`] (who authored a message), [`Message`] (a stored chat line),
//! and [`ScoredMessage`] (a message annotated with its recency relevance).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author role, matching the chat-completion API roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// SQL- and API-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// A single line of channel history. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub role: Role,
    /// RFC 3339 on disk.
    pub timestamp: DateTime<Utc>,
    /// Discord user id of the author; `None` for assistant and system lines.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::User,
            timestamp: Utc::now(),
            user_id: Some(user_id.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::Assistant,
            timestamp: Utc::now(),
            user_id: None,
        }
    }

    /// Same message with a different timestamp (used when replaying or backdating).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A message returned from retrieval together with its relevance in `[0.1, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMessage {
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub relevance: f64,
}

impl ScoredMessage {
    pub fn new(message: &Message, relevance: f64) -> Self {
        Self {
            content: message.content.clone(),
            role: message.role,
            timestamp: message.timestamp,
            user_id: message.user_id.clone(),
            relevance,
        }
    }
}
