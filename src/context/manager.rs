//! Per-channel conversation state.
//!
//! A [`ConversationManager`] owns one channel's bounded history and the interest
//! profiles of the users talking in it. It holds no lock of its own; the
//! [`ContextRegistry`](super::registry::ContextRegistry) wraps each manager in a mutex.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::LazyLock;
use std::time::Duration;

use super::relevance;
use super::types::{Message, Role, ScoredMessage};

/// Topics tracked in user profiles.
const INTEREST_KEYWORDS: &[&str] = &[
    "ai", "music", "science", "art", "technology", "sports", "movies", "gaming",
];

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid word regex"));

/// Interests collected from a user's messages in one channel.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub interests: BTreeSet<String>,
}

pub struct ConversationManager {
    channel_id: String,
    messages: VecDeque<Message>,
    capacity: usize,
    decay_window: Duration,
    profiles: HashMap<String, UserProfile>,
    dirty: bool,
}

impl ConversationManager {
    pub fn new(channel_id: impl Into<String>, capacity: usize, decay_window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            channel_id: channel_id.into(),
            messages: VecDeque::with_capacity(capacity),
            capacity,
            decay_window,
            profiles: HashMap::new(),
            dirty: false,
        }
    }

    /// Rebuild a manager from persisted history. Only the newest `capacity`
    /// messages are kept, and profiles are re-derived from the user lines.
    pub fn restore(
        channel_id: impl Into<String>,
        capacity: usize,
        decay_window: Duration,
        history: Vec<Message>,
    ) -> Self {
        let mut manager = Self::new(channel_id, capacity, decay_window);
        for message in history {
            manager.append(message);
        }
        manager.dirty = false;
        manager
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Add a message, evicting the oldest one when at capacity.
    pub fn append(&mut self, message: Message) {
        if message.role == Role::User {
            if let Some(user_id) = message.user_id.as_deref() {
                let interests = extract_interests(&message.content);
                if !interests.is_empty() {
                    self.profiles
                        .entry(user_id.to_string())
                        .or_default()
                        .interests
                        .extend(interests);
                }
            }
        }

        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        self.dirty = true;
    }

    /// All messages still inside the decay window, oldest first, scored by recency.
    pub fn relevant(&self, now: DateTime<Utc>) -> Vec<ScoredMessage> {
        self.messages
            .iter()
            .filter_map(|msg| {
                let age = (now - msg.timestamp).to_std().unwrap_or(Duration::ZERO);
                relevance(age, self.decay_window).map(|score| ScoredMessage::new(msg, score))
            })
            .collect()
    }

    /// Everything currently stored, including expired messages.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn profile(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    /// Content of the newest assistant line, if any.
    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Keywords from [`INTEREST_KEYWORDS`] that appear as whole words in `content`.
pub fn extract_interests(content: &str) -> BTreeSet<String> {
    let lowered = content.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| INTEREST_KEYWORDS.contains(word))
        .map(str::to_string)
        .collect()
}
