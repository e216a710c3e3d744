//! Process-wide registry of channel managers.
//!
//! Managers are created lazily on first use, seeded from the [`ContextStore`].
//! A load failure is logged and the channel starts empty. [`ContextRegistry::persist_all`]
//! writes every dirty channel back to the store; [`ContextRegistry::spawn_persistence`]
//! runs it on a fixed interval.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::manager::{ConversationManager, UserProfile};
use super::store::ContextStore;
use super::types::{Message, ScoredMessage};

type SharedManager = Arc<Mutex<ConversationManager>>;

pub struct ContextRegistry {
    store: Arc<dyn ContextStore>,
    managers: tokio::sync::Mutex<HashMap<String, SharedManager>>,
    capacity: usize,
    decay_window: Duration,
}

impl ContextRegistry {
    pub fn new(store: Arc<dyn ContextStore>, capacity: usize, decay_window: Duration) -> Self {
        Self {
            store,
            managers: tokio::sync::Mutex::new(HashMap::new()),
            capacity,
            decay_window,
        }
    }

    /// Get or create the manager for a channel.
    ///
    /// The map lock is not held while history loads, so a slow load only
    /// delays its own channel. When two callers load the same channel at
    /// once, the first manager inserted wins.
    async fn manager(&self, channel_id: &str) -> SharedManager {
        let existing = self.managers.lock().await.get(channel_id).cloned();
        if let Some(manager) = existing {
            return manager;
        }

        let store = Arc::clone(&self.store);
        let channel = channel_id.to_string();
        let limit = self.capacity;
        let loaded = tokio::task::spawn_blocking(move || store.load(&channel, limit)).await;

        let history = match loaded {
            Ok(Ok(history)) => history,
            Ok(Err(e)) => {
                tracing::warn!(channel = %channel_id, error = %e, "failed to load context, starting empty");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(channel = %channel_id, error = %e, "context load task failed, starting empty");
                Vec::new()
            }
        };
        tracing::debug!(channel = %channel_id, loaded = history.len(), "context manager created");

        let manager = Arc::new(Mutex::new(ConversationManager::restore(
            channel_id,
            self.capacity,
            self.decay_window,
            history,
        )));
        let mut managers = self.managers.lock().await;
        Arc::clone(managers.entry(channel_id.to_string()).or_insert(manager))
    }

    pub async fn append(&self, channel_id: &str, message: Message) {
        let manager = self.manager(channel_id).await;
        with_manager(&manager, |m| m.append(message));
    }

    /// Non-expired messages of a channel, oldest first, with relevance scores.
    pub async fn relevant(&self, channel_id: &str) -> Vec<ScoredMessage> {
        let manager = self.manager(channel_id).await;
        with_manager(&manager, |m| m.relevant(Utc::now())).unwrap_or_default()
    }

    pub async fn profile(&self, channel_id: &str, user_id: &str) -> Option<UserProfile> {
        let manager = self.manager(channel_id).await;
        with_manager(&manager, |m| m.profile(user_id).cloned()).flatten()
    }

    pub async fn last_assistant_reply(&self, channel_id: &str) -> Option<String> {
        let manager = self.manager(channel_id).await;
        with_manager(&manager, |m| m.last_assistant_reply().map(str::to_string)).flatten()
    }

    /// Every stored message of a channel, including expired ones.
    pub async fn snapshot(&self, channel_id: &str) -> Vec<Message> {
        let manager = self.manager(channel_id).await;
        with_manager(&manager, |m| m.snapshot()).unwrap_or_default()
    }

    /// Write every dirty channel to the store. Returns how many were saved.
    ///
    /// A failed save leaves the channel dirty so the next pass retries it.
    pub async fn persist_all(&self) -> usize {
        let pending: Vec<(String, SharedManager, Vec<Message>)> = {
            let managers = self.managers.lock().await;
            managers
                .iter()
                .filter_map(|(channel, manager)| {
                    with_manager(manager, |m| {
                        if m.is_dirty() {
                            let snapshot = m.snapshot();
                            m.mark_clean();
                            Some(snapshot)
                        } else {
                            None
                        }
                    })
                    .flatten()
                    .map(|snapshot| (channel.clone(), Arc::clone(manager), snapshot))
                })
                .collect()
        };

        let mut saved = 0;
        for (channel, manager, snapshot) in pending {
            let store = Arc::clone(&self.store);
            let channel_for_save = channel.clone();
            let result =
                tokio::task::spawn_blocking(move || store.save(&channel_for_save, &snapshot))
                    .await
                    .map_err(anyhow::Error::from)
                    .and_then(|r| r);

            match result {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "failed to persist context");
                    with_manager(&manager, |m| m.mark_dirty());
                }
            }
        }

        if saved > 0 {
            tracing::debug!(channels = saved, "context persisted");
        }
        saved
    }

    /// Run [`persist_all`](Self::persist_all) every `interval` until the task is aborted.
    pub fn spawn_persistence(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.persist_all().await;
            }
        })
    }

    /// Channel ids with a loaded manager.
    pub async fn loaded_channels(&self) -> Vec<String> {
        let managers = self.managers.lock().await;
        let mut channels: Vec<String> = managers.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Ids of every channel with persisted history.
    pub async fn stored_channels(&self) -> Result<Vec<String>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.channels()).await?
    }
}

/// Run `f` against a locked manager. A poisoned lock is logged and skipped.
fn with_manager<T>(
    manager: &SharedManager,
    f: impl FnOnce(&mut ConversationManager) -> T,
) -> Option<T> {
    match manager.lock() {
        Ok(mut guard) => Some(f(&mut guard)),
        Err(e) => {
            tracing::error!(error = %e, "context lock poisoned");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::store::SqliteContextStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    #[derive(Default)]
    struct FailingStore {
        save_attempts: AtomicUsize,
    }

    impl ContextStore for FailingStore {
        fn load(&self, _: &str, _: usize) -> Result<Vec<Message>> {
            anyhow::bail!("disk on fire")
        }
        fn save(&self, _: &str, _: &[Message]) -> Result<()> {
            self.save_attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("disk on fire")
        }
        fn channels(&self) -> Result<Vec<String>> {
            anyhow::bail!("disk on fire")
        }
    }

    /// Loading channel "slow" blocks for a second; everything else is instant.
    #[derive(Default)]
    struct SlowStore {
        slow_load_started: AtomicBool,
    }

    impl ContextStore for SlowStore {
        fn load(&self, channel_id: &str, _: usize) -> Result<Vec<Message>> {
            if channel_id == "slow" {
                self.slow_load_started.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_secs(1));
            }
            Ok(Vec::new())
        }
        fn save(&self, _: &str, _: &[Message]) -> Result<()> {
            Ok(())
        }
        fn channels(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn sqlite_store() -> Arc<dyn ContextStore> {
        Arc::new(SqliteContextStore::new(
            crate::db::open_memory_database().unwrap(),
        ))
    }

    #[tokio::test]
    async fn load_failure_starts_empty() {
        let registry = ContextRegistry::new(Arc::new(FailingStore::default()), 10, HOUR);
        assert!(registry.relevant("c1").await.is_empty());

        registry.append("c1", Message::user("hello", "u1")).await;
        assert_eq!(registry.relevant("c1").await.len(), 1);
    }

    #[tokio::test]
    async fn failed_persist_keeps_channel_dirty() {
        let store = Arc::new(FailingStore::default());
        let registry = ContextRegistry::new(Arc::clone(&store) as Arc<dyn ContextStore>, 10, HOUR);
        registry.append("c1", Message::user("hello", "u1")).await;
        assert_eq!(registry.persist_all().await, 0);
        assert_eq!(registry.persist_all().await, 0);
        assert_eq!(store.save_attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persist_only_writes_dirty_channels() {
        let store = sqlite_store();
        let registry = ContextRegistry::new(Arc::clone(&store), 10, HOUR);
        registry.append("c1", Message::user("one", "u1")).await;
        registry.append("c2", Message::user("two", "u2")).await;

        assert_eq!(registry.persist_all().await, 2);
        assert_eq!(registry.persist_all().await, 0);

        registry.append("c1", Message::assistant("reply")).await;
        assert_eq!(registry.persist_all().await, 1);
        assert_eq!(store.load("c1", 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn history_survives_a_new_registry() {
        let store = sqlite_store();
        let first = ContextRegistry::new(Arc::clone(&store), 10, HOUR);
        first.append("c1", Message::user("I like music", "u1")).await;
        first.append("c1", Message::assistant("me too")).await;
        first.persist_all().await;

        let second = ContextRegistry::new(store, 10, HOUR);
        assert_eq!(second.relevant("c1").await.len(), 2);
        assert_eq!(second.last_assistant_reply("c1").await.as_deref(), Some("me too"));
        let profile = second.profile("c1", "u1").await.unwrap();
        assert!(profile.interests.contains("music"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_load_does_not_block_other_channels() {
        let store = Arc::new(SlowStore::default());
        let registry = Arc::new(ContextRegistry::new(
            Arc::clone(&store) as Arc<dyn ContextStore>,
            10,
            HOUR,
        ));
        registry.append("fast", Message::user("hello", "u1")).await;

        let slow = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.relevant("slow").await })
        };
        while !store.slow_load_started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let start = std::time::Instant::now();
        assert_eq!(registry.relevant("fast").await.len(), 1);
        assert!(start.elapsed() < Duration::from_millis(500));

        assert!(slow.await.unwrap().is_empty());
        assert_eq!(registry.loaded_channels().await, vec!["fast", "slow"]);
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_task_saves_once_per_interval() {
        let store = sqlite_store();
        let registry = Arc::new(ContextRegistry::new(Arc::clone(&store), 10, HOUR));
        registry.append("c1", Message::user("hello", "u1")).await;

        let task = registry.spawn_persistence(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.load("c1", 10).unwrap().is_empty());

        let mut stored = 0;
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(10)).await;
            stored = store.load("c1", 10).unwrap().len();
            if stored > 0 {
                break;
            }
        }
        assert_eq!(stored, 1);

        registry.append("c1", Message::assistant("hi there")).await;
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(10)).await;
            stored = store.load("c1", 10).unwrap().len();
            if stored > 1 {
                break;
            }
        }
        assert_eq!(stored, 2);
        task.abort();
    }
}
