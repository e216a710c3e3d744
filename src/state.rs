//! Process-wide state shared by every event handler.

use anyhow::Result;
use std::sync::Arc;

use crate::api::metrics::{ApiMetrics, BotMetrics};
use crate::api::rate_limit::RateLimiter;
use crate::api::CompletionClient;
use crate::config::CleoConfig;
use crate::context::registry::ContextRegistry;
use crate::context::store::{self, ContextStore};
use crate::emotion::EmotionTracker;
use crate::image::ImageClient;
use crate::notes::NotesStore;
use crate::thought_chain::ThoughtChainManager;

pub struct AppState {
    pub config: Arc<CleoConfig>,
    pub contexts: Arc<ContextRegistry>,
    pub notes: NotesStore,
    pub completion: CompletionClient,
    pub images: ImageClient,
    pub emotions: EmotionTracker,
    pub chains: ThoughtChainManager,
    pub api_metrics: ApiMetrics,
    pub bot_metrics: BotMetrics,
}

impl AppState {
    /// Wire every component around an already-open context store.
    pub fn with_store(config: CleoConfig, store: Arc<dyn ContextStore>) -> Result<Self> {
        let contexts = Arc::new(ContextRegistry::new(
            store,
            config.context.max_messages,
            config.decay_window(),
        ));
        let api_metrics = ApiMetrics::new();
        let limiter = Arc::new(RateLimiter::per_minute(config.rate_limit.requests_per_minute));
        let completion =
            CompletionClient::new(config.completion.clone(), limiter, api_metrics.clone())?;
        let images = ImageClient::new(config.image.clone())?;

        Ok(Self {
            contexts,
            notes: NotesStore::new(config.resolved_notes_dir()),
            completion,
            images,
            emotions: EmotionTracker::new(),
            chains: ThoughtChainManager::new(config.thought_chain.clone()),
            api_metrics,
            bot_metrics: BotMetrics::new(),
            config: Arc::new(config),
        })
    }
}

/// Open the configured context store and build the shared state.
pub fn setup_shared_state(config: CleoConfig) -> Result<Arc<AppState>> {
    let store: Arc<dyn ContextStore> = Arc::from(store::create_store(&config)?);
    tracing::info!(backend = ?config.context.backend, "context store ready");
    Ok(Arc::new(AppState::with_store(config, store)?))
}
