use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Hard message-size limit enforced by Discord.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Room kept free in every chunk for the author mention prefixed to the first one.
pub const MENTION_HEADROOM: usize = 40;

/// Most follow-ups a single thought chain may schedule.
pub const MAX_FOLLOW_UPS: usize = 2;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CleoConfig {
    pub discord: DiscordConfig,
    pub persona: PersonaConfig,
    pub completion: CompletionConfig,
    pub image: ImageConfig,
    pub context: ContextConfig,
    pub notes: NotesConfig,
    pub rate_limit: RateLimitConfig,
    pub reply: ReplyConfig,
    pub thought_chain: ThoughtChainConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: String,
    /// Messages starting with this name (case-insensitive) are answered.
    pub bot_name: String,
    pub respond_in_dms: bool,
    /// User allowed to run `!shutdown`. Defaults to the application owner.
    pub owner_id: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PersonaConfig {
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub classifier_model: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub default_max_tokens: u32,
    pub follow_up_max_tokens: u32,
    pub stop: Vec<String>,
    pub repetition_penalty: Option<f64>,
    pub classify_length: bool,
    pub metaprompt: bool,
    /// Most recent relevant context messages sent with each request.
    pub context_messages: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImageConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContextBackend {
    Sqlite,
    Json,
}

impl std::str::FromStr for ContextBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown context backend: {s}")),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContextConfig {
    pub backend: ContextBackend,
    /// Directory for JSON context files.
    pub data_dir: String,
    pub db_path: String,
    pub max_messages: usize,
    pub decay_window_secs: u64,
    pub persist_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotesConfig {
    pub dir: String,
    /// How many of the newest notes are summarized into the prompt.
    pub prompt_notes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_minute: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReplyConfig {
    pub chunk_chars: usize,
    pub typing_ms_per_char: u64,
    pub typing_max_ms: u64,
    pub pause_ms: u64,
    pub max_emoji: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThoughtChainConfig {
    pub enabled: bool,
    pub cooldown_secs: u64,
    pub max_follow_ups: usize,
    pub base_probability: f64,
    pub max_probability: f64,
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub interruption_probability: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Plain-text log file written next to the console output.
    pub file: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            bot_name: "cleo".into(),
            respond_in_dms: true,
            owner_id: None,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key: String::new(),
            model: "nousresearch/hermes-3-llama-3.1-405b".into(),
            classifier_model: "openai/gpt-4o-mini".into(),
            timeout_secs: 60,
            connect_timeout_secs: 10,
            max_retries: 3,
            base_delay_ms: 1000,
            default_max_tokens: 500,
            follow_up_max_tokens: 150,
            stop: vec!["<end>".into(), "<|end|>".into()],
            repetition_penalty: Some(1.15),
            classify_length: true,
            metaprompt: true,
            context_messages: 5,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            url: "https://api.hyperbolic.xyz/v1/image/generation".into(),
            api_key: String::new(),
            model: "FLUX.1-dev".into(),
            width: 1024,
            height: 1024,
            steps: 50,
            timeout_secs: 120,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        let dir = default_cleo_dir();
        Self {
            backend: ContextBackend::Sqlite,
            data_dir: dir.join("context").to_string_lossy().into_owned(),
            db_path: dir.join("context.db").to_string_lossy().into_owned(),
            max_messages: 50,
            decay_window_secs: 4 * 3600,
            persist_interval_secs: 300,
        }
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            dir: default_cleo_dir()
                .join("user_notes")
                .to_string_lossy()
                .into_owned(),
            prompt_notes: 5,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
        }
    }
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 1900,
            typing_ms_per_char: 10,
            typing_max_ms: 1500,
            pause_ms: 300,
            max_emoji: 2,
        }
    }
}

impl Default for ThoughtChainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_secs: 300,
            max_follow_ups: 2,
            base_probability: 0.35,
            max_probability: 0.85,
            min_delay_secs: 20,
            max_delay_secs: 30,
            interruption_probability: 0.3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
        }
    }
}

/// Returns `~/.cleo/`, falling back to `./.cleo` when no home directory is known.
pub fn default_cleo_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cleo")
}

/// Returns the default config file path: `~/.cleo/config.toml`
pub fn default_config_path() -> PathBuf {
    default_cleo_dir().join("config.toml")
}

impl CleoConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides and validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CleoConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("DISCORD_TOKEN") {
            self.discord.token = val;
        }
        if let Some(val) = lookup("DISCORD_OWNER_ID") {
            match val.parse() {
                Ok(id) => self.discord.owner_id = Some(id),
                Err(e) => tracing::warn!(error = %e, "ignoring DISCORD_OWNER_ID"),
            }
        }
        if let Some(val) = lookup("OPENAI_API_KEY") {
            self.completion.api_key = val;
        }
        if let Some(val) = lookup("IMAGE_API_KEY") {
            self.image.api_key = val;
        }
        if let Some(val) = lookup("CLEO_DATA_DIR") {
            let dir = PathBuf::from(val);
            self.context.data_dir = dir.join("context").to_string_lossy().into_owned();
            self.context.db_path = dir.join("context.db").to_string_lossy().into_owned();
            self.notes.dir = dir.join("user_notes").to_string_lossy().into_owned();
        }
        if let Some(val) = lookup("CLEO_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("CLEO_CONTEXT_BACKEND") {
            match val.parse() {
                Ok(backend) => self.context.backend = backend,
                Err(e) => tracing::warn!(error = %e, "ignoring CLEO_CONTEXT_BACKEND"),
            }
        }
    }

    /// Reject settings that would break core invariants and clamp the chunk size.
    pub fn validate(&mut self) -> Result<()> {
        if self.context.max_messages == 0 {
            bail!("context.max_messages must be at least 1");
        }
        if self.context.decay_window_secs == 0 {
            bail!("context.decay_window_secs must be at least 1");
        }
        if self.rate_limit.requests_per_minute == 0 {
            bail!("rate_limit.requests_per_minute must be at least 1");
        }
        if self.thought_chain.min_delay_secs > self.thought_chain.max_delay_secs {
            bail!("thought_chain.min_delay_secs must not exceed max_delay_secs");
        }

        let ceiling = DISCORD_MESSAGE_LIMIT - MENTION_HEADROOM;
        if self.reply.chunk_chars == 0 || self.reply.chunk_chars > ceiling {
            tracing::warn!(
                configured = self.reply.chunk_chars,
                clamped = ceiling,
                "reply.chunk_chars out of range"
            );
            self.reply.chunk_chars = ceiling;
        }

        let follow_ups = self.thought_chain.max_follow_ups;
        if follow_ups == 0 || follow_ups > MAX_FOLLOW_UPS {
            let clamped = follow_ups.clamp(1, MAX_FOLLOW_UPS);
            tracing::warn!(
                configured = follow_ups,
                clamped,
                "thought_chain.max_follow_ups out of range"
            );
            self.thought_chain.max_follow_ups = clamped;
        }
        Ok(())
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.context.db_path)
    }

    pub fn resolved_context_dir(&self) -> PathBuf {
        expand_tilde(&self.context.data_dir)
    }

    pub fn resolved_notes_dir(&self) -> PathBuf {
        expand_tilde(&self.notes.dir)
    }

    pub fn decay_window(&self) -> Duration {
        Duration::from_secs(self.context.decay_window_secs)
    }

    /// The configured system prompt, or the built-in persona.
    pub fn system_prompt(&self) -> &str {
        self.persona
            .system_prompt
            .as_deref()
            .unwrap_or(crate::prompts::SYSTEM_PROMPT)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
