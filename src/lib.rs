//! Cleo, a Discord chat bot backed by an OpenAI-compatible completion API.
//!
//! Cleo answers messages that mention her, arrive by DM, or start with her
//! name. Each reply is built from the channel's recent history, what she has
//! noted about the author, and a per-user emotional state that tunes the
//! sampling parameters. Replies are cleaned, split to fit Discord's message
//! limit and sent with simulated typing. Some replies are followed by
//! delayed "thought chain" continuations.
//!
//! | Concern | Default |
//! |---------|---------|
//! | Context capacity | 50 messages per channel |
//! | Context decay window | 4 hours, relevance floor 0.1 |
//! | Persistence | SQLite (or JSON files), every 5 minutes |
//! | Rate limit | 60 completion requests per minute |
//! | Retries | 3 attempts, 1 s base delay, doubling |
//! | Reply chunk size | 1900 characters |
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, migrations, and health checks
//! - [`context`]: Per-channel history with recency decay, stores, and the registry
//! - [`notes`]: Per-user note log extracted from model replies
//! - [`api`]: Completion client: rate limiting, retries, classification, metrics
//! - [`image`]: Image generation client
//! - [`emotion`]: Per-user emotional state mapped to sampling parameters
//! - [`thought_chain`]: Probability-gated follow-up messages
//! - [`reply`]: Post-processing and chunking of model output
//! - [`pipeline`]: Message handling independent of Discord
//! - [`bot`]: Discord gateway shell

pub mod api;
pub mod bot;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod emotion;
pub mod image;
pub mod logging;
pub mod notes;
pub mod pipeline;
pub mod prompts;
pub mod reply;
pub mod state;
pub mod thought_chain;
