//! Discord shell: connects to the gateway and wires events into the pipeline.
//!
//! - [`inbound`]: deciding whether a message is for the bot and cleaning it
//! - [`handler`]: gateway events (`ready`, `message`, `/create`)
//! - [`send`]: chunked replies with typing simulation and image uploads

pub mod handler;
pub mod inbound;
pub mod send;

use anyhow::{bail, Context, Result};
use serenity::all::GatewayIntents;
use serenity::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::api::metrics::spawn_metrics_log;
use crate::state::AppState;

const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(300);

/// Run the bot until the gateway closes, Ctrl-C is pressed or the owner sends
/// `!shutdown`. Context is flushed on the way out.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let token = state.config.discord.token.clone();
    if token.trim().is_empty() {
        bail!("no Discord token configured (set DISCORD_TOKEN or discord.token)");
    }

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let shutdown = Arc::new(Notify::new());
    let mut client = Client::builder(&token, intents)
        .event_handler(handler::Handler::new(Arc::clone(&state), Arc::clone(&shutdown)))
        .await
        .context("failed to create Discord client")?;

    let persistence = state.contexts.spawn_persistence(Duration::from_secs(
        state.config.context.persist_interval_secs,
    ));
    let metrics = spawn_metrics_log(
        state.api_metrics.clone(),
        state.bot_metrics.clone(),
        METRICS_LOG_INTERVAL,
    );

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                    return;
                }
            }
            _ = shutdown.notified() => {}
        }
        tracing::info!("shutting down");
        shard_manager.shutdown_all().await;
    });

    tracing::info!("connecting to Discord");
    let result = client.start().await;

    persistence.abort();
    metrics.abort();
    let saved = state.contexts.persist_all().await;
    tracing::info!(channels = saved, "context flushed");

    result.context("Discord client stopped with an error")
}
