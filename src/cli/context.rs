//! CLI `context` command: show a channel's stored history.

use anyhow::Result;
use chrono::Utc;

use crate::config::CleoConfig;
use crate::context::manager::ConversationManager;
use crate::context::store;

/// Print the relevant messages of a channel with their scores, or every stored
/// message when `all` is set.
pub fn show_context(config: &CleoConfig, channel_id: &str, all: bool) -> Result<()> {
    let store = store::create_store(config)?;
    let history = store.load(channel_id, config.context.max_messages)?;
    if history.is_empty() {
        println!("No stored context for channel {channel_id}.");
        return Ok(());
    }

    let manager = ConversationManager::restore(
        channel_id,
        config.context.max_messages,
        config.decay_window(),
        history,
    );
    let now = Utc::now();

    println!("Channel {channel_id}");
    println!("{}", "=".repeat(50));

    if all {
        let relevant = manager.relevant(now);
        for message in manager.snapshot() {
            let score = relevant
                .iter()
                .find(|s| s.timestamp == message.timestamp && s.content == message.content)
                .map(|s| format!("{:.2}", s.relevance))
                .unwrap_or_else(|| "expired".into());
            println!(
                "[{}] {:<9} {:>7}  {}",
                message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                message.role.as_str(),
                score,
                preview(&message.content)
            );
        }
        println!();
        println!("{} stored, {} relevant", manager.len(), relevant.len());
    } else {
        let relevant = manager.relevant(now);
        for scored in &relevant {
            println!(
                "[{}] {:<9} {:>7.2}  {}",
                scored.timestamp.format("%Y-%m-%d %H:%M:%S"),
                scored.role.as_str(),
                scored.relevance,
                preview(&scored.content)
            );
        }
        println!();
        println!("{} relevant of {} stored", relevant.len(), manager.len());
    }
    Ok(())
}

fn preview(content: &str) -> String {
    let line = content.replace('\n', " ");
    if line.chars().count() > 80 {
        format!("{}...", line.chars().take(77).collect::<String>())
    } else {
        line
    }
}
