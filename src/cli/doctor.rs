//! CLI `doctor` command: check configuration and storage and print a report.

use anyhow::{Context, Result};

use crate::config::{CleoConfig, ContextBackend};
use crate::context::store::{ContextStore, JsonContextStore};
use crate::db;

/// Print configuration and storage diagnostics.
pub fn doctor(config: &CleoConfig) -> Result<()> {
    println!("Cleo Health Report");
    println!("==================");
    println!();
    println!("Credentials:");
    println!("  Discord token:   {}", presence(&config.discord.token));
    println!("  Completion key:  {}", presence(&config.completion.api_key));
    println!("  Image key:       {}", presence(&config.image.api_key));
    println!();
    println!("Completion:");
    println!("  Endpoint:        {}", config.completion.base_url);
    println!("  Model:           {}", config.completion.model);
    println!("  Rate limit:      {}/min", config.rate_limit.requests_per_minute);
    println!();
    println!("Context:");
    println!("  Backend:         {:?}", config.context.backend);
    println!("  Capacity:        {} messages", config.context.max_messages);
    println!("  Decay window:    {}s", config.context.decay_window_secs);

    match config.context.backend {
        ContextBackend::Sqlite => sqlite_report(config)?,
        ContextBackend::Json => json_report(config)?,
    }

    let notes_dir = config.resolved_notes_dir();
    let note_files = std::fs::read_dir(&notes_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().ends_with("_notes.json"))
                .count()
        })
        .unwrap_or(0);
    println!();
    println!("Notes:");
    println!("  Directory:       {}", notes_dir.display());
    println!("  Users:           {note_files}");

    Ok(())
}

fn sqlite_report(config: &CleoConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    if !db_path.exists() {
        println!("  Database:        not found at {}", db_path.display());
        println!("  Run `cleo serve` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("  Database:        {}", db_path.display());
    println!("  File size:       {}", format_bytes(file_size));
    println!("  Schema version:  {}", report.schema_version);
    println!("  Channels:        {}", report.conversation_count);
    println!("  Messages:        {}", report.message_count);
    if report.integrity_ok {
        println!("  Integrity check: PASSED");
    } else {
        println!("  Integrity check: FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Stop the bot and move the database aside: mv {} {}.bak", db_path.display(), db_path.display());
        println!("  2. Restart; context starts empty and refills as people talk.");
    }
    Ok(())
}

fn json_report(config: &CleoConfig) -> Result<()> {
    let dir = config.resolved_context_dir();
    let store = JsonContextStore::new(&dir)?;
    let channels = store.channels()?;
    let mut unreadable = 0;
    for channel in &channels {
        if let Err(e) = store.load(channel, config.context.max_messages) {
            unreadable += 1;
            println!("  WARNING: {channel}: {e:#}");
        }
    }
    println!("  Directory:       {}", dir.display());
    println!("  Channels:        {}", channels.len());
    println!("  Unreadable:      {unreadable}");
    Ok(())
}

fn presence(value: &str) -> &'static str {
    if value.trim().is_empty() {
        "MISSING"
    } else {
        "set"
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn doctor_runs_against_empty_data_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = CleoConfig::default();
        config.context.db_path = tmp.path().join("context.db").to_string_lossy().into_owned();
        config.notes.dir = tmp.path().join("notes").to_string_lossy().into_owned();
        doctor(&config).unwrap();

        config.context.backend = ContextBackend::Json;
        config.context.data_dir = tmp.path().join("context").to_string_lossy().into_owned();
        doctor(&config).unwrap();
    }
}
