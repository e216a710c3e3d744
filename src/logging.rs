//! Tracing setup: console output on stderr plus an optional plain-text log file.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Libraries that are noisy at `info`.
const QUIET_DIRECTIVES: &[&str] = &[
    "serenity=warn",
    "tracing::span=warn",
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "rustls=warn",
    "h2=warn",
];

/// Filter for the configured level with the library directives appended.
/// An unparseable level falls back to `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    let directives = std::iter::once(level)
        .chain(QUIET_DIRECTIVES.iter().copied())
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_tracing(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(build_filter(&config.level));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file = config
        .file
        .as_deref()
        .map(crate::config::expand_tilde)
        .and_then(|path| open_log_file(&path));

    match file {
        Some(file) => {
            let file_layer = fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false);
            registry.with(console_layer).with(file_layer).init();
        }
        None => registry.with(console_layer).init(),
    }
}

fn open_log_file(path: &Path) -> Option<std::fs::File> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("failed to open log file {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_includes_quiet_directives() {
        let filter = build_filter("debug").to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("serenity=warn"));
    }
}
