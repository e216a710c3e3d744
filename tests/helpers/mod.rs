#![allow(dead_code)]

use cleo::config::{CleoConfig, ContextBackend};
use cleo::db;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::Path;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// A config that keeps every file under `dir` and talks to `server_uri` for
/// both completions and images. Length classification, metaprompts and
/// thought chains are off so each message costs exactly one request.
pub fn test_config(dir: &Path, server_uri: &str) -> CleoConfig {
    let mut config = CleoConfig::default();
    config.context.backend = ContextBackend::Json;
    config.context.data_dir = dir.join("context").to_string_lossy().into_owned();
    config.context.db_path = dir.join("context.db").to_string_lossy().into_owned();
    config.notes.dir = dir.join("user_notes").to_string_lossy().into_owned();

    config.completion.base_url = server_uri.to_string();
    config.completion.api_key = "test-key".into();
    config.completion.max_retries = 2;
    config.completion.base_delay_ms = 1;
    config.completion.timeout_secs = 5;
    config.completion.classify_length = false;
    config.completion.metaprompt = false;

    config.image.url = format!("{server_uri}/image/generation");
    config.image.api_key = "image-key".into();
    config.image.timeout_secs = 5;

    config.thought_chain.enabled = false;
    config.validate().unwrap();
    config
}

/// A chat-completion response body whose first choice says `content`.
pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}
