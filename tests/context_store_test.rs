mod helpers;

use chrono::{Duration as ChronoDuration, Utc};
use cleo::context::registry::ContextRegistry;
use cleo::context::store::{create_store, ContextStore, JsonContextStore, SqliteContextStore};
use cleo::context::types::{Message, Role};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const WINDOW: Duration = Duration::from_secs(4 * 3600);

fn conversation(len: usize) -> Vec<Message> {
    let base = Utc::now() - ChronoDuration::minutes(len as i64);
    (0..len)
        .map(|i| {
            let message = if i % 2 == 0 {
                Message::user(format!("question {i}"), "1001")
            } else {
                Message::assistant(format!("answer {i}"))
            };
            message.at(base + ChronoDuration::minutes(i as i64))
        })
        .collect()
}

#[test]
fn sqlite_store_keeps_newest_messages_in_order() {
    let store = SqliteContextStore::new(helpers::test_db());
    let messages = conversation(10);
    store.save("555", &messages).unwrap();

    let loaded = store.load("555", 4).unwrap();
    assert_eq!(loaded, messages[6..].to_vec());
    assert_eq!(loaded[0].content, "question 6");
    assert_eq!(loaded[3].role, Role::Assistant);
}

#[test]
fn sqlite_save_replaces_previous_snapshot() {
    let store = SqliteContextStore::new(helpers::test_db());
    store.save("555", &conversation(6)).unwrap();
    store.save("555", &conversation(2)).unwrap();

    assert_eq!(store.load("555", 50).unwrap().len(), 2);
    assert_eq!(store.channels().unwrap(), vec!["555".to_string()]);
}

#[test]
fn json_store_writes_one_file_per_channel() {
    let tmp = TempDir::new().unwrap();
    let store = JsonContextStore::new(tmp.path()).unwrap();
    store.save("111", &conversation(3)).unwrap();
    store.save("222", &conversation(1)).unwrap();

    assert!(tmp.path().join("context_111.json").exists());
    assert!(tmp.path().join("context_222.json").exists());
    assert_eq!(
        store.channels().unwrap(),
        vec!["111".to_string(), "222".to_string()]
    );
    assert!(store.load("333", 50).unwrap().is_empty());
}

#[test]
fn create_store_follows_backend_setting() {
    let tmp = TempDir::new().unwrap();
    let mut config = helpers::test_config(tmp.path(), "http://127.0.0.1:9");

    let json = create_store(&config).unwrap();
    json.save("7", &conversation(1)).unwrap();
    assert!(config.resolved_context_dir().join("context_7.json").exists());

    config.context.backend = cleo::config::ContextBackend::Sqlite;
    let sqlite = create_store(&config).unwrap();
    sqlite.save("7", &conversation(1)).unwrap();
    assert!(config.resolved_db_path().exists());
}

#[tokio::test]
async fn registry_history_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("context.db");

    {
        let store: Arc<dyn ContextStore> =
            Arc::new(SqliteContextStore::new(cleo::db::open_database(&db_path).unwrap()));
        let registry = ContextRegistry::new(store, 50, WINDOW);
        registry.append("900", Message::user("i love science and music", "42")).await;
        registry.append("900", Message::assistant("the stars are great")).await;
        assert_eq!(registry.persist_all().await, 1);
    }

    let store: Arc<dyn ContextStore> =
        Arc::new(SqliteContextStore::new(cleo::db::open_database(&db_path).unwrap()));
    let registry = ContextRegistry::new(store, 50, WINDOW);

    let snapshot = registry.snapshot("900").await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].user_id.as_deref(), Some("42"));
    assert_eq!(
        registry.last_assistant_reply("900").await.as_deref(),
        Some("the stars are great")
    );
    let profile = registry.profile("900", "42").await.unwrap();
    assert!(profile.interests.contains("science"));
}

#[tokio::test]
async fn registry_hides_messages_outside_window() {
    let store: Arc<dyn ContextStore> = Arc::new(SqliteContextStore::new(helpers::test_db()));
    let registry = ContextRegistry::new(store, 50, WINDOW);

    let stale = Message::user("old news", "42").at(Utc::now() - ChronoDuration::hours(5));
    registry.append("901", stale).await;
    registry.append("901", Message::user("fresh news", "42")).await;

    let relevant = registry.relevant("901").await;
    assert_eq!(relevant.len(), 1);
    assert_eq!(relevant[0].content, "fresh news");
    assert!(relevant[0].relevance > 0.9);
    assert_eq!(registry.snapshot("901").await.len(), 2);
}

#[tokio::test]
async fn registry_caps_history_at_capacity() {
    let store: Arc<dyn ContextStore> = Arc::new(SqliteContextStore::new(helpers::test_db()));
    let registry = ContextRegistry::new(store, 5, WINDOW);

    for message in conversation(12) {
        registry.append("902", message).await;
    }

    let snapshot = registry.snapshot("902").await;
    assert_eq!(snapshot.len(), 5);
    assert_eq!(snapshot[0].content, "answer 7");
}
