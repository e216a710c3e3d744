use cleo::notes::{notes_summary, NotesStore, UserNote};
use tempfile::TempDir;

#[tokio::test]
async fn added_note_is_the_newest() {
    let tmp = TempDir::new().unwrap();
    let store = NotesStore::new(tmp.path());

    store.add_note("1001", "likes jazz").await;
    store.add_note("1001", "lives in Oslo").await;

    let notes = store.get_user_notes("1001").await;
    assert_eq!(notes.len(), 2);
    assert_eq!(notes.last().unwrap().content, "lives in Oslo");
    assert!(notes[0].timestamp <= notes[1].timestamp);
}

#[tokio::test]
async fn notes_persist_across_stores() {
    let tmp = TempDir::new().unwrap();
    NotesStore::new(tmp.path()).add_note("1001", "likes jazz").await;

    assert!(tmp.path().join("1001_notes.json").exists());
    let reopened = NotesStore::new(tmp.path());
    let notes = reopened.get_user_notes("1001").await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "likes jazz");
}

#[tokio::test]
async fn notes_file_is_a_json_array() {
    let tmp = TempDir::new().unwrap();
    NotesStore::new(tmp.path()).add_note("7", "has a dog").await;

    let contents = std::fs::read_to_string(tmp.path().join("7_notes.json")).unwrap();
    let parsed: Vec<UserNote> = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed[0].content, "has a dog");
}

#[tokio::test]
async fn unknown_user_has_no_notes() {
    let tmp = TempDir::new().unwrap();
    let store = NotesStore::new(tmp.path().join("never_created"));
    assert!(store.get_user_notes("1001").await.is_empty());
}

#[tokio::test]
async fn corrupt_file_reads_as_empty() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("1001_notes.json"), "{not json").unwrap();

    let store = NotesStore::new(tmp.path());
    assert!(store.get_user_notes("1001").await.is_empty());
}

#[tokio::test]
async fn path_like_user_ids_are_refused() {
    let tmp = TempDir::new().unwrap();
    let store = NotesStore::new(tmp.path().join("notes"));

    store.add_note("../escape", "nope").await;

    assert!(!tmp.path().join("escape_notes.json").exists());
    assert!(store.get_user_notes("../escape").await.is_empty());
}

#[tokio::test]
async fn summary_lists_newest_notes() {
    let tmp = TempDir::new().unwrap();
    let store = NotesStore::new(tmp.path());
    for note in ["one", "two", "three"] {
        store.add_note("5", note).await;
    }

    let notes = store.get_user_notes("5").await;
    let summary = notes_summary(&notes, 2).unwrap();
    assert_eq!(summary, "Previous notes about this user:\n- two\n- three");
}
