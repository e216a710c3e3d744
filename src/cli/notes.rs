//! CLI `notes` command: list what the bot remembers about a user.

use crate::config::CleoConfig;
use crate::notes::NotesStore;

pub async fn show_notes(config: &CleoConfig, user_id: &str) {
    let store = NotesStore::new(config.resolved_notes_dir());
    let notes = store.get_user_notes(user_id).await;
    if notes.is_empty() {
        println!("No notes for user {user_id}.");
        return;
    }

    println!("Notes for user {user_id}");
    println!("{}", "=".repeat(50));
    for note in &notes {
        println!("[{}] {}", note.timestamp.format("%Y-%m-%d %H:%M"), note.content);
    }
}
