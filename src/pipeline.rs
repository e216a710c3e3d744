//! Message handling independent of Discord.
//!
//! [`respond`] turns a cleaned user prompt into a [`Reply`]: it reads the
//! channel context, the author's notes and emotional state, calls the
//! completion endpoint and post-processes the result. [`follow_up`] produces
//! one thought-chain continuation. The bot layer only sends what these return.

use std::time::Instant;

use crate::api::prompt;
use crate::api::CompletionOptions;
use crate::context::types::Message;
use crate::notes::extract_user_notes;
use crate::reply;
use crate::state::AppState;

pub const NO_RESPONSE_FALLBACK: &str = "i'm thinking about how to respond to that...";
pub const ERROR_FALLBACK: &str = "i encountered an error. please try again.";
pub const IMAGE_FALLBACK: &str = "oops! something went wrong generating that image 😅";
pub const GREETING: &str = "hey! what's on your mind? 😊";

/// A message addressed to the bot, already stripped of mentions and the bot name.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub channel_id: String,
    pub user_id: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    /// Cleaned reply text.
    pub text: String,
    pub image_prompts: Vec<String>,
    /// Follow-ups scheduled by a newly started thought chain.
    pub follow_ups: Option<usize>,
}

impl Reply {
    fn fallback(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    /// Pieces to send, each within `limit` characters, trimmed and non-empty.
    pub fn chunks(&self, limit: usize) -> Vec<&str> {
        reply::chunk_text(&self.text, limit)
            .into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Generate the reply to one inbound message and record both sides in the
/// channel context.
pub async fn respond(state: &AppState, inbound: &Inbound) -> Reply {
    let start = Instant::now();
    let config = &state.config;

    if inbound.prompt.trim().is_empty() {
        return Reply::fallback(GREETING);
    }

    // 1. Read context before the new message joins it
    let context = state.contexts.relevant(&inbound.channel_id).await;
    let last_reply = state.contexts.last_assistant_reply(&inbound.channel_id).await;
    state
        .contexts
        .append(
            &inbound.channel_id,
            Message::user(&inbound.prompt, &inbound.user_id),
        )
        .await;

    // 2. Per-user state
    let interests = state
        .contexts
        .profile(&inbound.channel_id, &inbound.user_id)
        .await
        .map(|p| p.interests.into_iter().collect())
        .unwrap_or_default();
    let notes = state.notes.get_user_notes(&inbound.user_id).await;
    let sampling = state.emotions.observe(&inbound.user_id, &inbound.prompt);
    let metaprompt = match (&last_reply, config.completion.metaprompt) {
        (Some(last), true) => prompt::metaprompt(&mut rand::rng(), last),
        _ => None,
    };

    // 3. Completion
    let options = CompletionOptions {
        system_prompt: config.system_prompt().to_string(),
        interests,
        metaprompt,
        sampling,
        max_tokens: None,
        prompt_notes: config.notes.prompt_notes,
    };
    let Some(raw) = state
        .completion
        .complete(&inbound.prompt, &context, &notes, &options)
        .await
    else {
        state.bot_metrics.increment_errors();
        return Reply::fallback(NO_RESPONSE_FALLBACK);
    };

    // 4. Post-process and remember
    let (text, new_notes) = extract_user_notes(&raw);
    for note in &new_notes {
        state.notes.add_note(&inbound.user_id, note).await;
    }
    let cleaned = reply::clean(&text, config.reply.max_emoji);
    if cleaned.text.is_empty() && cleaned.image_prompts.is_empty() {
        return Reply::fallback(NO_RESPONSE_FALLBACK);
    }
    if !cleaned.text.is_empty() {
        state
            .contexts
            .append(&inbound.channel_id, Message::assistant(&cleaned.text))
            .await;
    }

    let follow_ups = state.chains.maybe_start_chain(
        &inbound.channel_id,
        &inbound.prompt,
        &cleaned.text,
        Instant::now(),
        &mut rand::rng(),
    );

    tracing::info!(
        channel = %inbound.channel_id,
        user = %inbound.user_id,
        elapsed_ms = start.elapsed().as_millis() as u64,
        notes = new_notes.len(),
        images = cleaned.image_prompts.len(),
        follow_ups = follow_ups.unwrap_or(0),
        "message processed"
    );

    Reply {
        text: cleaned.text,
        image_prompts: cleaned.image_prompts,
        follow_ups,
    }
}

/// Produce the next thought-chain follow-up for a channel, or `None` when
/// the chain is over or the completion failed.
pub async fn follow_up(state: &AppState, channel_id: &str, user_id: &str) -> Option<Reply> {
    let config = &state.config;
    let Some(follow_up_prompt) = state.chains.follow_up_prompt(channel_id, &mut rand::rng()) else {
        tracing::debug!(channel = %channel_id, "no active thought chain");
        return None;
    };

    let context = state.contexts.relevant(channel_id).await;
    let notes = state.notes.get_user_notes(user_id).await;
    let options = CompletionOptions {
        system_prompt: config.system_prompt().to_string(),
        sampling: state.emotions.state(user_id).sampling(),
        max_tokens: Some(config.completion.follow_up_max_tokens),
        prompt_notes: config.notes.prompt_notes,
        ..CompletionOptions::default()
    };

    let Some(raw) = state
        .completion
        .complete(&follow_up_prompt, &context, &notes, &options)
        .await
    else {
        tracing::warn!(channel = %channel_id, "follow-up completion failed, ending chain");
        state.chains.end_chain(channel_id);
        return None;
    };

    let (text, new_notes) = extract_user_notes(&raw);
    for note in &new_notes {
        state.notes.add_note(user_id, note).await;
    }
    let cleaned = reply::clean(&text, config.reply.max_emoji);
    if cleaned.text.is_empty() {
        state.chains.end_chain(channel_id);
        return None;
    }

    let text = state.chains.interrupt(&cleaned.text, &mut rand::rng());
    state
        .contexts
        .append(channel_id, Message::assistant(&text))
        .await;
    state.chains.update_chain(channel_id, &text);

    Some(Reply {
        text,
        image_prompts: cleaned.image_prompts,
        follow_ups: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_trimmed_and_skip_blank_pieces() {
        let reply = Reply {
            text: "first paragraph.\n\n\n\nsecond paragraph.".into(),
            ..Reply::default()
        };
        assert_eq!(reply.chunks(1900), vec!["first paragraph.", "second paragraph."]);
    }

    #[test]
    fn chunks_stay_within_limit() {
        let reply = Reply {
            text: "word ".repeat(1000),
            ..Reply::default()
        };
        let chunks = reply.chunks(100);
        assert!(chunks.len() >= 50);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }
}
