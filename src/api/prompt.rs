//! Assembly of the message list sent to the completion endpoint.
//!
//! Order: system prompt (with known user interests), the most recent relevant
//! context, the user-notes summary, the optional reflection on the previous
//! reply, then the new user prompt last.

use rand::seq::IndexedRandom;
use rand::Rng;

use super::types::ChatMessage;
use crate::context::types::ScoredMessage;
use crate::prompts;

#[derive(Debug, Default)]
pub struct PromptParts<'a> {
    pub system_prompt: &'a str,
    pub interests: Vec<String>,
    pub context: &'a [ScoredMessage],
    /// How many of the newest context messages to include.
    pub context_limit: usize,
    pub notes_summary: Option<String>,
    pub metaprompt: Option<String>,
    pub prompt: &'a str,
}

pub fn build_messages(parts: &PromptParts<'_>) -> Vec<ChatMessage> {
    let mut system = parts.system_prompt.trim().to_string();
    if !parts.interests.is_empty() {
        system.push_str("\n\nUser's interests: ");
        system.push_str(&parts.interests.join(", "));
    }

    let mut messages = vec![ChatMessage::system(system)];

    let start = parts.context.len().saturating_sub(parts.context_limit);
    messages.extend(
        parts.context[start..]
            .iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.clone(),
            }),
    );

    if let Some(notes) = &parts.notes_summary {
        messages.push(ChatMessage::system(notes.clone()));
    }
    if let Some(metaprompt) = &parts.metaprompt {
        messages.push(ChatMessage::system(metaprompt.clone()));
    }

    messages.push(ChatMessage::user(parts.prompt));
    messages
}

/// A randomly chosen reflection on `last_reply` with the fresh-insights reminder.
pub fn metaprompt<R: Rng>(rng: &mut R, last_reply: &str) -> Option<String> {
    let template = prompts::METAPROMPT_TEMPLATES.choose(rng)?;
    Some(format!(
        "{}\n\n{}",
        prompts::render(template, last_reply),
        prompts::FRESH_INSIGHTS_REMINDER
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::types::{Message, Role};

    fn scored(content: &str, role: Role) -> ScoredMessage {
        let message = match role {
            Role::Assistant => Message::assistant(content),
            _ => Message::user(content, "u1"),
        };
        ScoredMessage::new(&message, 1.0)
    }

    #[test]
    fn messages_follow_fixed_order() {
        let context = vec![
            scored("old", Role::User),
            scored("older reply", Role::Assistant),
            scored("recent", Role::User),
            scored("recent reply", Role::Assistant),
        ];
        let parts = PromptParts {
            system_prompt: "you are cleo",
            interests: vec!["music".into(), "science".into()],
            context: &context,
            context_limit: 2,
            notes_summary: Some("Previous notes about this user:\n- likes jazz".into()),
            metaprompt: Some("reflect".into()),
            prompt: "what's new?",
        };

        let messages = build_messages(&parts);
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            messages[0].content,
            "you are cleo\n\nUser's interests: music, science"
        );
        assert_eq!(messages[1].content, "recent");
        assert_eq!(messages[2].role, Role::Assistant);
        assert!(messages[3].content.contains("likes jazz"));
        assert_eq!(messages[4].content, "reflect");
        assert_eq!(messages[5], ChatMessage::user("what's new?"));
    }

    #[test]
    fn minimal_prompt_is_system_then_user() {
        let parts = PromptParts {
            system_prompt: "sys",
            prompt: "hi",
            ..Default::default()
        };
        let messages = build_messages(&parts);
        assert_eq!(messages, vec![ChatMessage::system("sys"), ChatMessage::user("hi")]);
    }

    #[test]
    fn metaprompt_quotes_last_reply() {
        let mut rng = rand::rng();
        let text = metaprompt(&mut rng, "cats are great").unwrap();
        assert!(text.contains("\"cats are great\""));
        assert!(text.ends_with(prompts::FRESH_INSIGHTS_REMINDER));
    }
}
