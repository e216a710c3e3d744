//! Deciding whether a Discord message is addressed to the bot, and cleaning it.

use regex::Regex;
use std::sync::LazyLock;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?\d+>").expect("valid mention regex"));

/// Owner-only command that stops the bot.
pub const SHUTDOWN_COMMAND: &str = "!shutdown";

/// Facts about a message needed to decide whether to answer it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Addressing<'a> {
    pub content: &'a str,
    pub from_self: bool,
    pub from_bot: bool,
    pub mentions_bot: bool,
    pub is_dm: bool,
}

/// Answer when the author is a human other than us, and the bot is mentioned,
/// or the message is a DM, or it starts with the bot's name.
pub fn addressed_to_bot(msg: &Addressing<'_>, bot_name: &str, respond_in_dms: bool) -> bool {
    if msg.from_self || msg.from_bot {
        return false;
    }
    msg.mentions_bot || (msg.is_dm && respond_in_dms) || starts_with_name(msg.content, bot_name)
}

fn starts_with_name(content: &str, bot_name: &str) -> bool {
    let content = content.trim_start();
    !bot_name.is_empty()
        && content
            .get(..bot_name.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(bot_name))
}

/// Whether `content` is the shutdown command sent by the bot owner.
pub fn is_shutdown_request(content: &str, author_id: u64, owner_id: Option<u64>) -> bool {
    content.trim() == SHUTDOWN_COMMAND && owner_id == Some(author_id)
}

/// Strip mentions, collapse whitespace and drop a leading bot name.
pub fn clean_prompt(content: &str, bot_name: &str) -> String {
    let without_mentions = MENTION_RE.replace_all(content, "");
    let collapsed = without_mentions.split_whitespace().collect::<Vec<_>>().join(" ");
    if starts_with_name(&collapsed, bot_name) {
        collapsed[bot_name.len()..]
            .trim_start_matches([',', ':', '!'])
            .trim()
            .to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str) -> Addressing<'_> {
        Addressing {
            content,
            ..Default::default()
        }
    }

    #[test]
    fn ignores_self_and_bots() {
        let own = Addressing {
            from_self: true,
            mentions_bot: true,
            ..msg("cleo hi")
        };
        assert!(!addressed_to_bot(&own, "cleo", true));

        let bot = Addressing {
            from_bot: true,
            is_dm: true,
            ..msg("cleo hi")
        };
        assert!(!addressed_to_bot(&bot, "cleo", true));
    }

    #[test]
    fn answers_mentions_dms_and_name_prefix() {
        let mention = Addressing {
            mentions_bot: true,
            ..msg("<@42> hello")
        };
        assert!(addressed_to_bot(&mention, "cleo", true));

        let dm = Addressing {
            is_dm: true,
            ..msg("hello")
        };
        assert!(addressed_to_bot(&dm, "cleo", true));
        assert!(!addressed_to_bot(&dm, "cleo", false));

        assert!(addressed_to_bot(&msg("Cleo, what's up?"), "cleo", true));
        assert!(!addressed_to_bot(&msg("hello everyone"), "cleo", true));
    }

    #[test]
    fn clean_prompt_strips_noise() {
        assert_eq!(clean_prompt("<@42>   tell me   a joke", "cleo"), "tell me a joke");
        assert_eq!(clean_prompt("CLEO, how are you?", "cleo"), "how are you?");
        assert_eq!(clean_prompt("<@!42> cleo", "cleo"), "");
        assert_eq!(clean_prompt("clear skies today", "cleo"), "clear skies today");
    }

    #[test]
    fn shutdown_is_owner_only() {
        assert!(is_shutdown_request("!shutdown", 7, Some(7)));
        assert!(is_shutdown_request("  !shutdown \n", 7, Some(7)));
        assert!(!is_shutdown_request("!shutdown", 8, Some(7)));
        assert!(!is_shutdown_request("!shutdown", 7, None));
        assert!(!is_shutdown_request("!shutdown now", 7, Some(7)));
    }
}
