//! Post-processing of model output before it is sent to Discord.
//!
//! [`clean`] strips control markers and image tags, drops filler interjections,
//! and caps the number of emoji. [`chunk_text`] then splits the cleaned text
//! into pieces that each fit in one Discord message. Chunks are contiguous
//! slices of the input, so concatenating them gives back the cleaned text.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|end\|>|<end>|<@!?\d+>").expect("valid marker regex"));

static IMAGE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<generate_image>(.*?)</generate_image>").expect("valid image tag regex")
});

static FILLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:You know|Haha|Well),[ \t]*").expect("valid filler regex"));

static HORIZONTAL_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid whitespace regex"));

static COMMA_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",([A-Za-z])").expect("valid comma regex"));

static SENTENCE_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z][.!?])([A-Z])").expect("valid sentence regex"));

/// Below this share of spaces a reply is probably missing word breaks.
const MIN_SPACE_RATIO: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanReply {
    pub text: String,
    /// Prompts from `<generate_image>` tags, in order of appearance.
    pub image_prompts: Vec<String>,
}

pub fn clean(raw: &str, max_emoji: usize) -> CleanReply {
    let text = strip_control_markers(raw);
    let (text, image_prompts) = extract_image_prompts(&text);
    let text = remove_filler(&text);
    let text = limit_emoji(&text, max_emoji);
    let text = HORIZONTAL_WS_RE.replace_all(&text, " ");
    CleanReply {
        text: text.trim().to_string(),
        image_prompts,
    }
}

/// Remove stop sequences and user mentions.
pub fn strip_control_markers(text: &str) -> String {
    MARKER_RE.replace_all(text, "").into_owned()
}

pub fn extract_image_prompts(text: &str) -> (String, Vec<String>) {
    let prompts = IMAGE_TAG_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    (IMAGE_TAG_RE.replace_all(text, "").into_owned(), prompts)
}

pub fn remove_filler(text: &str) -> String {
    FILLER_RE.replace_all(text, "").into_owned()
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32, 0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF)
}

/// Joiners and modifiers that belong to the preceding emoji.
fn is_emoji_modifier(c: char) -> bool {
    matches!(c as u32, 0x200D | 0xFE0F | 0x1F3FB..=0x1F3FF)
}

/// Keep the first `max` emoji and drop the rest along with their modifiers.
pub fn limit_emoji(text: &str, max: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut seen = 0;
    let mut dropping = false;
    let mut after_joiner = false;

    for c in text.chars() {
        if is_emoji_modifier(c) {
            after_joiner = c as u32 == 0x200D;
            if !dropping {
                out.push(c);
            }
            continue;
        }
        if is_emoji(c) {
            if after_joiner {
                // continuation of a joined sequence
                after_joiner = false;
                if !dropping {
                    out.push(c);
                }
                continue;
            }
            seen += 1;
            dropping = seen > max;
            if !dropping {
                out.push(c);
            }
            continue;
        }
        after_joiner = false;
        dropping = false;
        out.push(c);
    }
    out
}

/// Insert missing spaces after punctuation and collapse runs of spaces.
///
/// Newlines are preserved so paragraphs survive.
pub fn fix_spacing(text: &str) -> String {
    let text = COMMA_GAP_RE.replace_all(text, ", $1");
    let text = SENTENCE_GAP_RE.replace_all(&text, "$1 $2");
    let text = HORIZONTAL_WS_RE.replace_all(&text, " ");
    let text = text.trim().to_string();

    if !text.is_empty() {
        let spaces = text.chars().filter(|c| c.is_whitespace()).count();
        let ratio = spaces as f64 / text.chars().count() as f64;
        if ratio < MIN_SPACE_RATIO && text.chars().count() > 40 {
            tracing::warn!(ratio, "reply has unusually low space ratio");
        }
    }
    text
}

/// Split `text` into chunks of at most `limit` characters.
///
/// A blank line always ends a chunk. A paragraph longer than `limit` is cut at
/// the last sentence end inside the limit, else at the last whitespace, else
/// at exactly `limit` characters.
pub fn chunk_text(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let paragraph_end = paragraph_end(rest);
        let paragraph = &rest[..paragraph_end];
        let cut = if paragraph.chars().count() <= limit {
            paragraph_end
        } else {
            split_point(rest, limit)
        };
        chunks.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    chunks
}

/// Byte offset just past the first blank-line separator, or the end of `text`.
fn paragraph_end(text: &str) -> usize {
    let Some(start) = text.find("\n\n") else {
        return text.len();
    };
    let tail = &text[start..];
    let run = tail.len() - tail.trim_start_matches(['\n', ' ', '\t', '\r']).len();
    start + run
}

/// Best cut inside the first `limit` characters of `text`.
fn split_point(text: &str, limit: usize) -> usize {
    let window_end = text
        .char_indices()
        .nth(limit)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let window = &text[..window_end];

    let mut sentence_cut = None;
    let mut space_cut = None;
    let mut prev = None;
    for (i, c) in window.char_indices() {
        if c.is_whitespace() {
            let end = i + c.len_utf8();
            space_cut = Some(end);
            if matches!(prev, Some('.' | '!' | '?')) {
                sentence_cut = Some(end);
            }
        }
        prev = Some(c);
    }

    sentence_cut.or(space_cut).unwrap_or(window_end)
}

/// Simulated typing time for a chunk: `min(chars * ms_per_char, max_ms)`.
pub fn typing_delay(chars: usize, ms_per_char: u64, max_ms: u64) -> Duration {
    let ms = (chars as u64).saturating_mul(ms_per_char).min(max_ms);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_markers_and_tags() {
        let raw = "<@123> hey there!<|end|> <generate_image> a red fox </generate_image>look<end>";
        let reply = clean(raw, 2);
        assert_eq!(reply.text, "hey there! look");
        assert_eq!(reply.image_prompts, vec!["a red fox"]);
    }

    #[test]
    fn filler_is_removed() {
        assert_eq!(remove_filler("Well, i think so. Haha, yes."), "i think so. yes.");
        // only the interjection form with a comma
        assert_eq!(remove_filler("Wellness matters"), "Wellness matters");
    }

    #[test]
    fn emoji_beyond_limit_are_dropped() {
        assert_eq!(limit_emoji("a 😊 b ✨ c 🎉 d 🚀", 2), "a 😊 b ✨ c  d ");
        assert_eq!(limit_emoji("no emoji here!", 0), "no emoji here!");
        // joined sequences count once
        assert_eq!(limit_emoji("👩\u{200D}💻 🎉 🎉", 2), "👩\u{200D}💻 🎉 ");
    }

    #[test]
    fn fix_spacing_inserts_missing_spaces() {
        assert_eq!(fix_spacing("hello,world"), "hello, world");
        assert_eq!(fix_spacing("done.Next one"), "done. Next one");
        assert_eq!(fix_spacing("a  b\n\nc"), "a b\n\nc");
        // urls and numbers stay intact
        assert_eq!(fix_spacing("see example.com or 1,000"), "see example.com or 1,000");
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello there", 1900), vec!["hello there"]);
        assert!(chunk_text("", 1900).is_empty());
    }

    #[test]
    fn paragraphs_start_new_chunks() {
        let chunks = chunk_text("first para.\n\nsecond para.", 1900);
        assert_eq!(chunks, vec!["first para.\n\n", "second para."]);
    }

    #[test]
    fn long_paragraph_splits_at_sentence_end() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = chunk_text(text, 32);
        assert_eq!(chunks, vec!["One two three. Four five six. ", "Seven eight nine."]);
    }

    #[test]
    fn falls_back_to_whitespace_then_hard_cut() {
        let chunks = chunk_text("aaaa bbbb cccc", 7);
        assert_eq!(chunks, vec!["aaaa ", "bbbb ", "cccc"]);

        let chunks = chunk_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn chunks_are_lossless_and_bounded() {
        let text = "Lorem ipsum dolor sit amet. ".repeat(40)
            + "\n\n"
            + &"x".repeat(250)
            + "\n\nshort tail 😊 with emoji.";
        for limit in [10, 37, 100, 1900] {
            let chunks = chunk_text(&text, limit);
            assert_eq!(chunks.concat(), text);
            for chunk in &chunks {
                assert!(chunk.chars().count() <= limit, "{} > {limit}", chunk.chars().count());
                assert!(!chunk.is_empty());
            }
        }
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "é".repeat(10);
        let chunks = chunk_text(&text, 3);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn typing_delay_is_capped() {
        assert_eq!(typing_delay(50, 10, 1500), Duration::from_millis(500));
        assert_eq!(typing_delay(1900, 10, 1500), Duration::from_millis(1500));
    }
}
