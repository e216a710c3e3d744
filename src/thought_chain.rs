//! Delayed follow-up messages after a reply.
//!
//! When a message contains a trigger ("why", "imagine", a question mark...)
//! a chain may start with a probability that grows with the message's
//! complexity. A started chain schedules one or more follow-ups, each built
//! from a reprompt template quoting the previous response. Chains are
//! rate-limited per channel by a cooldown measured from the last chain start.

use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

use crate::config::{ThoughtChainConfig, MAX_FOLLOW_UPS};
use crate::prompts;

const TRIGGERS: &[&str] = &["why", "how", "what if", "imagine", "think", "?", "..."];

const INTERRUPTIONS: &[&str] = &[
    "... wait, actually, ",
    "... oh! And ",
    "... hold on, ",
    "... you know what? ",
];

static CONJUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:and|but|so|because)\b").expect("valid conjunction regex"));

#[derive(Debug, Clone)]
struct Chain {
    last_response: String,
    remaining: usize,
}

#[derive(Default)]
struct ChainState {
    active: HashMap<String, Chain>,
    last_start: HashMap<String, Instant>,
}

pub struct ThoughtChainManager {
    config: ThoughtChainConfig,
    state: Mutex<ChainState>,
}

/// Number of distinct triggers found in `message`.
pub fn trigger_count(message: &str) -> usize {
    let lowered = message.to_lowercase();
    TRIGGERS.iter().filter(|t| lowered.contains(*t)).count()
}

impl ThoughtChainManager {
    pub fn new(config: ThoughtChainConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Chance of starting a chain for `message`; zero without a trigger.
    pub fn start_probability(&self, message: &str) -> f64 {
        let triggers = trigger_count(message);
        if triggers == 0 || !self.config.enabled {
            return 0.0;
        }
        let words = message.split_whitespace().count() as f64;
        let p = self.config.base_probability + 0.1 * (triggers - 1) as f64 + words / 200.0;
        p.min(self.config.max_probability).clamp(0.0, 1.0)
    }

    /// Possibly start a chain in `channel_id`. Returns the number of follow-ups
    /// to send, or `None` when no chain was started.
    pub fn maybe_start_chain<R: Rng>(
        &self,
        channel_id: &str,
        message: &str,
        response: &str,
        now: Instant,
        rng: &mut R,
    ) -> Option<usize> {
        let mut state = self.state.lock().ok()?;

        if let Some(&last) = state.last_start.get(channel_id) {
            if now.saturating_duration_since(last) < Duration::from_secs(self.config.cooldown_secs) {
                return None;
            }
        }

        let probability = self.start_probability(message);
        if probability <= 0.0 || rng.random::<f64>() >= probability {
            return None;
        }

        let follow_ups = rng.random_range(1..=self.config.max_follow_ups.clamp(1, MAX_FOLLOW_UPS));
        state.active.insert(
            channel_id.to_string(),
            Chain {
                last_response: response.to_string(),
                remaining: follow_ups,
            },
        );
        state.last_start.insert(channel_id.to_string(), now);
        tracing::debug!(channel = %channel_id, follow_ups, probability, "thought chain started");
        Some(follow_ups)
    }

    /// Prompt for the next follow-up, or `None` when no chain is active.
    pub fn follow_up_prompt<R: Rng>(&self, channel_id: &str, rng: &mut R) -> Option<String> {
        let state = self.state.lock().ok()?;
        let chain = state.active.get(channel_id)?;
        let template = prompts::REPROMPT_TEMPLATES.choose(rng)?;
        Some(format!(
            "{}\n\n{}",
            prompts::render(template, &chain.last_response),
            prompts::CHAIN_OF_THOUGHT_INSTRUCTION
        ))
    }

    /// Record a follow-up response; the chain ends once its follow-ups are used.
    pub fn update_chain(&self, channel_id: &str, response: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let finished = match state.active.get_mut(channel_id) {
            Some(chain) => {
                chain.last_response = response.to_string();
                chain.remaining = chain.remaining.saturating_sub(1);
                chain.remaining == 0
            }
            None => false,
        };
        if finished {
            state.active.remove(channel_id);
            tracing::debug!(channel = %channel_id, "thought chain finished");
        }
    }

    /// Drop an active chain, e.g. after a failed follow-up.
    pub fn end_chain(&self, channel_id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.active.remove(channel_id);
        }
    }

    pub fn is_active(&self, channel_id: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.active.contains_key(channel_id))
            .unwrap_or(false)
    }

    /// Uniform delay before a follow-up.
    pub fn follow_up_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let min = self.config.min_delay_secs;
        let max = self.config.max_delay_secs.max(min);
        Duration::from_secs(rng.random_range(min..=max))
    }

    /// With the configured probability, insert a self-interruption before a
    /// random conjunction in `text`.
    pub fn interrupt<R: Rng>(&self, text: &str, rng: &mut R) -> String {
        let points: Vec<usize> = CONJUNCTION_RE.find_iter(text).map(|m| m.start()).collect();
        if points.is_empty() || rng.random::<f64>() >= self.config.interruption_probability {
            return text.to_string();
        }
        let (Some(&point), Some(phrase)) = (points.choose(rng), INTERRUPTIONS.choose(rng)) else {
            return text.to_string();
        };
        format!("{}{}{}", &text[..point], phrase, &text[point..])
    }
}
