//! Per-user emotional state used to tune sampling parameters.
//!
//! Every analysed message moves the user's mood by a keyword sentiment score
//! and nudges the other traits from simple cues, then decays those traits
//! toward zero. The state maps onto temperature, top-p and the penalties.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::types::Sampling;

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "fantastic", "amazing", "love", "happy", "wonderful", "best", "awesome",
];
const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "sad", "angry", "hate", "worst", "awful", "horrible", "disappoint",
];
const PLAYFUL_CUES: &[&str] = &["haha", "lol", "lmao", "😂", "🤣", "😜"];
const HEDGE_WORDS: &[&str] = &["maybe", "perhaps", "unsure", "idk", "guess"];

const TRAIT_DECAY: f64 = 0.95;
const NUDGE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionalState {
    pub engagement: f64,
    pub energy: f64,
    pub playfulness: f64,
    pub enthusiasm: f64,
    pub certainty: f64,
    pub curiosity: f64,
    pub mood: f64,
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self {
            engagement: 0.5,
            energy: 0.5,
            playfulness: 0.5,
            enthusiasm: 0.5,
            certainty: 0.5,
            curiosity: 0.5,
            mood: 0.5,
        }
    }
}

impl EmotionalState {
    pub fn analyze(&mut self, message: &str) {
        let lowered = message.to_lowercase();
        let words: Vec<&str> = lowered
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .collect();

        let sentiment = sentiment(&words);
        self.mood = (self.mood + sentiment * NUDGE).clamp(0.0, 1.0);

        if message.contains('?') {
            self.curiosity += NUDGE;
        }
        if message.contains('!') {
            self.energy += NUDGE;
        }
        if words.len() > 20 {
            self.engagement += NUDGE;
        }
        if sentiment > 0.0 {
            self.enthusiasm += NUDGE;
        }
        if PLAYFUL_CUES.iter().any(|cue| lowered.contains(cue)) {
            self.playfulness += NUDGE;
        }
        if words.iter().any(|w| HEDGE_WORDS.contains(w)) {
            self.certainty -= NUDGE;
        }

        for value in [
            &mut self.engagement,
            &mut self.energy,
            &mut self.playfulness,
            &mut self.enthusiasm,
            &mut self.certainty,
            &mut self.curiosity,
        ] {
            *value = (*value * TRAIT_DECAY).clamp(0.0, 1.0);
        }
    }

    pub fn sampling(&self) -> Sampling {
        Sampling {
            temperature: (0.5 + self.energy * 0.5 + (self.mood - 0.5) * 0.2).clamp(0.1, 1.0),
            presence_penalty: (self.curiosity * 0.5).clamp(0.0, 1.0),
            frequency_penalty: ((1.0 - self.certainty) * 0.5).clamp(0.0, 1.0),
            top_p: (0.7 + self.engagement * 0.3).clamp(0.1, 1.0),
        }
    }
}

/// `(positive - negative) / words`, in `[-1, 1]`.
fn sentiment(words: &[&str]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(*w)).count() as f64;
    let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(*w)).count() as f64;
    (positive - negative) / words.len() as f64
}

/// Emotional states of every user seen by this process.
#[derive(Default)]
pub struct EmotionTracker {
    states: Mutex<HashMap<String, EmotionalState>>,
}

impl EmotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the user's state from a message and return the resulting sampling parameters.
    pub fn observe(&self, user_id: &str, message: &str) -> Sampling {
        match self.states.lock() {
            Ok(mut states) => {
                let state = states.entry(user_id.to_string()).or_default();
                state.analyze(message);
                state.sampling()
            }
            Err(e) => {
                tracing::error!(error = %e, "emotion state lock poisoned");
                EmotionalState::default().sampling()
            }
        }
    }

    pub fn state(&self, user_id: &str) -> EmotionalState {
        self.states
            .lock()
            .ok()
            .and_then(|states| states.get(user_id).copied())
            .unwrap_or_default()
    }
}
