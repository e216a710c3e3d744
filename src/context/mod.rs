//! Conversation context: bounded per-channel history with recency decay.
//!
//! Messages are appended per channel and retrieved with a relevance score that
//! falls linearly from 1.0 to a floor of 0.1 across the decay window. Messages
//! past the window are hidden from retrieval but remain stored until capacity
//! eviction pushes them out.

pub mod manager;
pub mod registry;
pub mod store;
pub mod types;

use std::time::Duration;

/// Lowest relevance a non-expired message can have.
pub const RELEVANCE_FLOOR: f64 = 0.1;

/// Relevance of a message of the given age, or `None` once it has expired.
///
/// `max(0.1, 1 - age / window)` for `age < window`.
pub fn relevance(age: Duration, window: Duration) -> Option<f64> {
    if window.is_zero() || age >= window {
        return None;
    }
    let score = 1.0 - age.as_secs_f64() / window.as_secs_f64();
    Some(score.max(RELEVANCE_FLOOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_matches_linear_decay() {
        let window = Duration::from_secs(3600);
        assert_eq!(relevance(Duration::ZERO, window), Some(1.0));
        assert_eq!(relevance(Duration::from_secs(1800), window), Some(0.5));
        assert_eq!(relevance(Duration::from_secs(900), window), Some(0.75));
    }

    #[test]
    fn relevance_expires_at_window() {
        let window = Duration::from_secs(3600);
        assert_eq!(relevance(Duration::from_secs(3600), window), None);
        assert_eq!(relevance(Duration::from_secs(4000), window), None);
    }

    #[test]
    fn relevance_is_bounded_and_non_increasing() {
        let window = Duration::from_secs(600);
        let mut previous = f64::MAX;
        for secs in 0..600 {
            let score = relevance(Duration::from_secs(secs), window).unwrap();
            assert!((RELEVANCE_FLOOR..=1.0).contains(&score));
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn zero_window_expires_everything() {
        assert_eq!(relevance(Duration::ZERO, Duration::ZERO), None);
    }
}
