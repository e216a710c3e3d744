//! Sliding-window limiter shared by every outbound completion call.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    capacity: usize,
    period: Duration,
    issued: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// At most `capacity` acquisitions in any trailing `period`.
    pub fn new(capacity: usize, period: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            period,
            issued: Mutex::new(VecDeque::new()),
        }
    }

    pub fn per_minute(requests: usize) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    /// Wait until a slot is free in the trailing window, then claim it.
    ///
    /// The lock is held while waiting, so concurrent callers queue behind
    /// the one that is sleeping.
    pub async fn acquire(&self) {
        let mut issued = self.issued.lock().await;
        loop {
            let now = Instant::now();
            while issued
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.period)
            {
                issued.pop_front();
            }

            if issued.len() < self.capacity {
                issued.push_back(now);
                return;
            }

            if let Some(&oldest) = issued.front() {
                tracing::debug!(
                    wait_ms = (oldest + self.period - now).as_millis() as u64,
                    "rate limit reached, waiting"
                );
                tokio::time::sleep_until(oldest + self.period).await;
            }
        }
    }

    /// Requests issued in the current window.
    pub async fn in_window(&self) -> usize {
        let issued = self.issued.lock().await;
        let now = Instant::now();
        issued
            .iter()
            .filter(|&&t| now.duration_since(t) < self.period)
            .count()
    }
}
