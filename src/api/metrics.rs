//! Latency and error tallies for the completion endpoint, plus process-level
//! counters for the bot.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};
use tokio::task::JoinHandle;

/// Response times kept for the rolling average.
const RESPONSE_WINDOW: usize = 1000;

#[derive(Default)]
struct ApiMetricsInner {
    response_times: VecDeque<Duration>,
    error_counts: BTreeMap<String, u64>,
}

#[derive(Clone, Default)]
pub struct ApiMetrics {
    inner: Arc<Mutex<ApiMetricsInner>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiMetricsSnapshot {
    pub samples: usize,
    pub average_ms: f64,
    pub errors: BTreeMap<String, u64>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_response_time(&self, elapsed: Duration) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.response_times.len() == RESPONSE_WINDOW {
                inner.response_times.pop_front();
            }
            inner.response_times.push_back(elapsed);
        }
    }

    pub fn record_error(&self, kind: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner.error_counts.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> ApiMetricsSnapshot {
        let Ok(inner) = self.inner.lock() else {
            return ApiMetricsSnapshot {
                samples: 0,
                average_ms: 0.0,
                errors: BTreeMap::new(),
            };
        };
        let samples = inner.response_times.len();
        let average_ms = if samples == 0 {
            0.0
        } else {
            let total: Duration = inner.response_times.iter().sum();
            total.as_secs_f64() * 1000.0 / samples as f64
        };
        ApiMetricsSnapshot {
            samples,
            average_ms,
            errors: inner.error_counts.clone(),
        }
    }
}

struct BotMetricsInner {
    started: Instant,
    messages_processed: AtomicU64,
    commands_processed: AtomicU64,
    errors: AtomicU64,
}

#[derive(Clone)]
pub struct BotMetrics {
    inner: Arc<BotMetricsInner>,
}

impl BotMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BotMetricsInner {
                started: Instant::now(),
                messages_processed: AtomicU64::new(0),
                commands_processed: AtomicU64::new(0),
                errors: AtomicU64::new(0),
            }),
        }
    }

    pub fn increment_messages(&self) {
        self.inner.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commands(&self) {
        self.inner.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_processed(&self) -> u64 {
        self.inner.messages_processed.load(Ordering::Relaxed)
    }

    pub fn commands_processed(&self) -> u64 {
        self.inner.commands_processed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.inner.errors.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }
}

impl Default for BotMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// CPU and memory of this process, if the platform reports them.
#[derive(Debug, Clone, Copy)]
pub struct ProcessUsage {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

fn process_usage(sys: &mut System) -> Option<ProcessUsage> {
    let pid = sysinfo::get_current_pid().ok()?;
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    let process = sys.process(pid)?;
    Some(ProcessUsage {
        cpu_percent: process.cpu_usage(),
        memory_bytes: process.memory(),
    })
}

/// Log a metrics summary every `interval` until the task is aborted.
pub fn spawn_metrics_log(
    api: ApiMetrics,
    bot: BotMetrics,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sys = System::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = api.snapshot();
            let usage = process_usage(&mut sys);
            tracing::info!(
                uptime_secs = bot.uptime().as_secs(),
                messages = bot.messages_processed(),
                commands = bot.commands_processed(),
                errors = bot.errors(),
                avg_response_ms = snapshot.average_ms,
                api_errors = ?snapshot.errors,
                cpu_percent = usage.map(|u| u.cpu_percent),
                memory_mb = usage.map(|u| u.memory_bytes / (1024 * 1024)),
                "metrics"
            );
        }
    })
}
