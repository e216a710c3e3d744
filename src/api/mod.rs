//! Completion endpoint plumbing: request types, rate limiting, retries,
//! length classification, prompt assembly and metrics.

pub mod classify;
pub mod client;
pub mod error;
pub mod metrics;
pub mod prompt;
pub mod rate_limit;
pub mod retry;
pub mod types;

pub use client::{CompletionClient, CompletionOptions};
pub use error::ApiError;
