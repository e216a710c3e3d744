//! HTTP client for the OpenAI-compatible chat-completion endpoint.
//!
//! Every request passes through the shared [`RateLimiter`] and is retried with
//! exponential backoff. Latency and error kinds are recorded in [`ApiMetrics`].
//! [`CompletionClient::complete`] never fails: on exhaustion it logs and
//! returns `None` so the caller can post a fallback line.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::classify::{self, ResponseLength, FALLBACK_MAX_TOKENS};
use super::error::ApiError;
use super::metrics::ApiMetrics;
use super::prompt::{build_messages, PromptParts};
use super::rate_limit::RateLimiter;
use super::retry::{retry_with_backoff, RetryPolicy};
use super::types::{ChatMessage, ChatRequest, ChatResponse, Sampling};
use crate::config::CompletionConfig;
use crate::context::types::ScoredMessage;
use crate::notes::{notes_summary, UserNote};

/// Everything besides the prompt, context and notes that shapes one completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub system_prompt: String,
    pub interests: Vec<String>,
    /// Reflection on the previous reply, placed right before the prompt.
    pub metaprompt: Option<String>,
    pub sampling: Sampling,
    /// Explicit budget; skips length classification when set.
    pub max_tokens: Option<u32>,
    /// How many notes go into the prompt summary.
    pub prompt_notes: usize,
}

#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    config: Arc<CompletionConfig>,
    limiter: Arc<RateLimiter>,
    metrics: ApiMetrics,
    retry: RetryPolicy,
}

impl CompletionClient {
    pub fn new(
        config: CompletionConfig,
        limiter: Arc<RateLimiter>,
        metrics: ApiMetrics,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let retry = RetryPolicy::new(config.max_retries, Duration::from_millis(config.base_delay_ms));
        Ok(Self {
            http,
            config: Arc::new(config),
            limiter,
            metrics,
            retry,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request(&self, model: &str, messages: Vec<ChatMessage>, max_tokens: u32, sampling: Sampling) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages,
            max_tokens,
            sampling,
            stop: self.config.stop.clone(),
            repetition_penalty: self.config.repetition_penalty,
        }
    }

    /// One POST to the endpoint. Returns the trimmed content of the first choice.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, body));
        }

        let parsed: ChatResponse = response.json().await?;
        match parsed.first_content().map(str::trim) {
            Some(content) if !content.is_empty() => Ok(content.to_string()),
            _ => Err(ApiError::Malformed("response has no content".into())),
        }
    }

    /// [`chat`](Self::chat) behind the rate limiter, with retries.
    pub async fn chat_with_retry(&self, request: &ChatRequest) -> Result<String, ApiError> {
        retry_with_backoff(self.retry, move || async move {
            self.limiter.acquire().await;
            self.chat(request).await
        })
        .await
    }

    /// Ask the classifier model how long the reply to `prompt` should be.
    /// Any failure falls back to the default budget.
    pub async fn classify_length(&self, prompt: &str) -> (u32, ResponseLength) {
        let request = ChatRequest {
            stop: Vec::new(),
            repetition_penalty: None,
            ..self.request(
                &self.config.classifier_model,
                vec![
                    ChatMessage::system(crate::prompts::CLASSIFIER_PROMPT),
                    ChatMessage::user(prompt),
                ],
                10,
                Sampling {
                    temperature: 0.3,
                    ..Sampling::default()
                },
            )
        };

        match self.chat_with_retry(&request).await {
            Ok(label) => {
                let (tokens, length) = classify::budget_for(&label);
                tracing::debug!(label = %label, category = %length, tokens, "query classified");
                (tokens, length)
            }
            Err(e) => {
                tracing::warn!(error = %e, "query classification failed, using default length");
                (FALLBACK_MAX_TOKENS, ResponseLength::Detailed)
            }
        }
    }

    /// Generate a reply to `prompt` given the channel context and the author's notes.
    pub async fn complete(
        &self,
        prompt: &str,
        context: &[ScoredMessage],
        notes: &[UserNote],
        options: &CompletionOptions,
    ) -> Option<String> {
        let max_tokens = match options.max_tokens {
            Some(tokens) => tokens,
            None if self.config.classify_length => self.classify_length(prompt).await.0,
            None => self.config.default_max_tokens,
        };

        let messages = build_messages(&PromptParts {
            system_prompt: &options.system_prompt,
            interests: options.interests.clone(),
            context,
            context_limit: self.config.context_messages,
            notes_summary: notes_summary(notes, options.prompt_notes),
            metaprompt: options.metaprompt.clone(),
            prompt,
        });

        self.complete_messages(messages, max_tokens, options.sampling).await
    }

    /// Send a prepared message list. Used directly for thought-chain follow-ups.
    pub async fn complete_messages(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        sampling: Sampling,
    ) -> Option<String> {
        let request = self.request(&self.config.model, messages, max_tokens, sampling);
        let start = Instant::now();

        match self.chat_with_retry(&request).await {
            Ok(content) => {
                let elapsed = start.elapsed();
                self.metrics.record_response_time(elapsed);
                tracing::info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    max_tokens,
                    chars = content.len(),
                    "completion received"
                );
                Some(crate::reply::fix_spacing(&content))
            }
            Err(e) => {
                self.metrics.record_error(&e.kind());
                tracing::error!(
                    error = %e,
                    kind = %e.kind(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "completion failed"
                );
                None
            }
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ApiMetrics {
        &self.metrics
    }
}
