//! Image generation client.
//!
//! Posts a prompt to the image endpoint and decodes the first base64 image in
//! the response. Used for `<generate_image>` tags in replies and the `/create`
//! command.

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::api::ApiError;
use crate::config::ImageConfig;

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model_name: &'a str,
    prompt: &'a str,
    height: u32,
    width: u32,
    steps: u32,
    backend: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    images: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    image: String,
}

#[derive(Clone)]
pub struct ImageClient {
    http: reqwest::Client,
    config: ImageConfig,
}

impl ImageClient {
    pub fn new(config: ImageConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    /// Render `prompt` and return the raw image bytes.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ApiError> {
        let start = Instant::now();
        let body = ImageRequest {
            model_name: &self.config.model,
            prompt,
            height: self.config.height,
            width: self.config.width,
            steps: self.config.steps,
            backend: "auto",
        };

        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "image generation failed");
            return Err(ApiError::from_status(status, body));
        }

        let parsed: ImageResponse = response.json().await?;
        let encoded = parsed
            .images
            .first()
            .map(|i| i.image.as_str())
            .ok_or_else(|| ApiError::Malformed("no images in response".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "image generated"
        );
        Ok(bytes)
    }
}
