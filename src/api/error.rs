//! Failures of the completion and image endpoints.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited by upstream: {body}")]
    RateLimited { body: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("failed to decode payload: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether another attempt could succeed. Anything that reached us as a
    /// non-200 status or failed on the wire is retried; bad payloads are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Transport(_) | Self::RateLimited { .. } | Self::Status { .. }
        )
    }

    /// Short label used as the metrics error key.
    pub fn kind(&self) -> String {
        match self {
            Self::Timeout => "TimeoutError".into(),
            Self::Transport(_) => "TransportError".into(),
            Self::RateLimited { .. } => "APIError_429".into(),
            Self::Status { status, .. } => format!("APIError_{status}"),
            Self::Malformed(_) => "MalformedResponse".into(),
            Self::Decode(_) => "DecodeError".into(),
        }
    }

    /// Map a non-success status and its body to an error.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited { body }
        } else {
            Self::Status {
                status: status.as_u16(),
                body,
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
