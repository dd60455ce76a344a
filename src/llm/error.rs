//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Why a model call produced no usable text
#[derive(Debug, Error)]
pub enum LlmError {
    /// No client could be built (missing key, unknown provider)
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Output withheld by the provider's content filter
    #[error("Output blocked by the provider: {0}")]
    Blocked(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Stable code for logs
    pub fn code(&self) -> &'static str {
        match self {
            LlmError::Unavailable(_) => "unavailable",
            LlmError::RateLimited { .. } => "rate_limited",
            LlmError::ApiError { status, .. } if *status >= 500 => "server_error",
            LlmError::ApiError { .. } => "rejected",
            LlmError::Network(_) => "network",
            LlmError::InvalidResponse(_) | LlmError::Json(_) => "invalid_response",
            LlmError::Blocked(_) => "blocked",
            LlmError::Timeout(_) => "timeout",
        }
    }

    /// Whether a later call with the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Network(_) | LlmError::Timeout(_)
        ) || matches!(self, LlmError::ApiError { status, .. } if *status >= 500)
    }
}
