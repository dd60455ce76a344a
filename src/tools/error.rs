//! Tool error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable reason a provider call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderReason {
    /// Arguments were missing or malformed
    InvalidArguments,
    /// The upstream source had no data for the query
    NotFound,
    /// The upstream source throttled the call
    RateLimited,
    /// The upstream source was unreachable or returned 5xx
    Unavailable,
    /// The call exceeded its per-call deadline
    Timeout,
    /// The upstream response could not be parsed
    BadResponse,
    /// No provider is registered under the requested name
    UnknownTool,
    /// The adapter itself crashed
    Internal,
}

impl ProviderReason {
    /// Stable snake_case code for logs and persisted gap records
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::BadResponse => "bad_response",
            Self::UnknownTool => "unknown_tool",
            Self::Internal => "internal",
        }
    }

    /// Whether calling again with the same arguments can plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Unavailable | Self::Timeout | Self::BadResponse | Self::Internal => true,
            Self::InvalidArguments | Self::NotFound | Self::UnknownTool => false,
        }
    }

    /// Map an upstream HTTP status to a reason
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidArguments,
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::RateLimited,
            _ => Self::Unavailable,
        }
    }
}

impl std::fmt::Display for ProviderReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure reported by a tool provider adapter
#[derive(Debug, Clone, Error)]
#[error("{reason}: {message}")]
pub struct ProviderError {
    pub reason: ProviderReason,
    pub message: String,
}

impl ProviderError {
    pub fn new(reason: ProviderReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ProviderReason::InvalidArguments, message)
    }

    pub fn bad_response(message: impl Into<String>) -> Self {
        Self::new(ProviderReason::BadResponse, message)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            ProviderReason::Timeout
        } else if err.is_decode() {
            ProviderReason::BadResponse
        } else if let Some(status) = err.status() {
            ProviderReason::from_http_status(status.as_u16())
        } else {
            ProviderReason::Unavailable
        };
        Self::new(reason, err.to_string())
    }
}

/// Contract violations at the registry boundary
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Tool already registered: {name}")]
    DuplicateTool { name: String },

    #[error("Tool not found: {name}")]
    UnknownTool { name: String },
}
