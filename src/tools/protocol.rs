//! Request/response envelope between the agent and tool providers

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::RequestId;

use super::error::{ProviderError, ProviderReason};
use super::payload::ToolPayload;

/// Typed argument mapping passed to a provider
pub type ToolArgs = Map<String, Value>;

/// A single call addressed to a registered tool
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub id: RequestId,
    pub tool: String,
    pub args: ToolArgs,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>, args: ToolArgs) -> Self {
        let tool = tool.into();
        debug!(%tool, arg_count = args.len(), "ToolRequest::new: called");
        Self {
            id: RequestId::generate(&tool),
            tool,
            args,
        }
    }

    /// Same tool and arguments under a fresh request id
    pub fn reissue(&self) -> Self {
        Self::new(self.tool.clone(), self.args.clone())
    }
}

/// Whether a call produced data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// Typed error detail carried by an error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub reason: ProviderReason,
    pub message: String,
}

impl ToolFailure {
    pub fn new(reason: ProviderReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.reason.is_retryable()
    }
}

impl From<ProviderError> for ToolFailure {
    fn from(err: ProviderError) -> Self {
        Self {
            reason: err.reason,
            message: err.message,
        }
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Outcome of a call: data or a typed failure
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Ok(ToolPayload),
    Error(ToolFailure),
}

/// Response correlated to the request that produced it
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub request_id: RequestId,
    pub tool: String,
    pub outcome: ToolOutcome,
    pub latency: Duration,
}

impl ToolResponse {
    pub fn ok(request: &ToolRequest, payload: ToolPayload, latency: Duration) -> Self {
        Self {
            request_id: request.id.clone(),
            tool: request.tool.clone(),
            outcome: ToolOutcome::Ok(payload),
            latency,
        }
    }

    pub fn error(request: &ToolRequest, failure: ToolFailure, latency: Duration) -> Self {
        Self {
            request_id: request.id.clone(),
            tool: request.tool.clone(),
            outcome: ToolOutcome::Error(failure),
            latency,
        }
    }

    pub fn status(&self) -> ToolStatus {
        match self.outcome {
            ToolOutcome::Ok(_) => ToolStatus::Ok,
            ToolOutcome::Error(_) => ToolStatus::Error,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status() == ToolStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::payload::{EventListing, ToolPayload};

    #[test]
    fn test_reissue_keeps_call_but_changes_id() {
        let mut args = ToolArgs::new();
        args.insert("destination".to_string(), Value::from("Goa"));
        let request = ToolRequest::new("events", args);
        let again = request.reissue();

        assert_eq!(again.tool, "events");
        assert_eq!(again.args, request.args);
        assert_ne!(again.id, request.id);
    }

    #[test]
    fn test_response_is_tagged_with_request_id() {
        let request = ToolRequest::new("events", ToolArgs::new());
        let response = ToolResponse::ok(
            &request,
            ToolPayload::Events(EventListing::default()),
            Duration::from_millis(12),
        );
        assert_eq!(response.request_id, request.id);
        assert_eq!(response.status(), ToolStatus::Ok);

        let failed = ToolResponse::error(
            &request,
            ToolFailure::new(ProviderReason::Timeout, "deadline"),
            Duration::from_millis(5),
        );
        assert_eq!(failed.status(), ToolStatus::Error);
        assert!(!failed.is_ok());
    }
}
