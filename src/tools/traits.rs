//! Tool provider trait definition

use async_trait::async_trait;

use super::error::ProviderError;
use super::payload::ToolPayload;
use super::protocol::ToolArgs;

/// Uniform interface to one external data source
///
/// Implementations may be shared across concurrent planning runs and are
/// responsible for their own internal synchronisation (connection pools etc).
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Tool name (matches the registry binding)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Fetch data for the given arguments
    async fn call(&self, args: ToolArgs) -> Result<ToolPayload, ProviderError>;
}

/// Read a required string argument
pub fn required_str<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, ProviderError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::invalid_arguments(format!("{} is required", key)))
}

/// Read an optional string argument
pub fn optional_str<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty())
}
