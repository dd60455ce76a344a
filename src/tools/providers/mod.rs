//! HTTP-backed tool providers
//!
//! One adapter per external data source. Each reads its API key from the
//! environment variable named in config; a missing key turns every call into
//! an `unavailable` error so planning proceeds without that tool's data.

mod events;
mod lodging;
mod routing;
mod weather;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use tracing::debug;

use crate::config::{ProviderConfig, ToolsConfig};

use super::error::{ProtocolError, ProviderError, ProviderReason};
use super::payload::ToolKind;
use super::registry::ToolRegistry;

pub use events::EventsProvider;
pub use lodging::LodgingProvider;
pub use routing::RoutingProvider;
pub use weather::WeatherProvider;

/// Build a registry holding the four standard providers
pub fn standard_registry(config: &ToolsConfig) -> Result<ToolRegistry, ProtocolError> {
    debug!(timeout_ms = config.timeout_ms, "standard_registry: called");
    let timeout = Duration::from_millis(config.timeout_ms);
    let registry = ToolRegistry::new(timeout);
    registry.register(ToolKind::Weather.name(), Arc::new(WeatherProvider::from_config(&config.weather, timeout)))?;
    registry.register(ToolKind::Lodging.name(), Arc::new(LodgingProvider::from_config(&config.lodging, timeout)))?;
    registry.register(ToolKind::Events.name(), Arc::new(EventsProvider::from_config(&config.events, timeout)))?;
    registry.register(ToolKind::Routing.name(), Arc::new(RoutingProvider::from_config(&config.routing, timeout)))?;
    Ok(registry)
}

/// Shared connection settings for a provider
#[derive(Clone)]
struct Endpoint {
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    http: Client,
}

impl Endpoint {
    fn from_config(config: &ProviderConfig, timeout: Duration) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.trim().is_empty());
        debug!(base_url = %config.base_url, has_key = api_key.is_some(), "Endpoint::from_config: called");
        let http = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or_else(|| {
            ProviderError::new(
                ProviderReason::Unavailable,
                format!("API key not set. Set the {} environment variable.", self.api_key_env),
            )
        })
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("api_key_env", &self.api_key_env)
            .field("has_key", &self.api_key.is_some())
            .finish()
    }
}

/// Turn a non-2xx response into a provider error
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(ProviderError::new(
        ProviderReason::from_http_status(status.as_u16()),
        format!("HTTP {}: {}", status.as_u16(), snippet),
    ))
}

/// Stable id from a display name when the upstream gives none
fn slug_id(prefix: &str, name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    format!("{}-{}", prefix, slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_id() {
        assert_eq!(slug_id("hotel", "The Oberoi Rajvilas!"), "hotel-the-oberoi-rajvilas");
    }

    #[test]
    fn test_endpoint_without_key_is_unavailable() {
        let config = ProviderConfig {
            base_url: "https://example.com/".to_string(),
            api_key_env: "FLEXITRIP_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
        };
        let endpoint = Endpoint::from_config(&config, Duration::from_secs(1));
        assert_eq!(endpoint.url("/v1/x"), "https://example.com/v1/x");
        let err = endpoint.key().unwrap_err();
        assert_eq!(err.reason, ProviderReason::Unavailable);
        assert!(err.message.contains("FLEXITRIP_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_standard_registry_registers_all_tools() {
        let registry = standard_registry(&ToolsConfig::default()).unwrap();
        assert_eq!(registry.names(), vec!["events", "lodging", "routing", "weather"]);
    }
}
