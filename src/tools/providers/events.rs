//! events provider - local festivals and events from Eventbrite

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::tools::error::ProviderError;
use crate::tools::payload::{EventListing, LocalEvent, ToolPayload};
use crate::tools::protocol::ToolArgs;
use crate::tools::traits::{ToolProvider, required_str};

use super::{Endpoint, check_status};

#[derive(Debug, Deserialize)]
struct EventSearchResponse {
    #[serde(default)]
    events: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    id: String,
    name: TextField,
    #[serde(default)]
    start: Option<EventStart>,
    #[serde(default)]
    venue: Option<Venue>,
    #[serde(default)]
    is_free: bool,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventStart {
    local: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Venue {
    name: Option<String>,
}

/// Events happening at the destination during the trip
#[derive(Debug)]
pub struct EventsProvider {
    endpoint: Endpoint,
}

impl EventsProvider {
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            endpoint: Endpoint::from_config(config, timeout),
        }
    }
}

#[async_trait]
impl ToolProvider for EventsProvider {
    fn name(&self) -> &'static str {
        "events"
    }

    fn description(&self) -> &'static str {
        "Local festivals and events matching the traveller's interests"
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolPayload, ProviderError> {
        let destination = required_str(&args, "destination")?;
        let query = args
            .get("interests")
            .and_then(|v| v.as_array())
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        debug!(%destination, %query, "EventsProvider::call: called");
        let key = self.endpoint.key()?;

        let response = self
            .endpoint
            .http
            .get(self.endpoint.url("v3/events/search/"))
            .query(&[("q", query.as_str()), ("location.address", destination), ("expand", "venue")])
            .bearer_auth(key)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        parse_events(&body).map(ToolPayload::Events)
    }
}

/// Parse an event search body
fn parse_events(body: &str) -> Result<EventListing, ProviderError> {
    let parsed: EventSearchResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::bad_response(format!("Unexpected events payload: {}", e)))?;

    let events = parsed
        .events
        .into_iter()
        .filter_map(|entry| {
            let name = entry.name.text.filter(|t| !t.trim().is_empty())?;
            Some(LocalEvent {
                id: format!("event-{}", entry.id),
                name,
                starts_at: entry.start.and_then(|s| s.local),
                venue: entry.venue.and_then(|v| v.name),
                is_free: entry.is_free,
                url: entry.url,
            })
        })
        .collect();

    Ok(EventListing { events })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::error::ProviderReason;

    #[test]
    fn test_parse_events() {
        let body = r#"{
            "events": [
                {"id": "101", "name": {"text": "Jaipur Literature Festival"}, "start": {"local": "2026-01-22T10:00:00"}, "venue": {"name": "Hotel Clarks Amer"}, "is_free": false, "url": "https://example.com/jlf"},
                {"id": "102", "name": {"text": null}},
                {"id": "103", "name": {"text": "Night Bazaar"}, "is_free": true}
            ]
        }"#;

        let listing = parse_events(body).unwrap();
        assert_eq!(listing.events.len(), 2);
        assert_eq!(listing.events[0].id, "event-101");
        assert_eq!(listing.events[0].venue.as_deref(), Some("Hotel Clarks Amer"));
        assert!(listing.events[1].is_free);
        assert_eq!(listing.events[1].starts_at, None);
    }

    #[test]
    fn test_parse_events_empty() {
        let listing = parse_events("{}").unwrap();
        assert!(listing.events.is_empty());
    }

    #[test]
    fn test_parse_events_bad_body() {
        let err = parse_events("[1, 2").unwrap_err();
        assert_eq!(err.reason, ProviderReason::BadResponse);
    }
}
