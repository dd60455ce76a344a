//! Typed tool results
//!
//! Every provider returns one variant of [`ToolPayload`]. The planning
//! agent keys its context bundle by [`ToolKind`], so each variant carries the
//! full result shape for exactly one tool.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The tools the planning agent knows how to ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Weather,
    Lodging,
    Events,
    Routing,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [Self::Weather, Self::Lodging, Self::Events, Self::Routing];

    /// Registry name for this tool
    pub fn name(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Lodging => "lodging",
            Self::Events => "events",
            Self::Routing => "routing",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weather" => Ok(Self::Weather),
            "lodging" => Ok(Self::Lodging),
            "events" => Ok(Self::Events),
            "routing" => Ok(Self::Routing),
            other => Err(format!("Unknown tool kind: {}", other)),
        }
    }
}

/// Current conditions at the destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature_c: f64,
    pub conditions: String,
    #[serde(default)]
    pub humidity_pct: Option<u8>,
    /// Activity hints derived from the conditions
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// A purchasable stay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodgingOffer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price_per_night: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LodgingResults {
    pub offers: Vec<LodgingOffer>,
}

/// A local event the traveller could attend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventListing {
    pub events: Vec<LocalEvent>,
}

/// Driving route between origin and destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    pub duration_hours: f64,
    /// Turn-by-turn or leg summaries, in travel order
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Result of a successful tool call, one variant per tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "data", rename_all = "lowercase")]
pub enum ToolPayload {
    Weather(WeatherReport),
    Lodging(LodgingResults),
    Events(EventListing),
    Routing(RoutePlan),
}

impl ToolPayload {
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Weather(_) => ToolKind::Weather,
            Self::Lodging(_) => ToolKind::Lodging,
            Self::Events(_) => ToolKind::Events,
            Self::Routing(_) => ToolKind::Routing,
        }
    }

    /// IDs of items in this payload that an itinerary may book
    pub fn bookable_ids(&self) -> Vec<&str> {
        match self {
            Self::Lodging(results) => results.offers.iter().map(|o| o.id.as_str()).collect(),
            Self::Events(listing) => listing.events.iter().map(|e| e.id.as_str()).collect(),
            Self::Weather(_) | Self::Routing(_) => Vec::new(),
        }
    }

    pub fn has_bookable(&self, item_id: &str) -> bool {
        self.bookable_ids().contains(&item_id)
    }

    /// Copy with every list cut to at most `max_items` entries
    pub fn summarized(&self, max_items: usize) -> Self {
        debug!(kind = %self.kind(), max_items, "ToolPayload::summarized: called");
        match self {
            Self::Weather(report) => {
                let mut report = report.clone();
                report.recommendations.truncate(max_items);
                Self::Weather(report)
            }
            Self::Lodging(results) => Self::Lodging(LodgingResults {
                offers: results.offers.iter().take(max_items).cloned().collect(),
            }),
            Self::Events(listing) => Self::Events(EventListing {
                events: listing.events.iter().take(max_items).cloned().collect(),
            }),
            Self::Routing(route) => {
                let mut route = route.clone();
                route.steps.truncate(max_items);
                Self::Routing(route)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lodging(n: usize) -> ToolPayload {
        ToolPayload::Lodging(LodgingResults {
            offers: (0..n)
                .map(|i| LodgingOffer {
                    id: format!("hotel-{}", i),
                    name: format!("Hotel {}", i),
                    price_per_night: Some(2500.0),
                    currency: Some("INR".to_string()),
                    lat: None,
                    lon: None,
                })
                .collect(),
        })
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(lodging(1).kind(), ToolKind::Lodging);
        assert_eq!(ToolKind::Lodging.name(), "lodging");
        assert_eq!("Events".parse::<ToolKind>(), Ok(ToolKind::Events));
        assert!("flights".parse::<ToolKind>().is_err());
    }

    #[test]
    fn test_bookable_ids() {
        let payload = lodging(2);
        assert_eq!(payload.bookable_ids(), vec!["hotel-0", "hotel-1"]);
        assert!(payload.has_bookable("hotel-1"));
        assert!(!payload.has_bookable("hotel-9"));

        let weather = ToolPayload::Weather(WeatherReport {
            location: "Jaipur".to_string(),
            temperature_c: 31.0,
            conditions: "clear sky".to_string(),
            humidity_pct: None,
            recommendations: vec![],
        });
        assert!(weather.bookable_ids().is_empty());
    }

    #[test]
    fn test_summarized_truncates_lists() {
        let summary = lodging(20).summarized(3);
        assert_eq!(summary.bookable_ids().len(), 3);
    }

    #[test]
    fn test_payload_is_tagged_by_tool() {
        let json = serde_json::to_value(lodging(1)).unwrap();
        assert_eq!(json["tool"], "lodging");
        assert_eq!(json["data"]["offers"][0]["id"], "hotel-0");
    }
}
