//! routing provider - driving route from OpenRouteService

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::tools::error::{ProviderError, ProviderReason};
use crate::tools::payload::{RoutePlan, ToolPayload};
use crate::tools::protocol::ToolArgs;
use crate::tools::traits::{ToolProvider, required_str};

use super::{Endpoint, check_status};

/// Maximum instructions kept from the directions response
const MAX_STEPS: usize = 25;

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    features: Vec<GeocodeFeature>,
}

#[derive(Debug, Deserialize)]
struct GeocodeFeature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[lon, lat]`
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    summary: RouteSummary,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct RouteSummary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    instruction: String,
}

/// Driving directions between origin and destination
#[derive(Debug)]
pub struct RoutingProvider {
    endpoint: Endpoint,
}

impl RoutingProvider {
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            endpoint: Endpoint::from_config(config, timeout),
        }
    }

    /// Resolve a place name to `[lon, lat]`
    async fn geocode(&self, key: &str, place: &str) -> Result<[f64; 2], ProviderError> {
        debug!(%place, "RoutingProvider::geocode: called");
        let response = self
            .endpoint
            .http
            .get(self.endpoint.url("geocode/search"))
            .query(&[("api_key", key), ("text", place), ("size", "1")])
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        parse_geocode(place, &body)
    }
}

#[async_trait]
impl ToolProvider for RoutingProvider {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn description(&self) -> &'static str {
        "Driving distance, duration and directions from origin to destination"
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolPayload, ProviderError> {
        let origin = required_str(&args, "origin")?;
        let destination = required_str(&args, "destination")?;
        debug!(%origin, %destination, "RoutingProvider::call: called");
        let key = self.endpoint.key()?;

        let from = self.geocode(key, origin).await?;
        let to = self.geocode(key, destination).await?;

        let response = self
            .endpoint
            .http
            .post(self.endpoint.url("v2/directions/driving-car"))
            .header("Authorization", key)
            .json(&serde_json::json!({ "coordinates": [from, to] }))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        parse_directions(origin, destination, &body).map(ToolPayload::Routing)
    }
}

fn parse_geocode(place: &str, body: &str) -> Result<[f64; 2], ProviderError> {
    let parsed: GeocodeResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::bad_response(format!("Unexpected geocode payload: {}", e)))?;

    match parsed.features.first().map(|f| f.geometry.coordinates.as_slice()) {
        Some([lon, lat, ..]) => Ok([*lon, *lat]),
        _ => Err(ProviderError::new(
            ProviderReason::NotFound,
            format!("Could not geocode {}", place),
        )),
    }
}

fn parse_directions(origin: &str, destination: &str, body: &str) -> Result<RoutePlan, ProviderError> {
    let parsed: DirectionsResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::bad_response(format!("Unexpected directions payload: {}", e)))?;

    let route = parsed.routes.into_iter().next().ok_or_else(|| {
        ProviderError::new(
            ProviderReason::NotFound,
            format!("No route from {} to {}", origin, destination),
        )
    })?;

    let steps = route
        .segments
        .into_iter()
        .flat_map(|s| s.steps)
        .map(|s| s.instruction)
        .take(MAX_STEPS)
        .collect();

    Ok(RoutePlan {
        origin: origin.to_string(),
        destination: destination.to_string(),
        distance_km: (route.summary.distance / 1000.0 * 10.0).round() / 10.0,
        duration_hours: (route.summary.duration / 3600.0 * 10.0).round() / 10.0,
        steps,
    })
}
