//! lodging provider - hotel availability and pricing from Makcorps

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::tools::error::{ProviderError, ProviderReason};
use crate::tools::payload::{LodgingOffer, LodgingResults, ToolPayload};
use crate::tools::protocol::ToolArgs;
use crate::tools::traits::{ToolProvider, required_str};

use super::{Endpoint, check_status, slug_id};

#[derive(Debug, Deserialize)]
struct HotelSearchResponse {
    #[serde(default)]
    hotels: Vec<HotelEntry>,
}

#[derive(Debug, Deserialize)]
struct HotelEntry {
    #[serde(default, alias = "hotelId")]
    id: Option<Value>,
    name: Option<String>,
    #[serde(default)]
    geocode: Option<Geocode>,
    #[serde(default)]
    price: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Geocode {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Hotel offers near the destination
#[derive(Debug)]
pub struct LodgingProvider {
    endpoint: Endpoint,
}

impl LodgingProvider {
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            endpoint: Endpoint::from_config(config, timeout),
        }
    }
}

#[async_trait]
impl ToolProvider for LodgingProvider {
    fn name(&self) -> &'static str {
        "lodging"
    }

    fn description(&self) -> &'static str {
        "Hotel offers with nightly prices and coordinates"
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolPayload, ProviderError> {
        let destination = required_str(&args, "destination")?;
        let currency = args.get("currency").and_then(|v| v.as_str()).map(str::to_string);
        let max_nightly = args.get("max_price_per_night").and_then(|v| v.as_f64());
        debug!(%destination, ?max_nightly, "LodgingProvider::call: called");
        let key = self.endpoint.key()?;

        let response = self
            .endpoint
            .http
            .get(self.endpoint.url(&format!("free/{}", destination)))
            .header("Authorization", format!("JWT {}", key))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        let mut results = parse_hotels(&body, currency)?;
        if let Some(limit) = max_nightly {
            // Unpriced offers are kept; the model sees them as price unknown
            results
                .offers
                .retain(|o| o.price_per_night.map(|p| p <= limit).unwrap_or(true));
        }
        if results.offers.is_empty() {
            return Err(ProviderError::new(
                ProviderReason::NotFound,
                format!("No hotels found for {}", destination),
            ));
        }
        Ok(ToolPayload::Lodging(results))
    }
}

/// Parse a hotel search body into offers
fn parse_hotels(body: &str, currency: Option<String>) -> Result<LodgingResults, ProviderError> {
    let parsed: HotelSearchResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::bad_response(format!("Unexpected hotel payload: {}", e)))?;

    let offers = parsed
        .hotels
        .into_iter()
        .filter_map(|hotel| {
            let name = hotel.name?;
            let id = match hotel.id {
                Some(Value::String(s)) if !s.is_empty() => format!("hotel-{}", s),
                Some(Value::Number(n)) => format!("hotel-{}", n),
                _ => slug_id("hotel", &name),
            };
            let (lat, lon) = hotel
                .geocode
                .map(|g| (g.latitude, g.longitude))
                .unwrap_or((None, None));
            Some(LodgingOffer {
                id,
                name,
                price_per_night: hotel.price.as_ref().and_then(parse_price),
                currency: currency.clone(),
                lat,
                lon,
            })
        })
        .collect();

    Ok(LodgingResults { offers })
}

/// Accepts `2345`, `"2345"`, or `"₹2,345"`
fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            digits.parse().ok()
        }
        _ => None,
    }
}
