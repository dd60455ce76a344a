//! weather provider - current conditions from OpenWeather

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::tools::error::ProviderError;
use crate::tools::payload::{ToolPayload, WeatherReport};
use crate::tools::protocol::ToolArgs;
use crate::tools::traits::{ToolProvider, required_str};

use super::{Endpoint, check_status};

#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    name: Option<String>,
    main: OpenWeatherMain,
    #[serde(default)]
    weather: Vec<OpenWeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    humidity: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherCondition {
    description: String,
}

/// Current weather at the destination
#[derive(Debug)]
pub struct WeatherProvider {
    endpoint: Endpoint,
}

impl WeatherProvider {
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            endpoint: Endpoint::from_config(config, timeout),
        }
    }
}

#[async_trait]
impl ToolProvider for WeatherProvider {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn description(&self) -> &'static str {
        "Current temperature and conditions for the destination"
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolPayload, ProviderError> {
        let destination = required_str(&args, "destination")?;
        debug!(%destination, "WeatherProvider::call: called");
        let key = self.endpoint.key()?;

        let response = self
            .endpoint
            .http
            .get(self.endpoint.url("data/2.5/weather"))
            .query(&[("q", destination), ("appid", key), ("units", "metric")])
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        parse_weather(destination, &body).map(ToolPayload::Weather)
    }
}

/// Parse an OpenWeather current-weather body
fn parse_weather(destination: &str, body: &str) -> Result<WeatherReport, ProviderError> {
    let parsed: OpenWeatherResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::bad_response(format!("Unexpected weather payload: {}", e)))?;

    let conditions = parsed
        .weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let recommendations = recommend(parsed.main.temp, &conditions);

    Ok(WeatherReport {
        location: parsed.name.unwrap_or_else(|| destination.to_string()),
        temperature_c: parsed.main.temp,
        conditions,
        humidity_pct: parsed.main.humidity,
        recommendations,
    })
}

/// Activity hints for the given conditions
fn recommend(temperature_c: f64, conditions: &str) -> Vec<String> {
    let conditions = conditions.to_lowercase();
    let mut hints = Vec::new();

    if conditions.contains("rain") || conditions.contains("storm") || conditions.contains("drizzle") {
        hints.push("Prefer indoor venues such as museums, galleries and covered markets".to_string());
    } else if conditions.contains("clear") || conditions.contains("sun") {
        hints.push("Good conditions for outdoor sightseeing and walking tours".to_string());
    }

    if temperature_c >= 32.0 {
        hints.push("Schedule outdoor activities in the early morning or evening".to_string());
    } else if temperature_c <= 10.0 {
        hints.push("Pack warm clothing; keep evenings short outdoors".to_string());
    }

    hints
}
