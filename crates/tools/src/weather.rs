//! Weather tool — current conditions for a city.
//!
//! wttr.in is tried first (two attempts with growing timeouts); if it stays
//! silent, Open-Meteo geocoding plus its current-weather endpoint is used.
//! Neither needs an API key.

use async_trait::async_trait;
use oracle_core::error::ToolError;
use oracle_core::tool::{Capability, Tool, ToolOutput};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const TOOL_NAME: &str = "get_weather";
const WTTR_FORMAT: &str = "%l: %C | Temp %t (feels %f) | Hum %h | Wind %w";
const WTTR_ATTEMPT_TIMEOUTS: [u64; 2] = [5, 7];
const OPEN_METEO_TIMEOUT: Duration = Duration::from_secs(7);
const WTTR_BASE: &str = "https://wttr.in/";

pub struct WeatherTool {
    client: reqwest::Client,
    default_city: String,
}

impl WeatherTool {
    pub fn new(default_city: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_city: default_city.into(),
        }
    }

    /// The city to look up: the argument if non-blank, else the default.
    pub fn resolve_city(&self, arguments: &serde_json::Value) -> String {
        arguments["city"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.default_city)
            .to_string()
    }

    async fn wttr(&self, city: &str) -> Option<String> {
        let url = wttr_url(city)?;
        for (attempt, secs) in WTTR_ATTEMPT_TIMEOUTS.iter().enumerate() {
            let result = self
                .client
                .get(url.clone())
                .query(&[("format", WTTR_FORMAT)])
                .header("User-Agent", "Mozilla/5.0 (Oracle)")
                .timeout(Duration::from_secs(*secs))
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let text = resp.text().await.unwrap_or_default();
                    let text = text.trim();
                    if text.is_empty() {
                        warn!(city, "wttr.in returned an empty body");
                        return None;
                    }
                    return Some(text.to_string());
                }
                Ok(resp) => warn!(city, status = %resp.status(), attempt = attempt + 1, "wttr.in error status"),
                Err(e) => warn!(city, error = %e, attempt = attempt + 1, "wttr.in request failed"),
            }
        }
        None
    }

    async fn open_meteo(&self, city: &str) -> Option<String> {
        let geo = self
            .client
            .get("https://geocoding-api.open-meteo.com/v1/search")
            .query(&[("name", city), ("count", "1"), ("language", "en"), ("format", "json")])
            .timeout(OPEN_METEO_TIMEOUT)
            .send()
            .await
            .ok()?;
        if !geo.status().is_success() {
            warn!(city, status = %geo.status(), "Open-Meteo geocode error status");
            return None;
        }
        let place = parse_geocode(&geo.text().await.ok()?)?;

        let lat = place.latitude.to_string();
        let lon = place.longitude.to_string();
        let wx = self
            .client
            .get("https://api.open-meteo.com/v1/forecast")
            .query(&[("latitude", lat.as_str()), ("longitude", lon.as_str()), ("current_weather", "true")])
            .timeout(OPEN_METEO_TIMEOUT)
            .send()
            .await
            .ok()?;
        if !wx.status().is_success() {
            warn!(city, status = %wx.status(), "Open-Meteo forecast error status");
            return None;
        }
        format_current_weather(&place, &wx.text().await.ok()?)
    }
}

/// wttr.in URL for `city`, with the city as one percent-encoded path segment.
pub(crate) fn wttr_url(city: &str) -> Option<Url> {
    let mut url = Url::parse(WTTR_BASE).ok()?;
    url.path_segments_mut().ok()?.clear().push(city);
    Some(url)
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeoPlace {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Option<Vec<GeoPlace>>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    #[serde(default)]
    time: Option<String>,
}

/// First geocoding hit, if any.
pub(crate) fn parse_geocode(body: &str) -> Option<GeoPlace> {
    let parsed: GeoResponse = serde_json::from_str(body).ok()?;
    parsed.results?.into_iter().next()
}

/// One-line summary of an Open-Meteo forecast body.
pub(crate) fn format_current_weather(place: &GeoPlace, body: &str) -> Option<String> {
    let parsed: ForecastResponse = serde_json::from_str(body).ok()?;
    let cur = parsed.current_weather?;
    let location = match place.country.as_deref() {
        Some(country) if !country.is_empty() => format!("{}, {}", place.name, country),
        _ => place.name.clone(),
    };
    let mut line = format!("{location}: Temp {}°C | Wind {} km/h", cur.temperature, cur.windspeed);
    if let Some(time) = cur.time {
        line.push_str(&format!(" | Updated {time} (UTC)"));
    }
    Some(line)
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the current weather for a city. Defaults to the user's home city when no city is given. Always call this for weather questions; never guess."
    }

    fn capability(&self) -> Capability {
        Capability::Weather
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name (optional)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let city = self.resolve_city(&arguments);
        debug!(city = %city, "Looking up weather");

        if let Some(report) = self.wttr(&city).await {
            return Ok(ToolOutput::text(report));
        }
        if let Some(report) = self.open_meteo(&city).await {
            return Ok(ToolOutput::text(report));
        }

        Err(ToolError::failed(
            TOOL_NAME,
            format!("weather services are unreachable for {city}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_defaults_when_missing_or_blank() {
        let tool = WeatherTool::new("Chennai");
        assert_eq!(tool.resolve_city(&serde_json::json!({})), "Chennai");
        assert_eq!(tool.resolve_city(&serde_json::json!({"city": "  "})), "Chennai");
        assert_eq!(tool.resolve_city(&serde_json::json!({"city": " Gotham "})), "Gotham");
    }

    #[test]
    fn city_is_one_encoded_path_segment() {
        let url = wttr_url("New York?lang=fr#x").unwrap();
        assert_eq!(url.host_str(), Some("wttr.in"));
        assert_eq!(url.path(), "/New%20York%3Flang=fr%23x");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        assert_eq!(wttr_url("Chennai").unwrap().as_str(), "https://wttr.in/Chennai");
    }

    #[test]
    fn geocode_takes_first_result() {
        let body = r#"{"results":[{"name":"Chennai","latitude":13.08,"longitude":80.27,"country":"India"},{"name":"Other","latitude":0,"longitude":0}]}"#;
        let place = parse_geocode(body).unwrap();
        assert_eq!(place.name, "Chennai");
        assert!(parse_geocode(r#"{"generationtime_ms":0.5}"#).is_none());
    }

    #[test]
    fn formats_current_weather() {
        let place = GeoPlace {
            name: "Chennai".into(),
            latitude: 13.08,
            longitude: 80.27,
            country: Some("India".into()),
        };
        let body = r#"{"current_weather":{"temperature":31.4,"windspeed":12.2,"time":"2026-03-14T09:00"}}"#;
        assert_eq!(
            format_current_weather(&place, body).unwrap(),
            "Chennai, India: Temp 31.4°C | Wind 12.2 km/h | Updated 2026-03-14T09:00 (UTC)"
        );
        assert!(format_current_weather(&place, "{}").is_none());
    }

    #[test]
    fn schema_rejects_unknown_arguments() {
        let schema = WeatherTool::new("Chennai").parameters_schema();
        assert_eq!(schema["additionalProperties"], false);
    }
}
