
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{Units, WeatherReport, WeatherService, build_agent, describe_error};
use crate::config::Config;
use crate::geocoding::{Coordinates, GeoCandidate, GeocodingService};
use crate::{ConciergeError, Result};

const GEOCODING_PATH: &str = "geo/1.0/direct";
const WEATHER_PATH: &str = "data/2.5/weather";

/// OpenWeather client: forward geocoding and current conditions
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    main: Option<MainReadings>,
    #[serde(default)]
    weather: Vec<Condition>,
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<f64>,
}

impl TryFrom<WeatherResponse> for WeatherReport {
    type Error = ConciergeError;

    #[inline]
    fn try_from(response: WeatherResponse) -> Result<Self> {
        let temperature = response
            .main
            .as_ref()
            .and_then(|m| m.temp)
            .ok_or_else(|| {
                ConciergeError::WeatherService("response has no temperature".to_string())
            })?;

        Ok(Self {
            temperature,
            conditions: response
                .weather
                .into_iter()
                .next()
                .and_then(|c| c.description)
                .unwrap_or_else(|| "unknown".to_string()),
            humidity: response.main.and_then(|m| m.humidity),
            wind_speed: response.wind.and_then(|w| w.speed),
        })
    }
}

impl OpenWeatherClient {
    /// Build a client from configuration; fails when no OpenWeather API key is set.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_openweather_key()?.to_string();

        Ok(Self {
            base_url: config.openweather.api_url()?,
            api_key,
            agent: build_agent(Duration::from_secs(config.openweather.timeout_secs)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ConciergeError::Config(format!("invalid OpenWeather URL: {e}")))
    }

    fn get(&self, url: &Url, params: &[(&str, String)]) -> std::result::Result<String, ureq::Error> {
        let mut request = self.agent.get(url.as_str());
        for (name, value) in params {
            request = request.query(*name, value);
        }
        request
            .query("appid", &self.api_key)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
    }
}

impl GeocodingService for OpenWeatherClient {
    fn direct(&self, query: &str, limit: usize) -> Result<Vec<GeoCandidate>> {
        debug!("Geocoding {:?} (limit {})", query, limit);

        let url = self.endpoint(GEOCODING_PATH)?;
        let response_text = self
            .get(
                &url,
                &[("q", query.to_string()), ("limit", limit.to_string())],
            )
            .map_err(|e| {
                warn!("Geocoding request for {:?} failed: {}", query, e);
                ConciergeError::GeocodingService(describe_error(&e))
            })?;

        // The service answers `null` as readily as `[]` for no match
        let candidates: Option<Vec<GeoCandidate>> = serde_json::from_str(&response_text)
            .map_err(|e| {
                ConciergeError::GeocodingService(format!("malformed geocoding response: {e}"))
            })?;

        Ok(candidates.unwrap_or_default())
    }
}

impl WeatherService for OpenWeatherClient {
    fn current_weather(&self, coordinates: Coordinates, units: Units) -> Result<WeatherReport> {
        debug!("Fetching current weather at {} ({})", coordinates, units);

        let url = self.endpoint(WEATHER_PATH)?;
        let response_text = self
            .get(
                &url,
                &[
                    ("lat", coordinates.lat.to_string()),
                    ("lon", coordinates.lon.to_string()),
                    ("units", units.as_str().to_string()),
                ],
            )
            .map_err(|e| {
                warn!("Weather request failed: {}", e);
                ConciergeError::WeatherService(describe_error(&e))
            })?;

        let response: WeatherResponse = serde_json::from_str(&response_text).map_err(|e| {
            ConciergeError::WeatherService(format!("malformed weather response: {e}"))
        })?;

        response.try_into()
    }
}
