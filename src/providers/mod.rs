// External service clients
// Blocking HTTP adapters for search, weather and language-model services

pub mod openweather;
pub mod tavily;


use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::geocoding::Coordinates;

pub use crate::embeddings::gemini::GeminiClient;
pub use openweather::OpenWeatherClient;
pub use tavily::TavilyClient;

/// One web search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Current conditions at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temperature: f64,
    pub conditions: String,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
}

/// Measurement system understood by the weather service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metric" => Some(Self::Metric),
            "imperial" => Some(Self::Imperial),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
            Self::Standard => "standard",
        }
    }

    #[inline]
    pub const fn temperature_symbol(self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
            Self::Standard => "K",
        }
    }

    #[inline]
    pub const fn speed_symbol(self) -> &'static str {
        match self {
            Self::Metric | Self::Standard => "m/s",
            Self::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait WebSearch {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

pub trait WeatherService {
    fn current_weather(&self, coordinates: Coordinates, units: Units) -> Result<WeatherReport>;
}

/// Opaque prompt-to-text generation
pub trait LanguageModel {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build a blocking HTTP agent whose every request is bounded by `timeout`
#[inline]
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Describe a failed request for an error message. Calls are never retried here.
pub(crate) fn describe_error(error: &ureq::Error) -> String {
    match error {
        ureq::Error::StatusCode(status) => match status {
            401 | 403 => format!("HTTP {status} (check the API key)"),
            429 => format!("HTTP {status} (rate limited)"),
            _ => format!("HTTP {status}"),
        },
        ureq::Error::Timeout(_) => "request timed out".to_string(),
        ureq::Error::HostNotFound => "host not found".to_string(),
        ureq::Error::ConnectionFailed => "connection failed".to_string(),
        other => other.to_string(),
    }
}

/// POST a JSON body and return the response text
pub(crate) fn post_json(
    agent: &ureq::Agent,
    url: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> std::result::Result<String, ureq::Error> {
    let mut request = agent.post(url).header("Content-Type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
        .send(body)
        .and_then(|mut resp| resp.body_mut().read_to_string())
}
