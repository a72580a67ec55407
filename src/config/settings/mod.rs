
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::{ConciergeError, Result};

pub const CONFIG_FILE_NAME: &str = "config.toml";
const APP_DIR_NAME: &str = "vine-concierge";
const HOME_ENV_VAR: &str = "VINE_CONCIERGE_HOME";

pub const SUPPORTED_UNITS: &[&str] = &["metric", "imperial", "standard"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub tavily: TavilyConfig,
    #[serde(default)]
    pub openweather: OpenWeatherConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Source document re-ingested by `ingest`
    pub document_path: PathBuf,
    /// Directory holding the persisted chunk index
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("data").join("Corpus.pdf"),
            index_dir: PathBuf::from(".vectorstore"),
        }
    }
}

/// Gemini settings, shared by the embedder and the answer generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GoogleConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub batch_size: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta/".to_string(),
            chat_model: "gemini-2.0-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            batch_size: 100,
            temperature: 0.2,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TavilyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.tavily.com/".to_string(),
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenWeatherConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub units: String,
    pub default_city: String,
    pub timeout_secs: u64,
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/".to_string(),
            units: "metric".to_string(),
            default_city: "Napa, CA".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of passages handed to the answer prompt
    pub top_k: usize,
    /// Document questions containing one of these words are searched with `expansion_query`
    pub expansion_keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expansion_query: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            expansion_keywords: ["variety", "varieties", "types", "kinds", "produce", "make"]
                .into_iter()
                .map(String::from)
                .collect(),
            expansion_query: Some(
                "Rhythm Vineyard plantings include Cabernet Sauvignon Merlot Cabernet Franc \
                 Petit Verdot Malbec Sauvignon Blanc Sémillon"
                    .to_string(),
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 100)")]
    InvalidBatchSize(u32),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid timeout: {0} (must be between 1 and 120 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid units: {0} (must be one of metric, imperial, standard)")]
    InvalidUnits(String),
    #[error("Invalid default city: {0:?} (cannot be empty)")]
    InvalidDefaultCity(String),
    #[error("Invalid max results: {0} (must be between 1 and 20)")]
    InvalidMaxResults(usize),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid chunk size: {0} (must be between 100 and 8000)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("{0} is required for {1}")]
    MissingCredential(&'static str, &'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from the default directory, then apply environment overrides.
    #[inline]
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir()?;
        let mut config = Self::load_from(&config_dir)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when it does not exist.
    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path).map_err(|e| {
            ConciergeError::Config(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| {
            ConciergeError::Config(format!(
                "Failed to parse config file {}: {}",
                config_path.display(),
                e
            ))
        })?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config.validate()?;

        Ok(config)
    }

    /// Apply the recognised environment variables; empty values count as unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = get("GOOGLE_API_KEY") {
            self.google.api_key = Some(key);
        }
        if let Some(key) = get("TAVILY_API_KEY") {
            self.tavily.api_key = Some(key);
        }
        if let Some(key) = get("OPENWEATHER_API_KEY") {
            self.openweather.api_key = Some(key);
        }
        if let Some(path) = get("DOC_PATH") {
            self.paths.document_path = PathBuf::from(path);
        }
        if let Some(dir) = get("VECTOR_DIR") {
            self.paths.index_dir = PathBuf::from(dir);
        }
        if let Some(city) = get("DEFAULT_CITY") {
            self.openweather.default_city = city;
        }
        if let Some(model) = get("MODEL_NAME") {
            self.google.chat_model = model;
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            self.google.embedding_model = model;
        }
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()?;

        let config_dir = self.get_base_dir();
        fs::create_dir_all(config_dir).map_err(|_| ConfigError::DirectoryError)?;

        let content = toml::to_string_pretty(self).map_err(ConfigError::from)?;
        fs::write(self.config_file_path(), content)?;

        Ok(())
    }

    /// Resolve the configuration directory: `$VINE_CONCIERGE_HOME`, else the platform config dir.
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.google.validate()?;
        self.tavily.validate()?;
        self.openweather.validate()?;
        self.validate_chunking_config()?;

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(100..=8000).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    /// Google key, needed by embeddings and answer generation
    #[inline]
    pub fn require_google_key(&self) -> Result<&str, ConfigError> {
        require(
            self.google.api_key.as_deref(),
            "GOOGLE_API_KEY",
            "embeddings and answer generation",
        )
    }

    #[inline]
    pub fn require_tavily_key(&self) -> Result<&str, ConfigError> {
        require(self.tavily.api_key.as_deref(), "TAVILY_API_KEY", "web search")
    }

    #[inline]
    pub fn require_openweather_key(&self) -> Result<&str, ConfigError> {
        require(
            self.openweather.api_key.as_deref(),
            "OPENWEATHER_API_KEY",
            "weather and geocoding",
        )
    }
}

fn require<'a>(
    value: Option<&'a str>,
    name: &'static str,
    feature: &'static str,
) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingCredential(name, feature))
}

/// Parse an API base URL. The path always ends in `/` so endpoint joins
/// append to it instead of replacing its last segment.
fn validate_url(url: &str) -> Result<Url, ConfigError> {
    let mut parsed = Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed)
}

fn validate_timeout(timeout_secs: u64) -> Result<(), ConfigError> {
    if !(1..=120).contains(&timeout_secs) {
        return Err(ConfigError::InvalidTimeout(timeout_secs));
    }
    Ok(())
}

impl GoogleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.base_url)?;
        validate_timeout(self.timeout_secs)?;

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 100 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        Ok(())
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        validate_url(&self.base_url)
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.chat_model = model;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }
}

impl TavilyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.base_url)?;
        validate_timeout(self.timeout_secs)?;

        if !(1..=20).contains(&self.max_results) {
            return Err(ConfigError::InvalidMaxResults(self.max_results));
        }

        Ok(())
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        validate_url(&self.base_url)
    }
}

impl OpenWeatherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.base_url)?;
        validate_timeout(self.timeout_secs)?;

        if !SUPPORTED_UNITS.contains(&self.units.as_str()) {
            return Err(ConfigError::InvalidUnits(self.units.clone()));
        }

        if self.default_city.trim().is_empty() {
            return Err(ConfigError::InvalidDefaultCity(self.default_city.clone()));
        }

        Ok(())
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        validate_url(&self.base_url)
    }

    pub fn set_units(&mut self, units: String) -> Result<(), ConfigError> {
        if !SUPPORTED_UNITS.contains(&units.as_str()) {
            return Err(ConfigError::InvalidUnits(units));
        }
        self.units = units;
        Ok(())
    }

    pub fn set_default_city(&mut self, city: String) -> Result<(), ConfigError> {
        if city.trim().is_empty() {
            return Err(ConfigError::InvalidDefaultCity(city));
        }
        self.default_city = city.trim().to_string();
        Ok(())
    }
}
