//! Query pipeline.
//!
//! [`Concierge`] routes each question to one of three handlers (document
//! retrieval, web search or current weather) and returns a structured
//! [`Answer`]. External services sit behind traits so the pipeline can run on
//! fakes; a service whose credentials are missing only fails the handler that
//! needs it.

mod prompts;


use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::embeddings::{Embedder, GeminiClient};
use crate::geocoding::{Geocoder, GeocodingService};
use crate::index::{IndexHandle, IndexStore};
use crate::providers::{
    LanguageModel, OpenWeatherClient, SearchResult, TavilyClient, Units, WeatherReport,
    WeatherService, WebSearch,
};
use crate::retrieval::Retriever;
use crate::router::{Intent, Router, retrieval_query};
use crate::{ConciergeError, Result};

/// A service that is either usable or missing its configuration
pub enum Backend<T: ?Sized> {
    Ready(Box<T>),
    Unavailable(String),
}

impl<T: ?Sized> Backend<T> {
    /// Wrap a construction result, keeping the failure as the reason
    #[inline]
    pub fn from_result(result: Result<Box<T>>) -> Self {
        result.map_or_else(|e| Self::Unavailable(unavailable_reason(e)), Self::Ready)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The service, or a configuration error naming what is missing
    #[inline]
    pub fn get(&self) -> Result<&T> {
        match self {
            Self::Ready(service) => Ok(&**service),
            Self::Unavailable(reason) => Err(ConciergeError::Config(reason.clone())),
        }
    }
}

/// The external services a [`Concierge`] talks to
pub struct Backends {
    pub embedder: Backend<dyn Embedder>,
    pub llm: Backend<dyn LanguageModel>,
    pub search: Backend<dyn WebSearch>,
    pub weather: Backend<dyn WeatherService>,
    pub geocoder: Backend<dyn GeocodingService>,
}

impl Backends {
    /// Build the HTTP clients the configuration has credentials for
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        let gemini = GeminiClient::new(config).map_err(unavailable_reason);
        let openweather = OpenWeatherClient::new(config).map_err(unavailable_reason);
        let search = TavilyClient::new(config).map_err(unavailable_reason);

        let backends = Self {
            embedder: ready_or_unavailable(
                gemini.clone().map(|c| Box::new(c) as Box<dyn Embedder>),
            ),
            llm: ready_or_unavailable(gemini.map(|c| Box::new(c) as Box<dyn LanguageModel>)),
            search: ready_or_unavailable(search.map(|c| Box::new(c) as Box<dyn WebSearch>)),
            weather: ready_or_unavailable(
                openweather
                    .clone()
                    .map(|c| Box::new(c) as Box<dyn WeatherService>),
            ),
            geocoder: ready_or_unavailable(
                openweather.map(|c| Box::new(c) as Box<dyn GeocodingService>),
            ),
        };

        debug!(
            "Backends ready: embeddings={} llm={} search={} weather={} geocoding={}",
            backends.embedder.is_ready(),
            backends.llm.is_ready(),
            backends.search.is_ready(),
            backends.weather.is_ready(),
            backends.geocoder.is_ready()
        );
        backends
    }
}

fn unavailable_reason(error: ConciergeError) -> String {
    match error {
        ConciergeError::Config(reason) => reason,
        other => other.to_string(),
    }
}

fn ready_or_unavailable<T: ?Sized>(result: std::result::Result<Box<T>, String>) -> Backend<T> {
    result.map_or_else(Backend::Unavailable, Backend::Ready)
}

/// The reply to one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub mode: Intent,
    pub answer: String,
    /// Context passages the answer was generated from (document mode)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<String>,
    /// Search hits the answer summarises (search mode)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherReport>,
}

impl Answer {
    fn new(mode: Intent, answer: String) -> Self {
        Self {
            mode,
            answer,
            citations: Vec::new(),
            links: Vec::new(),
            weather: None,
        }
    }
}

pub struct Concierge {
    config: Config,
    index: IndexHandle,
    backends: Backends,
    router: Router,
}

impl Concierge {
    #[inline]
    pub fn new(config: Config, index: IndexHandle, backends: Backends) -> Self {
        Self {
            config,
            index,
            backends,
            router: Router::default(),
        }
    }

    /// Open the stored index and connect every configured service
    #[inline]
    pub fn from_config(config: Config) -> Result<Self> {
        let index = IndexHandle::open(&IndexStore::from_config(&config))?;
        let backends = Backends::from_config(&config);
        Ok(Self::new(config, index, backends))
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    #[inline]
    pub fn classify(&self, query: &str) -> Intent {
        self.router.classify(query)
    }

    /// Route `query` and answer it
    #[inline]
    pub fn answer(&self, query: &str) -> Result<Answer> {
        let intent = self.classify(query);
        info!("Routing query to {}", intent);

        match intent {
            Intent::Document => self.answer_from_document(query),
            Intent::Search => self.answer_from_search(query),
            Intent::Weather => self.weather_for(&self.config.openweather.default_city),
        }
    }

    /// Current weather for `city`, or for the default city when blank
    #[inline]
    pub fn weather_for(&self, city: &str) -> Result<Answer> {
        let city = match city.trim() {
            "" => self.config.openweather.default_city.trim(),
            given => given,
        };

        let geocoder = self.backends.geocoder.get()?;
        let coordinates = Geocoder::new(geocoder)
            .geocode(city)?
            .ok_or_else(|| ConciergeError::LocationNotFound(city.to_string()))?;

        let units = Units::parse(&self.config.openweather.units).unwrap_or_default();
        let report = self
            .backends
            .weather
            .get()?
            .current_weather(coordinates, units)?;

        let mut answer = Answer::new(
            Intent::Weather,
            prompts::weather_summary(city, &report, units),
        );
        answer.weather = Some(report);
        Ok(answer)
    }

    /// Re-read the stored index and publish it to future queries
    #[inline]
    pub fn reload_index(&self) -> Result<usize> {
        self.index.reload(&IndexStore::from_config(&self.config))
    }

    fn answer_from_document(&self, query: &str) -> Result<Answer> {
        let snapshot = self.index.snapshot();
        let search_query = retrieval_query(query, &self.config.retrieval);
        let top_k = self.config.retrieval.top_k;

        let citations = if snapshot.is_empty() {
            debug!("Index is empty, answering without context");
            Vec::new()
        } else {
            let embedder = self.backends.embedder.get()?;
            let hits = Retriever::new(&snapshot, embedder).retrieve(&search_query, top_k)?;
            prompts::citations(hits.iter().map(|hit| hit.chunk))
        };

        let prompt = prompts::document_prompt(query, &citations);
        let text = self.backends.llm.get()?.generate(&prompt)?;

        let mut answer = Answer::new(Intent::Document, text);
        answer.citations = citations;
        Ok(answer)
    }

    fn answer_from_search(&self, query: &str) -> Result<Answer> {
        let search = self.backends.search.get()?;
        let results = search.search(query, self.config.tavily.max_results)?;

        let prompt = prompts::search_prompt(query, &results);
        let text = self.backends.llm.get()?.generate(&prompt)?;

        let mut answer = Answer::new(Intent::Search, text);
        answer.links = results;
        Ok(answer)
    }
}
