
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{SearchResult, WebSearch, build_agent, describe_error, post_json};
use crate::config::Config;
use crate::{ConciergeError, Result};

#[derive(Debug, Clone)]
pub struct TavilyClient {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

impl From<RawResult> for SearchResult {
    #[inline]
    fn from(raw: RawResult) -> Self {
        Self {
            title: raw.title.unwrap_or_default(),
            url: raw.url.unwrap_or_default(),
            snippet: raw.content.unwrap_or_default(),
        }
    }
}

impl TavilyClient {
    /// Build a client from configuration; fails when no Tavily API key is set.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_tavily_key()?.to_string();

        Ok(Self {
            base_url: config.tavily.api_url()?,
            api_key,
            agent: build_agent(Duration::from_secs(config.tavily.timeout_secs)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }
}

impl WebSearch for TavilyClient {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        debug!("Searching the web for {:?} (max {})", query, max_results);

        let url = self
            .base_url
            .join("search")
            .map_err(|e| ConciergeError::Config(format!("invalid Tavily URL: {e}")))?;

        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            ConciergeError::SearchService(format!("failed to serialize request: {e}"))
        })?;

        let bearer = format!("Bearer {}", self.api_key);
        let response_text = post_json(
            &self.agent,
            url.as_str(),
            &[("Authorization", bearer.as_str())],
            &request_json,
        )
        .map_err(|e| {
            warn!("Search request failed: {}", e);
            ConciergeError::SearchService(describe_error(&e))
        })?;

        let response: SearchResponse = serde_json::from_str(&response_text).map_err(|e| {
            ConciergeError::SearchService(format!("malformed search response: {e}"))
        })?;

        let results: Vec<SearchResult> = response
            .results
            .into_iter()
            .take(max_results)
            .map(SearchResult::from)
            .collect();

        debug!("Search returned {} results", results.len());
        Ok(results)
    }
}
