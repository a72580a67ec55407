//! Keyword intent router.
//!
//! Classification is a pure function of the query text: an ordered list of
//! keyword rules is checked top to bottom, the first rule with a keyword
//! contained in the lowercased query wins, and anything unmatched falls back
//! to web search.

#[cfg(test)]
mod tests;

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;

pub const WEATHER_KEYWORDS: &[&str] = &["weather", "temperature", "forecast"];

pub const DOCUMENT_KEYWORDS: &[&str] = &[
    "wine",
    "grape",
    "vineyard",
    "winery",
    "cabernet",
    "merlot",
    "sauvignon",
    "chardonnay",
    "pinot",
    "malbec",
    "fermentation",
    "tasting",
    "vintage",
    "poetry",
    "rhythm",
    "cliff lede",
    "napa",
    "stags leap",
    "variety",
    "varieties",
];

static DEFAULT_ROUTER: LazyLock<Router> = LazyLock::new(Router::default);

/// How a query is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Answer from the ingested business document
    #[serde(rename = "rag")]
    Document,
    Weather,
    Search,
}

impl Intent {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "rag",
            Self::Weather => "weather",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for Intent {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase keywords matched as substrings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    #[inline]
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// `haystack` must already be lowercase
    #[inline]
    pub fn matches(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

/// Ordered keyword rules with a fallback intent
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<(KeywordSet, Intent)>,
    fallback: Intent,
}

impl Default for Router {
    #[inline]
    fn default() -> Self {
        Self::new(
            vec![
                (KeywordSet::new(WEATHER_KEYWORDS), Intent::Weather),
                (KeywordSet::new(DOCUMENT_KEYWORDS), Intent::Document),
            ],
            Intent::Search,
        )
    }
}

impl Router {
    #[inline]
    pub fn new(rules: Vec<(KeywordSet, Intent)>, fallback: Intent) -> Self {
        Self { rules, fallback }
    }

    #[inline]
    pub fn classify(&self, query: &str) -> Intent {
        let query = query.to_lowercase();
        self.rules
            .iter()
            .find(|(keywords, _)| keywords.matches(&query))
            .map_or(self.fallback, |&(_, intent)| intent)
    }
}

/// Classify with the built-in keyword tables
#[inline]
pub fn classify(query: &str) -> Intent {
    DEFAULT_ROUTER.classify(query)
}

/// Pick the text to search the index with for a document question.
///
/// Questions asking which kinds of wine are made are answered better by a
/// fixed query listing the estate's plantings than by the question itself.
#[inline]
pub fn retrieval_query<'q>(query: &'q str, config: &RetrievalConfig) -> Cow<'q, str> {
    let Some(expansion) = config
        .expansion_query
        .as_deref()
        .filter(|q| !q.trim().is_empty())
    else {
        return Cow::Borrowed(query);
    };

    let lowered = query.to_lowercase();
    if KeywordSet::new(&config.expansion_keywords).matches(&lowered) {
        Cow::Owned(expansion.to_string())
    } else {
        Cow::Borrowed(query)
    }
}
