use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = ConciergeError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum ConciergeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("Failed to load document: {0}")]
    DocumentLoad(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Geocoding service error: {0}")]
    GeocodingService(String),

    #[error("Weather service error: {0}")]
    WeatherService(String),

    #[error("Search service error: {0}")]
    SearchService(String),

    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error(
        "Embedding dimension mismatch for chunk {chunk_id}: expected {expected}, found {found}"
    )]
    DimensionMismatch {
        expected: usize,
        found: usize,
        chunk_id: usize,
    },

    #[error("Could not geocode location: {0}")]
    LocationNotFound(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for ConciergeError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod agent;
pub mod commands;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod geocoding;
pub mod index;
pub mod ingest;
pub mod providers;
pub mod retrieval;
pub mod router;
