
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::embeddings::{Embedder, validate_embeddings};
use crate::providers::{LanguageModel, build_agent, describe_error, post_json};
use crate::{ConciergeError, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_BATCH_SIZE: usize = 100;
const QUERY_TASK: &str = "RETRIEVAL_QUERY";
const DOCUMENT_TASK: &str = "RETRIEVAL_DOCUMENT";

/// Client for the Gemini Generative Language API: embeddings and answer generation
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    batch_size: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: [Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Build a client from configuration; fails when no Google API key is set.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_google_key()?.to_string();
        let base_url = config.google.api_url()?;

        Ok(Self {
            base_url,
            api_key,
            chat_model: bare_model_name(&config.google.chat_model).to_string(),
            embedding_model: bare_model_name(&config.google.embedding_model).to_string(),
            temperature: config.google.temperature,
            batch_size: (config.google.batch_size as usize).clamp(1, MAX_BATCH_SIZE),
            agent: build_agent(Duration::from_secs(config.google.timeout_secs)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    fn model_url(&self, model: &str, method: &str) -> Result<Url> {
        self.base_url
            .join(&format!("models/{model}:{method}"))
            .map_err(|e| ConciergeError::Config(format!("invalid Gemini URL: {e}")))
    }

    fn post(&self, url: &Url, body: &str) -> std::result::Result<String, ureq::Error> {
        post_json(
            &self.agent,
            url.as_str(),
            &[(API_KEY_HEADER, self.api_key.as_str())],
            body,
        )
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = format!("models/{}", self.embedding_model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &model,
                    content: Content::text(text),
                    task_type: DOCUMENT_TASK,
                })
                .collect(),
        };

        let url = self.model_url(&self.embedding_model, "batchEmbedContents")?;
        let request_json = serde_json::to_string(&request).map_err(|e| {
            ConciergeError::EmbeddingService(format!("failed to serialize request: {e}"))
        })?;

        let response_text = self.post(&url, &request_json).map_err(|e| {
            warn!("Batch embedding request failed: {}", e);
            ConciergeError::EmbeddingService(describe_error(&e))
        })?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            ConciergeError::EmbeddingService(format!("malformed batch embedding response: {e}"))
        })?;

        let vectors: Vec<Vec<f32>> = response.embeddings.into_iter().map(|e| e.values).collect();
        validate_embeddings(&vectors, texts.len())?;
        Ok(vectors)
    }
}

impl Embedder for GeminiClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Embedding query text (length: {})", text.len());

        let model = format!("models/{}", self.embedding_model);
        let request = EmbedRequest {
            model: &model,
            content: Content::text(text),
            task_type: QUERY_TASK,
        };

        let url = self.model_url(&self.embedding_model, "embedContent")?;
        let request_json = serde_json::to_string(&request).map_err(|e| {
            ConciergeError::EmbeddingService(format!("failed to serialize request: {e}"))
        })?;

        let response_text = self.post(&url, &request_json).map_err(|e| {
            warn!("Embedding request failed: {}", e);
            ConciergeError::EmbeddingService(describe_error(&e))
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            ConciergeError::EmbeddingService(format!("malformed embedding response: {e}"))
        })?;

        let vector = response.embedding.values;
        validate_embeddings(std::slice::from_ref(&vector), 1)?;

        debug!("Generated query embedding with {} dimensions", vector.len());
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts in batches of {}",
            texts.len(),
            self.batch_size
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_single_batch(batch)?);
        }

        // Dimension must also agree across batches
        validate_embeddings(&vectors, texts.len())?;
        Ok(vectors)
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

impl LanguageModel for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            "Generating answer with {} (prompt length: {})",
            self.chat_model,
            prompt.len()
        );

        let request = GenerateRequest {
            contents: [Content::text(prompt)],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let url = self.model_url(&self.chat_model, "generateContent")?;
        let request_json = serde_json::to_string(&request).map_err(|e| {
            ConciergeError::LanguageModel(format!("failed to serialize request: {e}"))
        })?;

        let response_text = self.post(&url, &request_json).map_err(|e| {
            warn!("Generation request failed: {}", e);
            ConciergeError::LanguageModel(describe_error(&e))
        })?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            ConciergeError::LanguageModel(format!("malformed generation response: {e}"))
        })?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ConciergeError::LanguageModel(
                "model returned no text".to_string(),
            ));
        }

        Ok(text)
    }
}

fn bare_model_name(model: &str) -> &str {
    let model = model.trim();
    model.strip_prefix("models/").unwrap_or(model)
}
