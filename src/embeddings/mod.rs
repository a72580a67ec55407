// Embeddings module
// Text chunking plus the embedding seam used by ingestion and retrieval

pub mod chunking;
pub mod gemini;


pub use chunking::{ChunkingConfig, PageChunk, TextSpan, chunk_pages, split_text};
pub use gemini::GeminiClient;

use crate::{ConciergeError, Result};

/// Turns text into fixed-dimension vectors.
///
/// The same implementation (and model) must embed both the indexed chunks and
/// the queries searched against them.
pub trait Embedder {
    /// Embed a single query text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed document texts, one vector per input, in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the embedding model, recorded in the index
    fn model_name(&self) -> &str;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    #[inline]
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Check a batch of embeddings returned for `expected_count` inputs and return
/// their common dimension.
#[inline]
pub fn validate_embeddings(vectors: &[Vec<f32>], expected_count: usize) -> Result<usize> {
    if vectors.len() != expected_count {
        return Err(ConciergeError::EmbeddingService(format!(
            "expected {} embeddings, received {}",
            expected_count,
            vectors.len()
        )));
    }

    let Some(first) = vectors.first() else {
        return Ok(0);
    };

    let dimension = first.len();
    if dimension == 0 {
        return Err(ConciergeError::EmbeddingService(
            "received an empty embedding vector".to_string(),
        ));
    }

    for (i, vector) in vectors.iter().enumerate() {
        if vector.len() != dimension {
            return Err(ConciergeError::EmbeddingService(format!(
                "embedding {} has {} dimensions, expected {}",
                i,
                vector.len(),
                dimension
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(ConciergeError::EmbeddingService(format!(
                "embedding {i} contains non-finite values"
            )));
        }
    }

    Ok(dimension)
}
