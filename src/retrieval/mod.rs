#[cfg(test)]
mod tests;

use tracing::debug;

use crate::embeddings::Embedder;
use crate::index::{Chunk, Index};
use crate::{ConciergeError, Result};

/// A chunk paired with its similarity to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Cosine similarity of two vectors.
///
/// Returns `None` when the lengths differ. A zero-norm vector on either side
/// scores `f32::NEG_INFINITY` so it ranks below every well-formed chunk.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Some(f32::NEG_INFINITY);
    }

    Some((dot / denom).clamp(-1.0, 1.0) as f32)
}

/// Score every chunk against `query` and keep the best `k`, highest first.
/// Equal scores keep index order.
#[inline]
pub fn rank<'a>(index: &'a Index, query: &[f32], k: usize) -> Result<Vec<ScoredChunk<'a>>> {
    let mut scored = index
        .chunks()
        .iter()
        .map(|chunk| {
            cosine_similarity(query, &chunk.embedding)
                .map(|score| ScoredChunk { chunk, score })
                .ok_or(ConciergeError::DimensionMismatch {
                    expected: query.len(),
                    found: chunk.embedding.len(),
                    chunk_id: chunk.id,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    Ok(scored)
}

/// Exhaustive nearest-neighbour search over one index snapshot
pub struct Retriever<'a, E: Embedder + ?Sized> {
    index: &'a Index,
    embedder: &'a E,
}

impl<'a, E: Embedder + ?Sized> Retriever<'a, E> {
    #[inline]
    pub fn new(index: &'a Index, embedder: &'a E) -> Self {
        Self { index, embedder }
    }

    /// Embed `query` and return the `k` most similar chunks.
    ///
    /// An empty index (or `k == 0`) yields an empty result without calling the
    /// embedder.
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk<'a>>> {
        if self.index.is_empty() || k == 0 {
            debug!("Skipping retrieval: {} chunks, k = {}", self.index.len(), k);
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        if query_vector.is_empty() || query_vector.iter().any(|v| !v.is_finite()) {
            return Err(ConciergeError::EmbeddingService(
                "query embedding is empty or contains non-finite values".to_string(),
            ));
        }

        let results = rank(self.index, &query_vector, k)?;
        debug!(
            "Retrieved {} of {} chunks (top score {:?})",
            results.len(),
            self.index.len(),
            results.first().map(|r| r.score)
        );
        Ok(results)
    }
}
