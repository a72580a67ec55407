use std::cell::Cell;
use std::collections::BTreeMap;

use super::*;

struct FixedEmbedder {
    vector: Vec<f32>,
    calls: Cell<usize>,
}

impl FixedEmbedder {
    fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: Cell::new(0),
        }
    }
}

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.vector.clone())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(ConciergeError::EmbeddingService("HTTP 503".to_string()))
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ConciergeError::EmbeddingService("HTTP 503".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

fn index_of(embeddings: Vec<Vec<f32>>) -> Index {
    let chunks = embeddings
        .into_iter()
        .enumerate()
        .map(|(id, embedding)| Chunk {
            id,
            text: format!("chunk {id}"),
            metadata: BTreeMap::new(),
            embedding,
        })
        .collect();
    Index::new("test-model", "test.txt", chunks).unwrap()
}

#[test]
fn identical_vectors_score_one() {
    let v = [0.3, -1.2, 4.5, 0.01];
    let score = cosine_similarity(&v, &v).unwrap();
    assert!((score - 1.0).abs() < 1e-6);
}

#[test]
fn opposite_and_orthogonal_vectors() {
    let a = [1.0, 2.0];
    assert!((cosine_similarity(&a, &[-1.0, -2.0]).unwrap() + 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&a, &[2.0, -1.0]).unwrap().abs() < 1e-6);
}

#[test]
fn zero_vector_scores_negative_infinity() {
    assert_eq!(
        cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]),
        Some(f32::NEG_INFINITY)
    );
    assert_eq!(
        cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]),
        Some(f32::NEG_INFINITY)
    );
}

#[test]
fn length_mismatch_has_no_score() {
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), None);
}

#[test]
fn rank_orders_by_descending_score() {
    let index = index_of(vec![
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![0.7, 0.7],
        vec![-1.0, 0.0],
    ]);

    let ranked = rank(&index, &[1.0, 0.0], 10).unwrap();
    let ids: Vec<usize> = ranked.iter().map(|r| r.chunk.id).collect();
    assert_eq!(ids, vec![1, 2, 0, 3]);
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn ties_keep_insertion_order() {
    let index = index_of(vec![
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![2.0, 0.0],
        vec![3.0, 0.0],
    ]);

    let ranked = rank(&index, &[1.0, 0.0], 3).unwrap();
    let ids: Vec<usize> = ranked.iter().map(|r| r.chunk.id).collect();
    assert_eq!(ids, vec![0, 2, 3]);
}

#[test]
fn zero_norm_chunks_rank_last() {
    let index = index_of(vec![vec![0.0, 0.0], vec![-1.0, 0.0], vec![0.0, 0.0]]);

    let ranked = rank(&index, &[1.0, 0.0], 3).unwrap();
    let ids: Vec<usize> = ranked.iter().map(|r| r.chunk.id).collect();
    assert_eq!(ids, vec![1, 0, 2]);
}

#[test]
fn result_length_is_min_of_k_and_index_size() {
    let index = index_of(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]);

    for k in 0..6 {
        let ranked = rank(&index, &[0.5, 0.2], k).unwrap();
        assert_eq!(ranked.len(), k.min(index.len()));
    }
}

#[test]
fn dimension_mismatch_is_reported() {
    let index = index_of(vec![vec![1.0, 0.0, 0.0]]);

    let err = rank(&index, &[1.0, 0.0], 1).unwrap_err();
    assert!(matches!(
        err,
        ConciergeError::DimensionMismatch {
            expected: 2,
            found: 3,
            chunk_id: 0
        }
    ));
}

#[test]
fn retrieve_on_empty_index_skips_embedding() {
    let index = Index::empty();
    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);

    let results = Retriever::new(&index, &embedder)
        .retrieve("anything", 5)
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(embedder.calls.get(), 0);
}

#[test]
fn retrieve_with_zero_k_is_empty() {
    let index = index_of(vec![vec![1.0, 0.0]]);
    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);

    assert!(Retriever::new(&index, &embedder)
        .retrieve("query", 0)
        .unwrap()
        .is_empty());
}

#[test]
fn retrieve_returns_best_matches() {
    let index = index_of(vec![vec![0.0, 1.0], vec![1.0, 0.1]]);
    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);

    let results = Retriever::new(&index, &embedder)
        .retrieve("query", 1)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.id, 1);
    assert_eq!(embedder.calls.get(), 1);
}

#[test]
fn retrieve_propagates_embedding_failure() {
    let index = index_of(vec![vec![1.0, 0.0]]);

    let err = Retriever::new(&index, &FailingEmbedder)
        .retrieve("query", 3)
        .unwrap_err();
    assert!(matches!(err, ConciergeError::EmbeddingService(_)));
}

#[test]
fn retrieve_rejects_non_finite_query_vector() {
    let index = index_of(vec![vec![1.0, 0.0]]);
    let embedder = FixedEmbedder::new(vec![f32::NAN, 0.0]);

    let err = Retriever::new(&index, &embedder)
        .retrieve("query", 3)
        .unwrap_err();
    assert!(matches!(err, ConciergeError::EmbeddingService(_)));
}

#[test]
fn retriever_accepts_trait_objects() {
    let index = index_of(vec![vec![1.0, 0.0]]);
    let embedder: Box<dyn Embedder> = Box::new(FixedEmbedder::new(vec![1.0, 0.0]));

    let results = Retriever::new(&index, embedder.as_ref())
        .retrieve("query", 3)
        .unwrap();
    assert_eq!(results.len(), 1);
}
