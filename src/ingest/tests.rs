use std::cell::{Cell, RefCell};
use std::fs;

use tempfile::TempDir;

use super::*;

/// Deterministic embedder: letter frequency over a-z
#[derive(Default)]
struct LetterEmbedder {
    batch_sizes: RefCell<Vec<usize>>,
}

fn letter_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; 26];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    vector
}

impl Embedder for LetterEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(letter_vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_sizes.borrow_mut().push(texts.len());
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "letters"
    }
}

/// Fails on the given batch number, or answers with the wrong number of vectors
struct FaultyEmbedder {
    fail_on_batch: usize,
    short_answer: bool,
    batches: Cell<usize>,
}

impl Embedder for FaultyEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(letter_vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = self.batches.get();
        self.batches.set(batch + 1);
        if batch < self.fail_on_batch {
            return Ok(texts.iter().map(|t| letter_vector(t)).collect());
        }
        if self.short_answer {
            Ok(vec![vec![1.0; 26]])
        } else {
            Err(ConciergeError::EmbeddingService("HTTP 503".to_string()))
        }
    }

    fn model_name(&self) -> &str {
        "faulty"
    }
}

fn write_corpus(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("corpus.txt");
    let pages = [
        "Welcome to Rhythm Vineyard, a family estate in the Stags Leap District.",
        "Our tasting room is open daily from ten to five.",
        "We grow Cabernet Sauvignon, Merlot, Cabernet Franc, Petit Verdot and Malbec.",
        "Orders ship within five business days. Shipping is free over six bottles.",
    ];
    fs::write(&path, pages.join("\x0c")).unwrap();
    path
}

fn small_chunks() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 40,
        chunk_overlap: 10,
    }
}

#[test]
fn ingest_writes_complete_index() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let store = IndexStore::new(dir.path().join("index"));
    let embedder = LetterEmbedder::default();

    let report = Ingestor::new(&embedder, &store, ChunkingConfig::default())
        .ingest(&corpus)
        .unwrap();

    assert_eq!(report.chunks_written, 4);
    assert_eq!(report.pages_loaded, 4);
    assert_eq!(report.dimension, 26);
    assert_eq!(report.index_path, store.path());

    let index = store.load().unwrap().unwrap();
    assert_eq!(index.generation(), report.generation);
    assert_eq!(index.embedding_model(), "letters");
    assert_eq!(index.source(), corpus.display().to_string());

    let grapes = &index.chunks()[2];
    assert_eq!(grapes.id, 2);
    assert_eq!(grapes.page(), Some(2));
    assert!(grapes.text.contains("Cabernet Sauvignon"));
    assert_eq!(
        grapes.metadata.get("start_index"),
        Some(&MetadataValue::Integer(0))
    );
    assert_eq!(
        grapes.metadata.get("source"),
        Some(&MetadataValue::Text(corpus.display().to_string()))
    );
}

#[test]
fn ids_follow_traversal_order() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let store = IndexStore::new(dir.path());
    let embedder = LetterEmbedder::default();

    let (index, _) = Ingestor::new(&embedder, &store, small_chunks())
        .build_index(&corpus)
        .unwrap();

    assert!(index.len() > 4);
    for (position, chunk) in index.chunks().iter().enumerate() {
        assert_eq!(chunk.id, position);
        assert!(chunk.text.chars().count() <= 40);
    }
    let pages: Vec<i64> = index.chunks().iter().filter_map(Chunk::page).collect();
    assert!(pages.windows(2).all(|w| w[0] <= w[1]));
    // build_index alone persists nothing
    assert!(!store.exists());
}

#[test]
fn embeddings_are_requested_in_batches() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let store = IndexStore::new(dir.path());
    let embedder = LetterEmbedder::default();

    let report = Ingestor::new(&embedder, &store, small_chunks())
        .with_batch_size(3)
        .ingest(&corpus)
        .unwrap();

    let sizes = embedder.batch_sizes.borrow().clone();
    assert_eq!(sizes.iter().sum::<usize>(), report.chunks_written);
    assert!(sizes.iter().all(|&s| s <= 3));
    assert_eq!(sizes.len(), report.chunks_written.div_ceil(3));
}

#[test]
fn reingesting_is_equivalent() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let store = IndexStore::new(dir.path().join("index"));
    let embedder = LetterEmbedder::default();
    let ingestor = Ingestor::new(&embedder, &store, small_chunks());

    let first = ingestor.ingest(&corpus).unwrap();
    let first_index = store.load().unwrap().unwrap();
    let second = ingestor.ingest(&corpus).unwrap();
    let second_index = store.load().unwrap().unwrap();

    assert_eq!(first.chunks_written, second.chunks_written);
    assert_ne!(first.generation, second.generation);
    let texts = |index: &Index| -> Vec<String> {
        index.chunks().iter().map(|c| c.text.clone()).collect()
    };
    assert_eq!(texts(&first_index), texts(&second_index));
}

#[test]
fn embedding_failure_keeps_previous_index() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let store = IndexStore::new(dir.path().join("index"));

    let good = LetterEmbedder::default();
    let report = Ingestor::new(&good, &store, small_chunks())
        .ingest(&corpus)
        .unwrap();

    let faulty = FaultyEmbedder {
        fail_on_batch: 1,
        short_answer: false,
        batches: Cell::new(0),
    };
    let err = Ingestor::new(&faulty, &store, small_chunks())
        .with_batch_size(2)
        .ingest(&corpus)
        .unwrap_err();
    assert!(matches!(err, ConciergeError::EmbeddingService(_)));

    let index = store.load().unwrap().unwrap();
    assert_eq!(index.generation(), report.generation);
    assert_eq!(index.embedding_model(), "letters");
}

#[test]
fn malformed_embeddings_abort_ingestion() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let store = IndexStore::new(dir.path().join("index"));

    let faulty = FaultyEmbedder {
        fail_on_batch: 0,
        short_answer: true,
        batches: Cell::new(0),
    };
    let err = Ingestor::new(&faulty, &store, small_chunks())
        .with_batch_size(4)
        .ingest(&corpus)
        .unwrap_err();

    assert!(matches!(err, ConciergeError::EmbeddingService(_)));
    assert!(!store.exists());
}

#[test]
fn missing_document_is_reported() {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::new(dir.path());
    let embedder = LetterEmbedder::default();

    let err = Ingestor::new(&embedder, &store, ChunkingConfig::default())
        .ingest(&dir.path().join("missing.pdf"))
        .unwrap_err();

    assert!(matches!(err, ConciergeError::DocumentNotFound(_)));
    assert!(embedder.batch_sizes.borrow().is_empty());
    assert!(!store.exists());
}

#[test]
fn publish_repoints_handle() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let store = IndexStore::new(dir.path());
    let embedder = LetterEmbedder::default();
    let handle = IndexHandle::empty();
    let before = handle.snapshot();

    let report = Ingestor::new(&embedder, &store, ChunkingConfig::default())
        .ingest_and_publish(&corpus, &handle)
        .unwrap();

    assert!(before.is_empty());
    assert_eq!(handle.snapshot().len(), report.chunks_written);
    assert_eq!(handle.snapshot().generation(), report.generation);
}

#[test]
fn from_config_uses_configured_chunking() {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::new(dir.path());
    let embedder = LetterEmbedder::default();
    let mut config = Config::default();
    config.chunking.chunk_size = 500;
    config.google.batch_size = 7;

    let ingestor = Ingestor::from_config(&embedder, &store, &config);
    assert_eq!(ingestor.chunking.chunk_size, 500);
    assert_eq!(ingestor.batch_size, 7);
}
