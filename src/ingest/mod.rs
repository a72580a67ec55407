//! Ingestion pipeline: load, chunk, embed, then publish a new index generation.
//!
//! Every step must succeed before anything is written. The previous index stays
//! in place until the new one has been completely persisted.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::document::load_document;
use crate::embeddings::{ChunkingConfig, Embedder, PageChunk, chunk_pages, validate_embeddings};
use crate::index::{Chunk, Index, IndexHandle, IndexStore, MetadataValue};
use crate::{ConciergeError, Result};

const DEFAULT_BATCH_SIZE: usize = 100;

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks_written: usize,
    pub pages_loaded: usize,
    pub dimension: usize,
    pub generation: Uuid,
    pub index_path: PathBuf,
}

pub struct Ingestor<'a, E: Embedder + ?Sized> {
    embedder: &'a E,
    store: &'a IndexStore,
    chunking: ChunkingConfig,
    batch_size: usize,
    progress: ProgressBar,
}

impl<'a, E: Embedder + ?Sized> Ingestor<'a, E> {
    #[inline]
    pub fn new(embedder: &'a E, store: &'a IndexStore, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            store,
            chunking,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: ProgressBar::hidden(),
        }
    }

    #[inline]
    pub fn from_config(embedder: &'a E, store: &'a IndexStore, config: &Config) -> Self {
        Self::new(embedder, store, config.chunking.clone())
            .with_batch_size(config.google.batch_size as usize)
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Report embedding progress on `progress`, one tick per chunk
    #[inline]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Build a complete index from `path` without persisting it.
    /// Returns the index and the number of pages loaded.
    #[inline]
    pub fn build_index(&self, path: &Path) -> Result<(Index, usize)> {
        let pages = load_document(path)?;
        let chunks = chunk_pages(&pages, &self.chunking);
        info!(
            "Split {} pages of {} into {} chunks",
            pages.len(),
            path.display(),
            chunks.len()
        );

        let embeddings = self.embed_chunks(&chunks)?;
        let records = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(id, (chunk, embedding))| to_record(id, chunk, embedding))
            .collect();

        let index = Index::new(
            self.embedder.model_name(),
            path.display().to_string(),
            records,
        )?;
        Ok((index, pages.len()))
    }

    /// Rebuild the index from `path` and atomically replace the stored one
    #[inline]
    pub fn ingest(&self, path: &Path) -> Result<IngestReport> {
        self.ingest_index(path).map(|(report, _)| report)
    }

    /// Like [`ingest`](Self::ingest), then point `handle` at the new generation
    #[inline]
    pub fn ingest_and_publish(&self, path: &Path, handle: &IndexHandle) -> Result<IngestReport> {
        let (report, index) = self.ingest_index(path)?;
        handle.replace(index);
        debug!("Published index generation {}", report.generation);
        Ok(report)
    }

    fn ingest_index(&self, path: &Path) -> Result<(IngestReport, Index)> {
        let (index, pages_loaded) = self.build_index(path)?;
        self.store.save(&index)?;

        let report = IngestReport {
            chunks_written: index.len(),
            pages_loaded,
            dimension: index.dimension(),
            generation: index.generation(),
            index_path: self.store.path(),
        };
        info!(
            "Ingested {} chunks ({} dimensions) into {}",
            report.chunks_written,
            report.dimension,
            report.index_path.display()
        );
        Ok((report, index))
    }

    fn embed_chunks(&self, chunks: &[PageChunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Err(ConciergeError::DocumentLoad(
                "document produced no chunks to embed".to_string(),
            ));
        }

        self.progress.set_length(chunks.len() as u64);
        self.progress.set_position(0);

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            validate_embeddings(&vectors, texts.len())?;

            embeddings.extend(vectors);
            self.progress.inc(batch.len() as u64);
        }

        // Batches must agree on dimension with each other
        validate_embeddings(&embeddings, chunks.len())?;
        self.progress.finish_and_clear();
        Ok(embeddings)
    }
}

fn to_record(id: usize, chunk: PageChunk, embedding: Vec<f32>) -> Chunk {
    let mut metadata = BTreeMap::new();
    metadata.insert("page".to_string(), MetadataValue::from(chunk.page));
    metadata.insert("source".to_string(), MetadataValue::from(chunk.source));
    metadata.insert(
        "start_index".to_string(),
        MetadataValue::from(chunk.start_index),
    );

    Chunk {
        id,
        text: chunk.text,
        metadata,
        embedding,
    }
}
