//! Persisted chunk index.
//!
//! An [`Index`] is an immutable value built in full by ingestion. [`IndexStore`]
//! writes it to a single JSON file, replacing the previous file atomically, and
//! [`IndexHandle`] is the shared pointer that readers snapshot and ingestion
//! re-points.


use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::{ConciergeError, Result};

pub const INDEX_FILE_NAME: &str = "chunks.json";
const TEMP_FILE_NAME: &str = "chunks.json.tmp";
pub const INDEX_VERSION: u32 = 1;

/// A scalar metadata value attached to a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for MetadataValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    #[inline]
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Float(value as f64), Self::Integer)
    }
}

impl From<f64> for MetadataValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for MetadataValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetadataValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for MetadataValue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based position of the chunk in its index
    pub id: usize,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
    pub embedding: Vec<f32>,
}

impl Chunk {
    #[inline]
    pub fn page(&self) -> Option<i64> {
        match self.metadata.get("page") {
            Some(MetadataValue::Integer(page)) => Some(*page),
            _ => None,
        }
    }

    /// Page marker for citations, `?` when the chunk has none
    #[inline]
    pub fn page_label(&self) -> String {
        self.metadata
            .get("page")
            .map_or_else(|| "?".to_string(), ToString::to_string)
    }
}

/// A complete, internally consistent set of chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    version: u32,
    generation: Uuid,
    created_at: DateTime<Utc>,
    embedding_model: String,
    dimension: usize,
    source: String,
    chunks: Vec<Chunk>,
}

impl Index {
    /// Build a new index generation. Chunk ids must run 0..n in order and every
    /// embedding must share the first chunk's dimension.
    #[inline]
    pub fn new(
        embedding_model: impl Into<String>,
        source: impl Into<String>,
        chunks: Vec<Chunk>,
    ) -> Result<Self> {
        let index = Self {
            version: INDEX_VERSION,
            generation: Uuid::new_v4(),
            created_at: Utc::now(),
            embedding_model: embedding_model.into(),
            dimension: chunks.first().map_or(0, |c| c.embedding.len()),
            source: source.into(),
            chunks,
        };
        index.validate()?;
        Ok(index)
    }

    /// The state before any ingestion: no chunks at all
    #[inline]
    pub fn empty() -> Self {
        Self {
            version: INDEX_VERSION,
            generation: Uuid::nil(),
            created_at: DateTime::<Utc>::default(),
            embedding_model: String::new(),
            dimension: 0,
            source: String::new(),
            chunks: Vec::new(),
        }
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn generation(&self) -> Uuid {
        self.generation
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Check the structural invariants every stored index must satisfy
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.version != INDEX_VERSION {
            return Err(ConciergeError::Index(format!(
                "unsupported index version {} (expected {})",
                self.version, INDEX_VERSION
            )));
        }

        if !self.chunks.is_empty() && self.dimension == 0 {
            return Err(ConciergeError::Index(
                "index has chunks but zero embedding dimension".to_string(),
            ));
        }

        for (position, chunk) in self.chunks.iter().enumerate() {
            if chunk.id != position {
                return Err(ConciergeError::Index(format!(
                    "chunk at position {} has id {}",
                    position, chunk.id
                )));
            }
            if chunk.text.trim().is_empty() {
                return Err(ConciergeError::Index(format!("chunk {} has no text", chunk.id)));
            }
            if chunk.embedding.len() != self.dimension {
                return Err(ConciergeError::Index(format!(
                    "chunk {} has {} dimensions, index declares {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.dimension
                )));
            }
        }

        Ok(())
    }
}

/// On-disk home of the index: one JSON file replaced as a whole
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    #[inline]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.paths.index_dir)
    }

    #[inline]
    pub fn path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    #[inline]
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Load the stored index; `None` when nothing has been ingested yet
    #[inline]
    pub fn load(&self) -> Result<Option<Index>> {
        let path = self.path();
        if !path.is_file() {
            debug!("No index at {}", path.display());
            return Ok(None);
        }

        let file = File::open(&path)?;
        let index: Index = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ConciergeError::Index(format!("malformed index file {}: {}", path.display(), e))
        })?;
        index.validate()?;

        debug!(
            "Loaded index generation {} with {} chunks from {}",
            index.generation,
            index.len(),
            path.display()
        );
        Ok(Some(index))
    }

    /// Persist `index`, replacing any previous one. Readers of the file see
    /// either the old index or the new one, never a partial write.
    #[inline]
    pub fn save(&self, index: &Index) -> Result<()> {
        index.validate()?;
        fs::create_dir_all(&self.dir)?;

        let temp_path = self.dir.join(TEMP_FILE_NAME);
        let written = write_index_file(&temp_path, index)
            .and_then(|()| fs::rename(&temp_path, self.path()).map_err(ConciergeError::from));

        if let Err(e) = written {
            warn!("Failed to write index to {}: {}", self.dir.display(), e);
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!("Could not remove {}: {}", temp_path.display(), cleanup);
            }
            return Err(e);
        }

        info!(
            "Saved index generation {} ({} chunks) to {}",
            index.generation,
            index.len(),
            self.path().display()
        );
        Ok(())
    }

    /// Remove the stored index. Returns whether there was one.
    #[inline]
    pub fn delete(&self) -> Result<bool> {
        match fs::remove_file(self.path()) {
            Ok(()) => {
                info!("Deleted index at {}", self.path().display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_index_file(path: &Path, index: &Index) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, index)
        .map_err(|e| ConciergeError::Index(format!("failed to serialize index: {e}")))?;
    writer.flush()?;

    let file = writer
        .into_inner()
        .map_err(|e| ConciergeError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

/// Shared, atomically re-pointable reference to the current index.
///
/// Queries take a [`snapshot`](Self::snapshot) and keep using it even if a new
/// generation is published meanwhile.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<Index>>>,
}

impl IndexHandle {
    #[inline]
    pub fn new(index: Index) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    #[inline]
    pub fn empty() -> Self {
        Self::new(Index::empty())
    }

    /// Open whatever the store holds, or an empty index if nothing was ingested
    #[inline]
    pub fn open(store: &IndexStore) -> Result<Self> {
        Ok(Self::new(store.load()?.unwrap_or_else(Index::empty)))
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<Index> {
        Arc::clone(&self.current.read())
    }

    /// Publish a new generation, returning the one it replaced
    #[inline]
    pub fn replace(&self, index: Index) -> Arc<Index> {
        let next = Arc::new(index);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Re-read the store and publish what it holds. Returns the chunk count.
    #[inline]
    pub fn reload(&self, store: &IndexStore) -> Result<usize> {
        let index = store.load()?.unwrap_or_else(Index::empty);
        let count = index.len();
        self.replace(index);
        Ok(count)
    }
}
