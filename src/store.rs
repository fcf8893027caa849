//! Vector store abstraction for the knowledge base.
//!
//! The [`VectorStore`] trait is the capability boundary around "nearest
//! neighbor over text": callers hand it `(text, metadata, id)` triples and
//! ask for the `k` most similar texts to a query. Distances are cosine
//! distances (0 = identical, 2 = maximally dissimilar), returned
//! nearest-first.
//!
//! Implementations must be `Send + Sync` and safe for concurrent callers.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`add`](VectorStore::add) | Embed and persist a batch of chunks |
//! | [`query`](VectorStore::query) | k-nearest-neighbor search over stored chunks |
//! | [`count`](VectorStore::count) | Number of stored chunks |
//! | [`reset`](VectorStore::reset) | Delete the whole collection |

use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_distance, Embedder};
use crate::models::ChunkMetadata;

/// Result of a similarity query: parallel vectors ordered nearest-first.
///
/// All four vectors have the same length, which may be smaller than the
/// requested `k` (and zero for an empty collection).
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Abstract vector store over the knowledge-base chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and persist a batch of chunks. The three slices are parallel;
    /// ids are expected to be unique across the collection.
    async fn add(
        &self,
        texts: &[String],
        metadatas: &[ChunkMetadata],
        ids: &[String],
    ) -> Result<()>;

    /// Return up to `k` stored chunks nearest to `query`, nearest-first.
    ///
    /// Requesting more results than exist is not an error — fewer are
    /// returned. An empty collection yields an all-empty result.
    async fn query(&self, query: &str, k: usize) -> Result<QueryResult>;

    /// Number of chunks currently stored.
    async fn count(&self) -> Result<usize>;

    /// Delete every stored chunk. Irrecoverable; callers must re-index.
    async fn reset(&self) -> Result<()>;
}

// ============ In-memory implementation ============

struct StoredChunk {
    id: String,
    text: String,
    metadata: ChunkMetadata,
    vector: Vec<f32>,
}

/// In-memory [`VectorStore`] backed by brute-force cosine search.
///
/// Used by the test suite and usable as a throwaway store for experiments.
/// Embedding still goes through the injected [`Embedder`].
pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    rows: RwLock<Vec<StoredChunk>>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            rows: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(
        &self,
        texts: &[String],
        metadatas: &[ChunkMetadata],
        ids: &[String],
    ) -> Result<()> {
        if texts.len() != metadatas.len() || texts.len() != ids.len() {
            bail!(
                "mismatched batch: {} texts, {} metadatas, {} ids",
                texts.len(),
                metadatas.len(),
                ids.len()
            );
        }
        if texts.is_empty() {
            return Ok(());
        }

        let vectors = self.embedder.embed_texts(texts).await?;

        let mut rows = self.rows.write().unwrap();
        for ((text, metadata), (id, vector)) in texts
            .iter()
            .zip(metadatas.iter())
            .zip(ids.iter().zip(vectors.into_iter()))
        {
            // Same id resubmitted replaces the previous row.
            rows.retain(|r| &r.id != id);
            rows.push(StoredChunk {
                id: id.clone(),
                text: text.clone(),
                metadata: metadata.clone(),
                vector,
            });
        }
        Ok(())
    }

    async fn query(&self, query: &str, k: usize) -> Result<QueryResult> {
        if self.rows.read().unwrap().is_empty() || k == 0 {
            return Ok(QueryResult::default());
        }

        let query_vec = self.embedder.embed_query(query).await?;

        let rows = self.rows.read().unwrap();
        let mut scored: Vec<(f32, &StoredChunk)> = rows
            .iter()
            .map(|row| (cosine_distance(&query_vec, &row.vector), row))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        let mut result = QueryResult::default();
        for (distance, row) in scored {
            result.ids.push(row.id.clone());
            result.texts.push(row.text.clone());
            result.metadatas.push(row.metadata.clone());
            result.distances.push(distance);
        }
        Ok(result)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().unwrap().len())
    }

    async fn reset(&self) -> Result<()> {
        self.rows.write().unwrap().clear();
        Ok(())
    }
}
