//! SQLite-backed [`VectorStore`] implementation.
//!
//! Chunks are embedded through the injected [`Embedder`] at insert time and
//! stored with their vector as a little-endian f32 BLOB. Queries embed the
//! query text, then rank every stored vector by cosine distance in process.
//! Brute-force ranking is deliberate: a personal knowledge base holds a few
//! thousand chunks at most, and it keeps the store free of native
//! vector-index dependencies.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob, Embedder};
use crate::models::{ChunkMetadata, SourceType};
use crate::store::{QueryResult, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }
}

fn source_type_from_str(s: &str) -> SourceType {
    match s {
        "PDF" => SourceType::Pdf,
        _ => SourceType::Text,
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
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

        let mut tx = self.pool.begin().await?;
        for (i, id) in ids.iter().enumerate() {
            let meta = &metadatas[i];
            let blob = vec_to_blob(&vectors[i]);
            sqlx::query(
                r#"
                INSERT INTO kb_chunks (id, source, source_type, chunk_index, total_chunks, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    source_type = excluded.source_type,
                    chunk_index = excluded.chunk_index,
                    total_chunks = excluded.total_chunks,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(id)
            .bind(&meta.source)
            .bind(meta.source_type.as_str())
            .bind(meta.chunk_index as i64)
            .bind(meta.total_chunks as i64)
            .bind(&texts[i])
            .bind(&blob)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, query: &str, k: usize) -> Result<QueryResult> {
        if k == 0 || self.count().await? == 0 {
            return Ok(QueryResult::default());
        }

        let query_vec = self.embedder.embed_query(query).await?;

        let rows = sqlx::query(
            "SELECT id, source, source_type, chunk_index, total_chunks, text, embedding FROM kb_chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        struct Scored {
            id: String,
            text: String,
            metadata: ChunkMetadata,
            distance: f32,
        }

        let mut scored: Vec<Scored> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                let source_type: String = row.get("source_type");
                let chunk_index: i64 = row.get("chunk_index");
                let total_chunks: i64 = row.get("total_chunks");
                Scored {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: ChunkMetadata {
                        source: row.get("source"),
                        source_type: source_type_from_str(&source_type),
                        chunk_index: chunk_index as usize,
                        total_chunks: total_chunks as usize,
                    },
                    distance: cosine_distance(&query_vec, &vector),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        let mut result = QueryResult::default();
        for s in scored {
            result.ids.push(s.id);
            result.texts.push(s.text);
            result.metadatas.push(s.metadata);
            result.distances.push(s.distance);
        }
        Ok(result)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kb_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn reset(&self) -> Result<()> {
        sqlx::query("DELETE FROM kb_chunks")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
