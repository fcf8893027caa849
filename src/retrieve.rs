//! Query-time retrieval: similarity search, relevance filtering, and
//! LLM-ready context formatting.
//!
//! The retriever asks the vector store for the `top_k` nearest chunks,
//! drops anything whose cosine distance exceeds the configured maximum
//! (results exactly at the threshold are kept), and rescales distance onto
//! a `[0, 1]` relevance score. Survivors are kept in the store's
//! nearest-first order — the retriever does not re-sort.
//!
//! An empty result set produces [`NO_CONTEXT_SENTINEL`] rather than an
//! empty string, so the grounding prompt downstream is never malformed.

use anyhow::Result;

use crate::models::RetrievedChunk;
use crate::store::VectorStore;

/// Context block used when nothing relevant was retrieved.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found in knowledge base.";

/// Everything retrieval produces for one query.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub query: String,
    pub results: Vec<RetrievedChunk>,
    /// The formatted block handed to the grounding prompt.
    pub formatted_context: String,
}

/// Retrieve and format grounding context for `query`.
pub async fn retrieve_context(
    store: &dyn VectorStore,
    query: &str,
    top_k: usize,
    max_distance: f32,
) -> Result<RetrievedContext> {
    let raw = store.query(query, top_k).await?;

    let mut results = Vec::with_capacity(raw.len());
    for i in 0..raw.len() {
        let distance = raw.distances[i];
        if distance > max_distance {
            continue;
        }
        results.push(RetrievedChunk {
            text: raw.texts[i].clone(),
            metadata: raw.metadatas[i].clone(),
            distance,
            relevance: (1.0 - distance / 2.0).max(0.0),
        });
    }

    let formatted_context = format_context(&results);

    Ok(RetrievedContext {
        query: query.to_string(),
        results,
        formatted_context,
    })
}

/// Format retrieval results into the context block for the model.
pub fn format_context(results: &[RetrievedChunk]) -> String {
    if results.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    let mut parts = Vec::with_capacity(results.len() * 3 + 2);
    parts.push("=== RELEVANT CONTEXT FROM KNOWLEDGE BASE ===\n".to_string());

    for (i, result) in results.iter().enumerate() {
        parts.push(format!(
            "--- Source {}: {} (relevance: {:.2}) ---",
            i + 1,
            result.metadata.source,
            result.relevance
        ));
        parts.push(result.text.clone());
        parts.push(String::new());
    }

    parts.push("=== END OF CONTEXT ===".to_string());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::models::{ChunkMetadata, SourceType};
    use crate::store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Test embedder with a fixed vector per known text, letting each test
    /// pin exact distances.
    struct FixtureEmbedder;

    #[async_trait]
    impl Embedder for FixtureEmbedder {
        fn model_name(&self) -> &str {
            "fixture"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_texts(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    // distance to the query vector [1, 0]:
                    "identical" => vec![1.0, 0.0],  // 0.0
                    "orthogonal" => vec![0.0, 1.0], // 1.0
                    "opposite" => vec![-1.0, 0.0],  // 2.0
                    _ => vec![1.0, 0.0],            // queries
                })
                .collect())
        }
    }

    fn meta(source: &str) -> ChunkMetadata {
        ChunkMetadata {
            source: source.to_string(),
            source_type: SourceType::Text,
            chunk_index: 0,
            total_chunks: 1,
        }
    }

    async fn seeded_store() -> MemoryVectorStore {
        let store = MemoryVectorStore::new(Arc::new(FixtureEmbedder));
        store
            .add(
                &[
                    "identical".to_string(),
                    "orthogonal".to_string(),
                    "opposite".to_string(),
                ],
                &[meta("near.md"), meta("mid.md"), meta("far.md")],
                &["n_chunk_0".to_string(), "m_chunk_0".to_string(), "f_chunk_0".to_string()],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_filter_drops_strictly_above_threshold() {
        let store = seeded_store().await;
        let ctx = retrieve_context(&store, "query", 3, 1.0).await.unwrap();
        // distance 0.0 and exactly 1.0 survive; 2.0 is dropped.
        assert_eq!(ctx.results.len(), 2);
        assert_eq!(ctx.results[0].metadata.source, "near.md");
        assert_eq!(ctx.results[1].metadata.source, "mid.md");
    }

    #[tokio::test]
    async fn test_at_threshold_retained() {
        let store = seeded_store().await;
        let ctx = retrieve_context(&store, "query", 3, 2.0).await.unwrap();
        assert_eq!(ctx.results.len(), 3);
    }

    #[tokio::test]
    async fn test_relevance_rescaling() {
        let store = seeded_store().await;
        let ctx = retrieve_context(&store, "query", 3, 2.0).await.unwrap();
        assert!((ctx.results[0].relevance - 1.0).abs() < 1e-6);
        assert!((ctx.results[1].relevance - 0.5).abs() < 1e-6);
        assert!(ctx.results[2].relevance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_store_yields_sentinel() {
        let store = MemoryVectorStore::new(Arc::new(FixtureEmbedder));
        let ctx = retrieve_context(&store, "query", 3, 2.0).await.unwrap();
        assert!(ctx.results.is_empty());
        assert_eq!(ctx.formatted_context, NO_CONTEXT_SENTINEL);
    }

    #[tokio::test]
    async fn test_all_filtered_yields_sentinel() {
        let store = MemoryVectorStore::new(Arc::new(FixtureEmbedder));
        store
            .add(
                &["opposite".to_string()],
                &[meta("far.md")],
                &["f_chunk_0".to_string()],
            )
            .await
            .unwrap();
        let ctx = retrieve_context(&store, "query", 3, 0.5).await.unwrap();
        assert_eq!(ctx.formatted_context, NO_CONTEXT_SENTINEL);
    }

    #[tokio::test]
    async fn test_formatted_block_structure() {
        let store = seeded_store().await;
        let ctx = retrieve_context(&store, "query", 2, 2.0).await.unwrap();
        let block = &ctx.formatted_context;
        assert!(block.starts_with("=== RELEVANT CONTEXT FROM KNOWLEDGE BASE ==="));
        assert!(block.ends_with("=== END OF CONTEXT ==="));
        assert!(block.contains("--- Source 1: near.md (relevance: 1.00) ---"));
        assert!(block.contains("identical"));
    }
}
