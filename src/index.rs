//! Knowledge-base indexing run.
//!
//! Loads every supported file in the knowledge directory, chunks it,
//! attaches per-chunk metadata, assigns deterministic ids
//! (`{file_stem}_chunk_{counter}` with a run-global counter), and submits
//! everything to the vector store in bounded batches.
//!
//! Failure semantics: a single corrupt or unreadable file is logged and
//! skipped — the run completes with however many documents succeeded. An
//! empty or missing knowledge directory is a successful no-op. The one
//! fatal condition is a chunking configuration that cannot make progress
//! (`overlap >= chunk_size`), which aborts before any file is touched.

use anyhow::Result;
use walkdir::WalkDir;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::extract::{load_document, ExtractError};
use crate::models::ChunkMetadata;
use crate::store::VectorStore;

/// Upper bound on chunks submitted per `add` call.
const BATCH_SIZE: usize = 100;

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub chunks_submitted: usize,
}

/// Index the knowledge directory into the vector store.
///
/// With `reset`, the existing collection is deleted first — irrecoverable,
/// the store holds nothing until this run repopulates it.
pub async fn run_index(
    config: &Config,
    store: &dyn VectorStore,
    reset: bool,
) -> Result<IndexReport> {
    // Validate chunking before touching the store; a bad overlap must not
    // destroy a collection it can't rebuild.
    chunk_text("probe", config.knowledge.chunk_size, config.knowledge.overlap)?;

    if reset {
        tracing::info!("resetting vector store collection");
        store.reset().await?;
    }

    let mut report = IndexReport::default();
    let knowledge_dir = &config.knowledge.dir;

    if !knowledge_dir.exists() {
        tracing::warn!(dir = %knowledge_dir.display(), "knowledge directory not found");
        return Ok(report);
    }

    let mut texts: Vec<String> = Vec::new();
    let mut metadatas: Vec<ChunkMetadata> = Vec::new();
    let mut ids: Vec<String> = Vec::new();
    let mut chunk_counter = 0usize;

    let entries = WalkDir::new(knowledge_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let path = entry.path();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let file_stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let (text, source_type) = match load_document(path) {
            Ok(loaded) => loaded,
            Err(ExtractError::UnsupportedExtension(ext)) => {
                tracing::warn!(file = %file_name, ext = %ext, "skipping unsupported file type");
                report.files_skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "failed to load file, skipping");
                report.files_failed += 1;
                continue;
            }
        };

        let chunks = chunk_text(&text, config.knowledge.chunk_size, config.knowledge.overlap)?;
        tracing::info!(file = %file_name, chunks = chunks.len(), "chunked document");

        let total = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            texts.push(chunk);
            metadatas.push(ChunkMetadata {
                source: file_name.clone(),
                source_type,
                chunk_index: i,
                total_chunks: total,
            });
            ids.push(format!("{}_chunk_{}", file_stem, chunk_counter));
            chunk_counter += 1;
        }
        report.files_indexed += 1;
    }

    // Submit in bounded batches to respect store limits.
    for start in (0..texts.len()).step_by(BATCH_SIZE) {
        let end = (start + BATCH_SIZE).min(texts.len());
        store
            .add(&texts[start..end], &metadatas[start..end], &ids[start..end])
            .await?;
    }
    report.chunks_submitted = texts.len();

    if report.chunks_submitted == 0 {
        tracing::warn!("no documents found to index");
    }

    Ok(report)
}

/// CLI entry point for `concierge index`.
pub async fn run_index_command(
    config: &Config,
    store: &dyn VectorStore,
    reset: bool,
) -> Result<()> {
    let report = run_index(config, store, reset).await?;

    println!("index {}", config.knowledge.dir.display());
    println!("  files indexed: {}", report.files_indexed);
    println!("  files skipped: {}", report.files_skipped);
    println!("  files failed: {}", report.files_failed);
    println!("  chunks submitted: {}", report.chunks_submitted);
    println!("  total in store: {}", store.count().await?);
    println!("ok");

    Ok(())
}
