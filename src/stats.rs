//! Database statistics for the `stats` CLI command.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// Counters across every table in the database.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub indexed_chunks: i64,
    pub cache_entries: i64,
    pub cache_bytes: i64,
    pub total_leads: i64,
    pub total_knowledge_gaps: i64,
}

pub async fn gather_stats(pool: &SqlitePool) -> Result<CorpusStats> {
    let indexed_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kb_chunks")
        .fetch_one(pool)
        .await?;
    let cache_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM response_cache")
        .fetch_one(pool)
        .await?;
    let cache_bytes: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(size_bytes), 0) FROM response_cache")
            .fetch_one(pool)
            .await?;
    let total_leads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(pool)
        .await?;
    let total_knowledge_gaps: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_gaps")
        .fetch_one(pool)
        .await?;

    Ok(CorpusStats {
        indexed_chunks,
        cache_entries,
        cache_bytes,
        total_leads,
        total_knowledge_gaps,
    })
}

/// CLI entry point for `concierge stats`.
pub async fn run_stats(pool: &SqlitePool) -> Result<()> {
    let stats = gather_stats(pool).await?;

    println!("indexed chunks:  {}", stats.indexed_chunks);
    println!(
        "cache entries:   {} ({:.2} KiB)",
        stats.cache_entries,
        stats.cache_bytes as f64 / 1024.0
    );
    println!("leads:           {}", stats.total_leads);
    println!("knowledge gaps:  {}", stats.total_knowledge_gaps);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, leads::LeadStore, migrate};

    #[tokio::test]
    async fn test_gather_stats_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect(&dir.path().join("stats.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();

        let leads = LeadStore::new(pool.clone());
        leads.insert_lead("a@example.com", None, None).await.unwrap();
        leads.insert_gap("unanswered").await.unwrap();

        let stats = gather_stats(&pool).await.unwrap();
        assert_eq!(stats.indexed_chunks, 0);
        assert_eq!(stats.cache_entries, 0);
        assert_eq!(stats.total_leads, 1);
        assert_eq!(stats.total_knowledge_gaps, 1);
        pool.close().await;
    }
}
