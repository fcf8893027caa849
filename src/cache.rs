//! Semantic response cache.
//!
//! Sits in front of the language model: a reply generated for a given
//! (query, retrieved-context) pair is stored under a digest of the pair and
//! served directly the next time the same pair comes in, skipping the model
//! call entirely.
//!
//! The cache is best-effort. Lookup and store failures are the caller's to
//! swallow — a broken cache must never fail a request that could otherwise
//! be answered.
//!
//! # Key derivation
//!
//! `key = sha256(lowercase(trim(query)) + "|" + context)`. Normalizing the
//! query makes `" What do you do? "` and `"what do you do?"` share an
//! entry; including the context keeps entries from different knowledge-base
//! states apart.
//!
//! # Expiry and eviction
//!
//! Entries expire `ttl_secs` after creation (expired rows are treated as
//! absent even if still on disk). When the stored bytes exceed
//! `max_bytes`, least-recently-used entries are evicted; lookups refresh
//! recency.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::RwLock;

/// A cached reply.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub query: String,
    pub response: String,
    /// Unix timestamp of generation.
    pub timestamp: i64,
    pub metadata: serde_json::Value,
}

/// Derive the cache key for a (query, context) pair.
///
/// Deterministic: identical normalized queries with identical context always
/// map to the same key; distinct contexts practically never collide.
pub fn cache_key(query: &str, context: &str) -> String {
    let combined = format!("{}|{}", query.trim().to_lowercase(), context);
    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Storage abstraction for cached replies.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up a cached reply. Absent and expired entries return `None`.
    /// A hit refreshes the entry's recency for eviction ordering.
    async fn lookup(&self, query: &str, context: &str) -> Result<Option<CachedResponse>>;

    /// Store a reply under the (query, context) key.
    async fn store(
        &self,
        query: &str,
        context: &str,
        response: &str,
        metadata: serde_json::Value,
    ) -> Result<()>;
}

// ============ SQLite implementation ============

/// Disk-backed [`ResponseCache`] over the shared SQLite pool.
pub struct SqliteResponseCache {
    pool: SqlitePool,
    ttl_secs: i64,
    max_bytes: i64,
}

impl SqliteResponseCache {
    pub fn new(pool: SqlitePool, ttl_secs: i64, max_bytes: i64) -> Self {
        Self {
            pool,
            ttl_secs,
            max_bytes,
        }
    }

    /// Delete least-recently-used entries until the byte budget holds.
    async fn evict_over_budget(&self) -> Result<()> {
        loop {
            let total: i64 =
                sqlx::query_scalar("SELECT COALESCE(SUM(size_bytes), 0) FROM response_cache")
                    .fetch_one(&self.pool)
                    .await?;
            if total <= self.max_bytes {
                return Ok(());
            }

            let oldest: Option<String> = sqlx::query_scalar(
                "SELECT key FROM response_cache ORDER BY accessed_at ASC, key ASC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;

            match oldest {
                Some(key) => {
                    sqlx::query("DELETE FROM response_cache WHERE key = ?")
                        .bind(&key)
                        .execute(&self.pool)
                        .await?;
                }
                None => return Ok(()),
            }
        }
    }
}

#[async_trait]
impl ResponseCache for SqliteResponseCache {
    async fn lookup(&self, query: &str, context: &str) -> Result<Option<CachedResponse>> {
        let key = cache_key(query, context);
        let now = chrono::Utc::now().timestamp();

        let row = sqlx::query(
            "SELECT query, response, metadata_json, created_at FROM response_cache WHERE key = ?",
        )
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let created_at: i64 = row.get("created_at");
        if now - created_at > self.ttl_secs {
            // Expired: physically present but logically absent.
            sqlx::query("DELETE FROM response_cache WHERE key = ?")
                .bind(&key)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        sqlx::query("UPDATE response_cache SET accessed_at = ? WHERE key = ?")
            .bind(now)
            .bind(&key)
            .execute(&self.pool)
            .await?;

        let metadata_json: String = row.get("metadata_json");
        let metadata =
            serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Object(Default::default()));

        Ok(Some(CachedResponse {
            query: row.get("query"),
            response: row.get("response"),
            timestamp: created_at,
            metadata,
        }))
    }

    async fn store(
        &self,
        query: &str,
        context: &str,
        response: &str,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let key = cache_key(query, context);
        let now = chrono::Utc::now().timestamp();
        let metadata_json = serde_json::to_string(&metadata)?;
        let size_bytes = (query.len() + response.len() + metadata_json.len()) as i64;

        // Drop expired rows opportunistically so they don't count against
        // the byte budget.
        sqlx::query("DELETE FROM response_cache WHERE ? - created_at > ?")
            .bind(now)
            .bind(self.ttl_secs)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO response_cache (key, query, response, metadata_json, created_at, accessed_at, size_bytes)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                query = excluded.query,
                response = excluded.response,
                metadata_json = excluded.metadata_json,
                created_at = excluded.created_at,
                accessed_at = excluded.accessed_at,
                size_bytes = excluded.size_bytes
            "#,
        )
        .bind(&key)
        .bind(query)
        .bind(response)
        .bind(&metadata_json)
        .bind(now)
        .bind(now)
        .bind(size_bytes)
        .execute(&self.pool)
        .await?;

        self.evict_over_budget().await
    }
}

// ============ In-memory implementation ============

struct MemoryEntry {
    cached: CachedResponse,
    accessed_at: i64,
}

/// In-memory [`ResponseCache`] for tests. Honors TTL; no byte budget.
pub struct MemoryResponseCache {
    ttl_secs: i64,
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryResponseCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl_secs,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn lookup(&self, query: &str, context: &str) -> Result<Option<CachedResponse>> {
        let key = cache_key(query, context);
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.entries.write().unwrap();

        match entries.get_mut(&key) {
            Some(entry) if now - entry.cached.timestamp <= self.ttl_secs => {
                entry.accessed_at = now;
                Ok(Some(entry.cached.clone()))
            }
            Some(_) => {
                entries.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn store(
        &self,
        query: &str,
        context: &str,
        response: &str,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let key = cache_key(query, context);
        let now = chrono::Utc::now().timestamp();
        self.entries.write().unwrap().insert(
            key,
            MemoryEntry {
                cached: CachedResponse {
                    query: query.to_string(),
                    response: response.to_string(),
                    timestamp: now,
                    metadata,
                },
                accessed_at: now,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};

    #[test]
    fn test_key_deterministic() {
        let a = cache_key("What do you do?", "ctx");
        let b = cache_key("What do you do?", "ctx");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_normalizes_query() {
        assert_eq!(cache_key("  Hello  ", "ctx"), cache_key("hello", "ctx"));
    }

    #[test]
    fn test_key_separates_contexts() {
        assert_ne!(cache_key("q", "context one"), cache_key("q", "context two"));
    }

    #[test]
    fn test_key_does_not_normalize_context() {
        assert_ne!(cache_key("q", "CTX"), cache_key("q", "ctx"));
    }

    async fn sqlite_cache(ttl: i64, max_bytes: i64) -> (tempfile::TempDir, SqliteResponseCache) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect(&dir.path().join("cache.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (dir, SqliteResponseCache::new(pool, ttl, max_bytes))
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let (_dir, cache) = sqlite_cache(3600, 1024 * 1024).await;
        cache
            .store("what is this?", "ctx", "an answer", serde_json::json!({}))
            .await
            .unwrap();

        let hit = cache.lookup("what is this?", "ctx").await.unwrap().unwrap();
        assert_eq!(hit.response, "an answer");
        assert_eq!(hit.query, "what is this?");
    }

    #[tokio::test]
    async fn test_unseen_key_absent() {
        let (_dir, cache) = sqlite_cache(3600, 1024 * 1024).await;
        assert!(cache.lookup("never stored", "ctx").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_normalized_query_hits() {
        let (_dir, cache) = sqlite_cache(3600, 1024 * 1024).await;
        cache
            .store("Hello There", "ctx", "hi", serde_json::json!({}))
            .await
            .unwrap();
        assert!(cache
            .lookup("  hello there  ", "ctx")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_absent() {
        let (_dir, cache) = sqlite_cache(3600, 1024 * 1024).await;
        cache
            .store("stale question", "ctx", "old answer", serde_json::json!({}))
            .await
            .unwrap();

        // Backdate the entry past its TTL.
        sqlx::query("UPDATE response_cache SET created_at = created_at - 7200")
            .execute(&cache.pool)
            .await
            .unwrap();

        assert!(cache
            .lookup("stale question", "ctx")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_lru_eviction_under_byte_budget() {
        // Budget fits roughly two of the three entries.
        let (_dir, cache) = sqlite_cache(3600, 120).await;

        cache
            .store("first", "c", &"a".repeat(50), serde_json::json!({}))
            .await
            .unwrap();
        cache
            .store("second", "c", &"b".repeat(50), serde_json::json!({}))
            .await
            .unwrap();

        // Stores land within the same second; age "second" explicitly so
        // recency ordering is unambiguous.
        sqlx::query("UPDATE response_cache SET accessed_at = accessed_at - 100 WHERE query = 'second'")
            .execute(&cache.pool)
            .await
            .unwrap();

        cache
            .store("third", "c", &"c".repeat(50), serde_json::json!({}))
            .await
            .unwrap();

        let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(size_bytes), 0) FROM response_cache")
            .fetch_one(&cache.pool)
            .await
            .unwrap();
        assert!(total <= 120);

        assert!(cache.lookup("second", "c").await.unwrap().is_none());
        assert!(cache.lookup("first", "c").await.unwrap().is_some());
        assert!(cache.lookup("third", "c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_cache_ttl() {
        // Negative TTL expires everything immediately.
        let cache = MemoryResponseCache::new(-1);
        cache
            .store("q", "c", "a", serde_json::json!({}))
            .await
            .unwrap();
        assert!(cache.lookup("q", "c").await.unwrap().is_none());
        assert!(cache.is_empty());
    }
}
