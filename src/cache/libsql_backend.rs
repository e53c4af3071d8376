//! libSQL cache backend.
//!
//! One row per record. The record travels as a single serialized string
//! blob; liveness is an `expires_at` unix-seconds column compared against
//! the clock at query time, so expired rows vanish from reads before any
//! sweep physically deletes them.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use crate::cache::{ClassificationCache, migrations};
use crate::error::CacheError;
use crate::pipeline::types::ClassificationRecord;

/// libSQL-backed classification cache.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlCache {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlCache {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Open(format!("failed to create cache directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| CacheError::Open(format!("failed to open cache database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| CacheError::Open(format!("failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Classification cache opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory cache (for tests).
    pub async fn new_memory() -> Result<Self, CacheError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| CacheError::Open(format!("failed to create in-memory cache: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| CacheError::Open(format!("failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

fn now_ts() -> i64 {
    Utc::now().timestamp()
}

#[async_trait]
impl ClassificationCache for LibSqlCache {
    async fn exists(&self, id: &str) -> Result<bool, CacheError> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM classifications WHERE message_id = ?1 AND expires_at > ?2 LIMIT 1",
                params![id, now_ts()],
            )
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?;

        Ok(rows
            .next()
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?
            .is_some())
    }

    async fn count(&self) -> Result<u64, CacheError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM classifications WHERE expires_at > ?1",
                params![now_ts()],
            )
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?;

        let row = rows
            .next()
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?
            .ok_or_else(|| CacheError::Query("count query returned no row".to_string()))?;

        let count: i64 = row.get(0).map_err(|e| CacheError::Query(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    async fn get(&self, id: &str) -> Result<Option<ClassificationRecord>, CacheError> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload FROM classifications WHERE message_id = ?1 AND expires_at > ?2",
                params![id, now_ts()],
            )
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?
        else {
            return Ok(None);
        };

        let payload: String = row.get(0).map_err(|e| CacheError::Query(e.to_string()))?;
        let record = ClassificationRecord::decode(&payload).map_err(|e| CacheError::Decode {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }

    async fn put_with_ttl(
        &self,
        record: &ClassificationRecord,
        ttl: chrono::Duration,
    ) -> Result<(), CacheError> {
        let payload = record
            .encode()
            .map_err(|e| CacheError::Encode(e.to_string()))?;
        let now = Utc::now();
        let expires_at = (now + ttl).timestamp();

        // REPLACE only ever displaces a dead row: callers skip live ids.
        self.conn
            .execute(
                "INSERT OR REPLACE INTO classifications
                     (message_id, payload, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.message_id.as_str(),
                    payload,
                    now.to_rfc3339(),
                    expires_at
                ],
            )
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?;

        debug!(id = %record.message_id, expires_at, "Cached classification");
        Ok(())
    }

    async fn iter_all(&self) -> Result<Vec<(String, ClassificationRecord)>, CacheError> {
        let mut rows = self
            .conn
            .query(
                "SELECT message_id, payload FROM classifications WHERE expires_at > ?1",
                params![now_ts()],
            )
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?
        {
            let id: String = row.get(0).map_err(|e| CacheError::Query(e.to_string()))?;
            let payload: String = row.get(1).map_err(|e| CacheError::Query(e.to_string()))?;
            let record = ClassificationRecord::decode(&payload).map_err(|e| CacheError::Decode {
                id: id.clone(),
                reason: e.to_string(),
            })?;
            entries.push((id, record));
        }
        Ok(entries)
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let purged = self
            .conn
            .execute(
                "DELETE FROM classifications WHERE expires_at <= ?1",
                params![now_ts()],
            )
            .await
            .map_err(|e| CacheError::Query(e.to_string()))?;
        Ok(purged as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{Category, Priority, Respond};

    fn record(id: &str) -> ClassificationRecord {
        ClassificationRecord {
            message_id: id.to_string(),
            sender: "Alice <alice@example.com>".to_string(),
            subject: "Standup notes".to_string(),
            category: Category::Work,
            priority: Priority::Normal,
            respond: Respond::No,
        }
    }

    fn hours(n: i64) -> chrono::Duration {
        chrono::Duration::hours(n)
    }

    #[tokio::test]
    async fn put_then_read_back() {
        let cache = LibSqlCache::new_memory().await.unwrap();
        cache.put_with_ttl(&record("m1"), hours(4)).await.unwrap();

        assert!(cache.exists("m1").await.unwrap());
        assert_eq!(cache.count().await.unwrap(), 1);

        let loaded = cache.get("m1").await.unwrap().unwrap();
        assert_eq!(loaded, record("m1"));
    }

    #[tokio::test]
    async fn missing_id_reads_as_absent() {
        let cache = LibSqlCache::new_memory().await.unwrap();
        assert!(!cache.exists("nope").await.unwrap());
        assert!(cache.get("nope").await.unwrap().is_none());
        assert_eq!(cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_dead_on_arrival() {
        let cache = LibSqlCache::new_memory().await.unwrap();
        cache
            .put_with_ttl(&record("m1"), chrono::Duration::zero())
            .await
            .unwrap();

        assert!(!cache.exists("m1").await.unwrap());
        assert_eq!(cache.count().await.unwrap(), 0);
        assert!(cache.get("m1").await.unwrap().is_none());
        assert!(cache.iter_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn iter_all_returns_only_live_entries() {
        let cache = LibSqlCache::new_memory().await.unwrap();
        cache.put_with_ttl(&record("live"), hours(1)).await.unwrap();
        cache
            .put_with_ttl(&record("dead"), chrono::Duration::zero())
            .await
            .unwrap();

        let entries = cache.iter_all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "live");
    }

    #[tokio::test]
    async fn purge_removes_only_dead_rows() {
        let cache = LibSqlCache::new_memory().await.unwrap();
        cache.put_with_ttl(&record("live"), hours(1)).await.unwrap();
        cache
            .put_with_ttl(&record("dead"), chrono::Duration::zero())
            .await
            .unwrap();

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert!(cache.exists("live").await.unwrap());
        assert_eq!(cache.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn local_file_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = LibSqlCache::new_local(&path).await.unwrap();
            cache.put_with_ttl(&record("m1"), hours(4)).await.unwrap();
        }

        let reopened = LibSqlCache::new_local(&path).await.unwrap();
        assert!(reopened.exists("m1").await.unwrap());
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
