//! Time-bounded classification cache.
//!
//! Keyed by message id; every entry carries a TTL fixed at write time.
//! Reads (`exists`/`count`/`get`/`iter_all`) see only live entries.

mod libsql_backend;
mod migrations;

pub use libsql_backend::LibSqlCache;

use async_trait::async_trait;

use crate::error::CacheError;
use crate::pipeline::types::ClassificationRecord;

/// Deduplicating, expiring store for classification records.
///
/// `put_with_ttl` is atomic per key; no guarantee spans multiple keys.
/// Records are create-only: callers check `exists` before writing and
/// never update a live entry in place.
#[async_trait]
pub trait ClassificationCache: Send + Sync {
    /// Is there a live entry for this message id?
    async fn exists(&self, id: &str) -> Result<bool, CacheError>;

    /// Number of live entries.
    async fn count(&self) -> Result<u64, CacheError>;

    /// Read a live entry.
    async fn get(&self, id: &str) -> Result<Option<ClassificationRecord>, CacheError>;

    /// Write a record, live for `ttl` from now.
    async fn put_with_ttl(
        &self,
        record: &ClassificationRecord,
        ttl: chrono::Duration,
    ) -> Result<(), CacheError>;

    /// All live entries, for the reporting stage.
    async fn iter_all(&self) -> Result<Vec<(String, ClassificationRecord)>, CacheError>;

    /// Delete rows whose TTL has elapsed. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize, CacheError>;
}
