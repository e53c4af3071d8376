//! Version-tracked migrations for the cache store.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::{Connection, params};

use crate::error::CacheError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "classification_cache",
    sql: r#"
        CREATE TABLE IF NOT EXISTS classifications (
            message_id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_classifications_expires
            ON classifications(expires_at);
    "#,
}];

/// Apply any migrations newer than the stored schema version.
pub async fn run_migrations(conn: &Connection) -> Result<(), CacheError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| CacheError::Migration(format!("failed to create _migrations: {e}")))?;

    let current = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| {
                CacheError::Migration(format!("{} (v{}) failed: {e}", migration.name, migration.version))
            })?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )
        .await
        .map_err(|e| CacheError::Migration(format!("failed to record v{}: {e}", migration.version)))?;
    }

    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64, CacheError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| CacheError::Migration(format!("failed to read schema version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| CacheError::Migration(e.to_string()))?
        .ok_or_else(|| CacheError::Migration("schema version query returned no row".to_string()))?;

    row.get::<i64>(0)
        .map_err(|e| CacheError::Migration(e.to_string()))
}
