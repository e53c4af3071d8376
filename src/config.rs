//! Runtime configuration, built from environment variables.

/// Default number of live cache entries a run converges toward.
pub const DEFAULT_FILL_TARGET: u64 = 10;

/// Default retention window for cache entries: 4 hours.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 4 * 60 * 60;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Desired total count of live cache entries per run.
    pub fill_target: u64,
    /// Retention window applied to every cache write.
    pub cache_ttl: chrono::Duration,
    /// Path of the local cache database file.
    pub db_path: String,
}

impl TriageConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let fill_target = std::env::var("INBOX_TRIAGE_FILL_TARGET")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FILL_TARGET);

        let ttl_secs: i64 = std::env::var("INBOX_TRIAGE_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        let db_path = std::env::var("INBOX_TRIAGE_DB_PATH")
            .unwrap_or_else(|_| "./data/inbox-triage.db".to_string());

        Self {
            fill_target,
            cache_ttl: chrono::Duration::seconds(ttl_secs),
            db_path,
        }
    }
}
