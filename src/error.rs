//! Error types for inbox-triage.

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mailbox source errors. All of these are fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Mailbox login failed for {user}: {reason}")]
    Login { user: String, reason: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("No mailbox credentials available")]
    CredentialsAbsent,

    #[error("Credential refresh failed: {0}")]
    CredentialRefresh(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification cache errors. All of these are fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to open cache store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record encoding failed: {0}")]
    Encode(String),

    #[error("Record decoding failed for {id}: {reason}")]
    Decode { id: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Pipeline errors: anything that aborts a fill pass.
///
/// Per-message conditions (missing or unreadable headers) are not errors;
/// they are accounted for in the fill report instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Mailbox fetch failed: {0}")]
    Fetch(#[from] SourceError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
