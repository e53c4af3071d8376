use std::path::Path;
use std::sync::Arc;

use inbox_triage::cache::{ClassificationCache, LibSqlCache};
use inbox_triage::config::TriageConfig;
use inbox_triage::llm::{LlmBackend, LlmConfig, create_provider};
use inbox_triage::pipeline::{Classifier, FillController};
use inbox_triage::report::{self, ReportBuilder};
use inbox_triage::source::credentials::{CredentialProvider, HttpTokenRefresher};
use inbox_triage::source::{ImapConfig, ImapSource};
use secrecy::SecretString;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Read API key from environment
    let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: ANTHROPIC_API_KEY not set");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });

    let model = std::env::var("INBOX_TRIAGE_MODEL")
        .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

    let config = TriageConfig::from_env();

    eprintln!("inbox-triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   Fill target: {}", config.fill_target);
    eprintln!("   Cache TTL: {}s", config.cache_ttl.num_seconds());

    let llm_config = LlmConfig {
        backend: LlmBackend::Anthropic,
        api_key: SecretString::from(api_key),
        model,
    };
    let llm = create_provider(&llm_config)?;

    // Cache first: no point fetching anything the run cannot persist.
    let cache: Arc<dyn ClassificationCache> = Arc::new(
        LibSqlCache::new_local(Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: failed to open cache at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );
    eprintln!("   Cache: {}", config.db_path);

    let purged = cache.purge_expired().await?;
    if purged > 0 {
        tracing::info!(purged, "Swept expired cache entries");
    }

    let imap_config = ImapConfig::from_env().unwrap_or_else(|| {
        eprintln!("Error: INBOX_TRIAGE_IMAP_HOST not set");
        std::process::exit(1);
    });
    eprintln!(
        "   Mailbox: {}@{}:{}/{}\n",
        imap_config.username, imap_config.host, imap_config.port, imap_config.mailbox
    );

    let credentials = Arc::new(credentials_from_env(&imap_config));
    let source = Arc::new(ImapSource::new(imap_config, credentials));

    let controller = FillController::new(
        source,
        Arc::clone(&cache),
        Classifier::new(llm),
        config.cache_ttl,
    );

    let fill = controller.ensure_filled(config.fill_target).await?;
    tracing::info!(
        classified = fill.classified,
        already_cached = fill.already_cached,
        skipped = fill.skipped_unreadable,
        live = fill.live_after(),
        "Run finished"
    );

    let summary = ReportBuilder::new(cache).summarize().await?;
    println!("{}", report::render(&summary));

    Ok(())
}

/// Build the credential provider from the environment.
///
/// An app password wins; otherwise an OAuth refresh token (plus client id)
/// sets up the refresh path; otherwise credentials are absent and the
/// first fetch fails the run.
fn credentials_from_env(imap: &ImapConfig) -> CredentialProvider {
    if let Ok(password) = std::env::var("INBOX_TRIAGE_IMAP_PASSWORD") {
        return CredentialProvider::static_secret(&imap.username, SecretString::from(password));
    }

    if let (Ok(refresh_token), Ok(client_id)) = (
        std::env::var("INBOX_TRIAGE_OAUTH_REFRESH_TOKEN"),
        std::env::var("INBOX_TRIAGE_OAUTH_CLIENT_ID"),
    ) {
        let token_url = std::env::var("INBOX_TRIAGE_OAUTH_TOKEN_URL")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string());
        let refresher = HttpTokenRefresher::new(
            token_url,
            client_id,
            std::env::var("INBOX_TRIAGE_OAUTH_CLIENT_SECRET").ok(),
        );
        return CredentialProvider::refreshable(
            &imap.username,
            SecretString::from(refresh_token),
            Arc::new(refresher),
        );
    }

    CredentialProvider::absent(&imap.username)
}
