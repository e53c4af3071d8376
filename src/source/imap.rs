//! Raw IMAP-over-TLS source adapter.
//!
//! Fetches header blocks for the most recent messages in the configured
//! mailbox. The protocol loop is blocking and runs under `spawn_blocking`;
//! only the header section of each message is fetched (`BODY.PEEK`, so
//! nothing is marked `\Seen`).

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_parser::MessageParser;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::source::credentials::CredentialProvider;
use crate::source::{HeaderFields, MailSummary, MailboxSource};

/// IMAP connection configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub mailbox: String,
}

impl ImapConfig {
    /// Build config from environment variables.
    /// Returns `None` if `INBOX_TRIAGE_IMAP_HOST` is not set (source disabled).
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("INBOX_TRIAGE_IMAP_HOST").ok()?;

        let port: u16 = std::env::var("INBOX_TRIAGE_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let username = std::env::var("INBOX_TRIAGE_IMAP_USERNAME").unwrap_or_default();
        let mailbox =
            std::env::var("INBOX_TRIAGE_IMAP_MAILBOX").unwrap_or_else(|_| "INBOX".to_string());

        Some(Self {
            host,
            port,
            username,
            mailbox,
        })
    }
}

/// IMAP-backed mailbox source.
pub struct ImapSource {
    config: ImapConfig,
    credentials: Arc<CredentialProvider>,
}

impl ImapSource {
    pub fn new(config: ImapConfig, credentials: Arc<CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

#[async_trait]
impl MailboxSource for ImapSource {
    async fn fetch_batch(&self, max: usize) -> Result<Vec<MailSummary>, SourceError> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let secret = self.credentials.access_secret().await?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || fetch_recent_headers(&config, &secret, max))
            .await
            .map_err(|e| SourceError::Protocol(format!("fetch task panicked: {e}")))?
    }
}

// ── Blocking protocol loop ──────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Fetch headers for the `max` most recent messages (blocking).
fn fetch_recent_headers(
    config: &ImapConfig,
    secret: &SecretString,
    max: usize,
) -> Result<Vec<MailSummary>, SourceError> {
    let tcp = TcpStream::connect((&*config.host, config.port)).map_err(|e| {
        SourceError::Connect {
            host: config.host.clone(),
            port: config.port,
            reason: e.to_string(),
        }
    })?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name: rustls::pki_types::ServerName<'_> =
        rustls::pki_types::ServerName::try_from(config.host.clone())
            .map_err(|e| SourceError::Protocol(format!("invalid server name: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| SourceError::Protocol(format!("TLS setup failed: {e}")))?;
    let mut tls = rustls::StreamOwned::new(conn, tcp);

    let _greeting = read_line(&mut tls)?;

    let login_resp = send_cmd(
        &mut tls,
        "A1",
        &format!(
            "LOGIN \"{}\" \"{}\"",
            config.username,
            secret.expose_secret()
        ),
    )?;
    if !login_resp.last().is_some_and(|l| l.contains("OK")) {
        return Err(SourceError::Login {
            user: config.username.clone(),
            reason: "server rejected LOGIN".to_string(),
        });
    }

    let select_resp = send_cmd(&mut tls, "A2", &format!("SELECT \"{}\"", config.mailbox))?;
    let exists = parse_exists(&select_resp).ok_or_else(|| {
        SourceError::Protocol(format!("no EXISTS count in SELECT response for {}", config.mailbox))
    })?;

    if exists == 0 {
        debug!(mailbox = %config.mailbox, "Mailbox is empty");
        let _ = send_cmd(&mut tls, "A3", "LOGOUT");
        return Ok(Vec::new());
    }

    // Sequence numbers count up from the oldest message; walk the top
    // `max` of them downward so the batch comes out most recent first.
    let lo = exists.saturating_sub(max - 1).max(1);
    let mut results = Vec::new();
    let mut tag_counter = 3_u32;

    for seq in (lo..=exists).rev() {
        let tag = format!("A{tag_counter}");
        tag_counter += 1;
        let fetch_resp = send_cmd(
            &mut tls,
            &tag,
            &format!("FETCH {seq} (UID BODY.PEEK[HEADER])"),
        )?;

        let uid = fetch_resp.first().and_then(|l| parse_uid(l));
        let raw: String = fetch_resp
            .iter()
            .skip(1)
            .take(fetch_resp.len().saturating_sub(2))
            .cloned()
            .collect();

        match summarize_message(uid, &raw) {
            Some(summary) => results.push(summary),
            None => warn!(seq, "Message has neither Message-ID nor UID; dropping"),
        }
    }

    let logout_tag = format!("A{tag_counter}");
    let _ = send_cmd(&mut tls, &logout_tag, "LOGOUT");

    debug!(fetched = results.len(), requested = max, "IMAP header fetch complete");
    Ok(results)
}

fn read_line(tls: &mut TlsStream) -> Result<String, SourceError> {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match std::io::Read::read(tls, &mut byte) {
            Ok(0) => return Err(SourceError::Protocol("connection closed".to_string())),
            Ok(_) => {
                buf.push(byte[0]);
                if buf.ends_with(b"\r\n") {
                    return Ok(String::from_utf8_lossy(&buf).to_string());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn send_cmd(tls: &mut TlsStream, tag: &str, cmd: &str) -> Result<Vec<String>, SourceError> {
    let full = format!("{tag} {cmd}\r\n");
    IoWrite::write_all(tls, full.as_bytes())?;
    IoWrite::flush(tls)?;
    let mut lines = Vec::new();
    loop {
        let line = read_line(tls)?;
        let done = line.starts_with(tag);
        lines.push(line);
        if done {
            break;
        }
    }
    Ok(lines)
}

// ── Response parsing ────────────────────────────────────────────────

/// Pull the message count out of untagged `* <n> EXISTS` lines.
fn parse_exists(lines: &[String]) -> Option<usize> {
    lines.iter().find_map(|line| {
        let rest = line.trim().strip_prefix("* ")?;
        let (count, keyword) = rest.split_once(' ')?;
        if keyword.trim() == "EXISTS" {
            count.parse().ok()
        } else {
            None
        }
    })
}

/// Pull the UID out of a `* <seq> FETCH (UID <n> ...` line.
fn parse_uid(line: &str) -> Option<u64> {
    let rest = line.split("UID ").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Turn one fetched header block into a `MailSummary`.
///
/// The id is the `Message-ID` header when present, otherwise the IMAP UID.
/// Returns `None` when neither exists (the message cannot be keyed).
fn summarize_message(uid: Option<u64>, raw_header: &str) -> Option<MailSummary> {
    let fallback_id = uid.map(|u| format!("imap-uid-{u}"));

    match MessageParser::default().parse(raw_header.as_bytes()) {
        Some(parsed) if !parsed.headers().is_empty() => {
            let id = parsed.message_id().map(str::to_string).or(fallback_id)?;
            Some(MailSummary {
                id,
                headers: HeaderFields::Parsed {
                    sender: extract_sender(&parsed),
                    subject: parsed.subject().map(str::to_string),
                },
            })
        }
        _ => fallback_id.map(MailSummary::unreadable),
    }
}

/// Reconstruct a display-name-plus-address sender string from the
/// parsed From header.
fn extract_sender(parsed: &mail_parser::Message) -> Option<String> {
    let addr = parsed.from().and_then(|a| a.first())?;
    let name = addr.name().map(str::to_string);
    let email = addr.address().map(str::to_string);
    match (name, email) {
        (Some(n), Some(e)) => Some(format!("{n} <{e}>")),
        (None, Some(e)) => Some(e),
        (Some(n), None) => Some(n),
        (None, None) => None,
    }
}
