//! Mailbox credentials with an explicit refresh state machine.
//!
//! The provider is injected into the IMAP source at construction; there is
//! no ambient token file. States:
//! - `Valid`: a usable secret, optionally with an expiry
//! - `ExpiredRefreshable`: no usable secret, but a refresh token can mint one
//! - `Absent`: nothing to work with (fatal for the run)

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SourceError;

/// A freshly minted access secret plus its lifetime.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_secret: SecretString,
    pub expires_in_secs: Option<u64>,
}

/// Exchanges a refresh token for a fresh access secret.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, SourceError>;
}

/// Credential state machine.
#[derive(Clone)]
pub enum CredentialState {
    /// Secret usable until `expires_at` (`None` = never expires).
    Valid {
        secret: SecretString,
        expires_at: Option<DateTime<Utc>>,
        refresh_token: Option<SecretString>,
    },
    /// No usable secret; the refresh token can mint one.
    ExpiredRefreshable { refresh_token: SecretString },
    /// Nothing to work with.
    Absent,
}

/// Mailbox credential provider.
pub struct CredentialProvider {
    username: String,
    state: Mutex<CredentialState>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl CredentialProvider {
    /// A fixed secret (app password) that never expires.
    pub fn static_secret(username: &str, secret: SecretString) -> Self {
        Self {
            username: username.to_string(),
            state: Mutex::new(CredentialState::Valid {
                secret,
                expires_at: None,
                refresh_token: None,
            }),
            refresher: None,
        }
    }

    /// Starts in `ExpiredRefreshable`: the first access mints a secret.
    pub fn refreshable(
        username: &str,
        refresh_token: SecretString,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            username: username.to_string(),
            state: Mutex::new(CredentialState::ExpiredRefreshable { refresh_token }),
            refresher: Some(refresher),
        }
    }

    /// No credentials configured. Every access fails.
    pub fn absent(username: &str) -> Self {
        Self {
            username: username.to_string(),
            state: Mutex::new(CredentialState::Absent),
            refresher: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Return a usable access secret, refreshing if the state requires it.
    pub async fn access_secret(&self) -> Result<SecretString, SourceError> {
        // Decide under the lock; the refresh call itself happens outside it.
        let refresh_with = {
            let mut state = self.state.lock().expect("credential state lock poisoned");
            let current = std::mem::replace(&mut *state, CredentialState::Absent);
            match current {
                CredentialState::Valid {
                    secret,
                    expires_at,
                    refresh_token,
                } => {
                    if expires_at.is_none_or(|t| t > Utc::now()) {
                        *state = CredentialState::Valid {
                            secret: secret.clone(),
                            expires_at,
                            refresh_token,
                        };
                        return Ok(secret);
                    }
                    // Expired: demote to the state the expiry implies.
                    match refresh_token {
                        Some(token) => {
                            *state = CredentialState::ExpiredRefreshable {
                                refresh_token: token.clone(),
                            };
                            token
                        }
                        None => return Err(SourceError::CredentialsAbsent),
                    }
                }
                CredentialState::ExpiredRefreshable { refresh_token } => {
                    *state = CredentialState::ExpiredRefreshable {
                        refresh_token: refresh_token.clone(),
                    };
                    refresh_token
                }
                CredentialState::Absent => return Err(SourceError::CredentialsAbsent),
            }
        };

        let refresher = self.refresher.as_ref().ok_or_else(|| {
            SourceError::CredentialRefresh("no token refresher configured".to_string())
        })?;

        debug!(user = %self.username, "Refreshing mailbox access secret");
        let minted = refresher.refresh(refresh_with.expose_secret()).await?;

        let expires_at = minted
            .expires_in_secs
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64));

        let mut state = self.state.lock().expect("credential state lock poisoned");
        *state = CredentialState::Valid {
            secret: minted.access_secret.clone(),
            expires_at,
            refresh_token: Some(refresh_with),
        };
        info!(user = %self.username, "Mailbox access secret refreshed");
        Ok(minted.access_secret)
    }
}

// ── HTTP refresher ──────────────────────────────────────────────────

/// OAuth2 refresh-token grant over HTTP.
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
}

impl HttpTokenRefresher {
    pub fn new(token_url: String, client_id: String, client_secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url,
            client_id,
            client_secret,
        }
    }
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, SourceError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| SourceError::CredentialRefresh(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::CredentialRefresh(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| SourceError::CredentialRefresh(format!("bad token response: {e}")))?;

        Ok(RefreshedToken {
            access_secret: SecretString::from(token.access_token),
            expires_in_secs: token.expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use secrecy::ExposeSecret;

    use super::*;

    /// Refresher that counts calls and hands out sequenced secrets.
    struct CountingRefresher {
        calls: AtomicUsize,
        expires_in_secs: Option<u64>,
    }

    impl CountingRefresher {
        fn new(expires_in_secs: Option<u64>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                expires_in_secs,
            }
        }
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, SourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(RefreshedToken {
                access_secret: SecretString::from(format!("minted-{refresh_token}-{n}")),
                expires_in_secs: self.expires_in_secs,
            })
        }
    }

    #[tokio::test]
    async fn valid_secret_returned_without_refresh() {
        let provider =
            CredentialProvider::static_secret("alice", SecretString::from("app-password"));
        let secret = provider.access_secret().await.unwrap();
        assert_eq!(secret.expose_secret(), "app-password");
    }

    #[tokio::test]
    async fn refreshable_mints_once_then_reuses() {
        let refresher = Arc::new(CountingRefresher::new(Some(3600)));
        let provider = CredentialProvider::refreshable(
            "alice",
            SecretString::from("rt"),
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
        );

        let first = provider.access_secret().await.unwrap();
        assert_eq!(first.expose_secret(), "minted-rt-1");

        // Second access hits the cached Valid state, no second refresh.
        let second = provider.access_secret().await.unwrap();
        assert_eq!(second.expose_secret(), "minted-rt-1");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_lifetime_secret_refreshes_again() {
        let refresher = Arc::new(CountingRefresher::new(Some(0)));
        let provider = CredentialProvider::refreshable(
            "alice",
            SecretString::from("rt"),
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
        );

        provider.access_secret().await.unwrap();
        let second = provider.access_secret().await.unwrap();
        assert_eq!(second.expose_secret(), "minted-rt-2");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn absent_credentials_error() {
        let provider = CredentialProvider::absent("alice");
        let err = provider.access_secret().await.unwrap_err();
        assert!(matches!(err, SourceError::CredentialsAbsent));
    }

    #[tokio::test]
    async fn refresh_failure_propagates() {
        struct FailingRefresher;

        #[async_trait]
        impl TokenRefresher for FailingRefresher {
            async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, SourceError> {
                Err(SourceError::CredentialRefresh("endpoint down".to_string()))
            }
        }

        let provider = CredentialProvider::refreshable(
            "alice",
            SecretString::from("rt"),
            Arc::new(FailingRefresher),
        );
        let err = provider.access_secret().await.unwrap_err();
        assert!(matches!(err, SourceError::CredentialRefresh(_)));
    }
}
