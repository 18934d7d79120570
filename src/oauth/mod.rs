//! OAuth 2.0 authorization code flow against Google.
//!
//! Implements the three provider interactions:
//! 1. Build the consent URL (offline access, forced consent prompt)
//! 2. Exchange the authorization code for tokens, retrying transient
//!    network failures with exponential backoff
//! 3. Refresh an expired access token and persist the result

mod exchange;
mod mock;
mod provider;
mod retry;


pub use exchange::{EndpointError, GoogleTokenEndpoint, TokenEndpoint, TokenResponse};
pub use mock::{MockTokenEndpoint, MOCK_AUTHORIZATION_CODE};
pub use provider::ProviderSettings;
pub use retry::{ExchangeAttempts, RetryDecision, RetryPolicy};

use crate::auth::CookieJar;
use crate::config::{ConfigError, OAuthConfig, Secrets};
use crate::credentials::{Credential, TokenStore};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Failures of the OAuth flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("token exchange failed after {attempts} attempt(s): {source}")]
    TokenExchange {
        attempts: u32,
        #[source]
        source: EndpointError,
    },

    #[error("token refresh failed: {0}")]
    Refresh(#[source] EndpointError),

    #[error("stored credential has expired and has no refresh token")]
    MissingRefreshToken,
}

impl AuthError {
    /// The stored grant can never be refreshed again; the user must reconnect.
    pub fn requires_reauthorization(&self) -> bool {
        match self {
            AuthError::Refresh(e) => e.is_invalid_grant(),
            AuthError::MissingRefreshToken => true,
            _ => false,
        }
    }
}

/// Slot shared by requests refreshing the same refresh token.
type RefreshSlot = Arc<Mutex<Option<Credential>>>;

/// Google OAuth client.
///
/// Constructed once at startup from [`OAuthConfig`] and [`Secrets`] and
/// shared across requests; it holds no per-user state unless refresh
/// de-duplication is enabled.
pub struct OAuthClient {
    settings: ProviderSettings,
    endpoint: Arc<dyn TokenEndpoint>,
    store: Arc<dyn TokenStore>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    mock_mode: bool,
    refresh_slots: Option<DashMap<u64, RefreshSlot>>,
}

impl OAuthClient {
    /// Create a client with the default exchange policy (3 retries from 2s,
    /// 60s per attempt).
    pub fn new(
        settings: ProviderSettings,
        endpoint: Arc<dyn TokenEndpoint>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            settings,
            endpoint,
            store,
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(60),
            mock_mode: false,
            refresh_slots: None,
        }
    }

    /// Build the production client, or the mock-mode client when
    /// `USE_MOCK_GOOGLE_AUTH` is set.
    pub fn from_config(
        config: &OAuthConfig,
        secrets: &Secrets,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, AuthError> {
        let settings = ProviderSettings::new(config, secrets);

        let endpoint: Arc<dyn TokenEndpoint> = if secrets.mock_mode {
            warn!("USE_MOCK_GOOGLE_AUTH is enabled, Google will not be contacted");
            Arc::new(MockTokenEndpoint::new(settings.scopes.clone()))
        } else {
            Arc::new(
                GoogleTokenEndpoint::new(settings.clone(), config.attempt_timeout())
                    .map_err(|e| ConfigError::HttpClient(e.to_string()))?,
            )
        };

        Ok(Self::new(settings, endpoint, store)
            .with_retry_policy(RetryPolicy {
                max_retries: config.max_retries,
                initial_delay: config.initial_backoff(),
            })
            .with_attempt_timeout(config.attempt_timeout())
            .with_mock_mode(secrets.mock_mode)
            .with_refresh_dedupe(config.dedupe_refresh))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_mock_mode(mut self, mock_mode: bool) -> Self {
        self.mock_mode = mock_mode;
        self
    }

    /// Collapse concurrent refreshes of the same refresh token into one
    /// provider call within this process.
    pub fn with_refresh_dedupe(mut self, enabled: bool) -> Self {
        self.refresh_slots = enabled.then(DashMap::new);
        self
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Consent URL the user is sent to.
    ///
    /// In mock mode this points straight back at the callback with a
    /// synthetic code.
    pub fn authorization_url(&self) -> String {
        if self.mock_mode {
            let separator = if self.settings.redirect_uri.contains('?') { '&' } else { '?' };
            return format!(
                "{}{}code={}",
                self.settings.redirect_uri, separator, MOCK_AUTHORIZATION_CODE
            );
        }
        self.settings.build_auth_url()
    }

    /// Exchange an authorization code for a credential.
    ///
    /// Each attempt is bounded by the attempt timeout. Timeouts and
    /// connection resets are retried with exponential backoff; any other
    /// failure is returned immediately.
    pub async fn exchange_code_for_tokens(&self, code: &str) -> Result<Credential, AuthError> {
        let mut attempts = self.retry.attempts();

        loop {
            let attempt = attempts.begin();
            info!(
                attempt,
                max_attempts = attempts.max_attempts(),
                code_length = code.len(),
                "Token exchange attempt"
            );

            let result = self.bounded(self.endpoint.exchange_code(code)).await;

            let err = match result {
                Ok(response) => {
                    info!(
                        attempt,
                        has_refresh_token = response.refresh_token.is_some(),
                        "Tokens received"
                    );
                    return Ok(response.into_credential(Utc::now(), None));
                }
                Err(err) => err,
            };

            warn!(attempt, error = %err, transient = err.is_transient(), "Token exchange attempt failed");

            match attempts.on_failure(err.is_transient()) {
                RetryDecision::Retry(delay) => {
                    info!(delay_ms = delay.as_millis() as u64, "Retrying token exchange");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    return Err(AuthError::TokenExchange {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }

    /// Refresh the credential if it has expired.
    ///
    /// An unexpired credential is returned unchanged without any network
    /// call. Otherwise the refresh grant is called once and the result is
    /// persisted through the token store before being returned.
    pub async fn refresh(
        &self,
        jar: &mut CookieJar,
        credential: Credential,
    ) -> Result<Credential, AuthError> {
        if !credential.is_expired() {
            return Ok(credential);
        }

        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken)?;

        debug!(expires_at = ?credential.expires_at, "Access token expired, refreshing");

        let refreshed = match &self.refresh_slots {
            Some(slots) => self.refresh_single_flight(slots, refresh_token).await?,
            None => self.request_refresh(refresh_token).await?,
        };

        if !self.store.store(jar, &refreshed) {
            warn!("Refreshed credential could not be persisted");
        }

        info!(expires_at = ?refreshed.expires_at, "Access token refreshed");
        Ok(refreshed)
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        let response = self
            .bounded(self.endpoint.refresh_token(refresh_token))
            .await
            .map_err(|e| {
                warn!(error = %e, "Token refresh failed");
                AuthError::Refresh(e)
            })?;

        Ok(response.into_credential(Utc::now(), Some(refresh_token.to_string())))
    }

    async fn refresh_single_flight(
        &self,
        slots: &DashMap<u64, RefreshSlot>,
        refresh_token: &str,
    ) -> Result<Credential, AuthError> {
        let slot = slots
            .entry(slot_key(refresh_token))
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let result = {
            let mut guard = slot.lock().await;
            match guard.as_ref() {
                Some(existing)
                    if !existing.is_expired()
                        && existing.refresh_token.as_deref() == Some(refresh_token) =>
                {
                    debug!("Reusing credential refreshed by a concurrent request");
                    Ok(existing.clone())
                }
                _ => {
                    let refreshed = self.request_refresh(refresh_token).await;
                    if let Ok(credential) = &refreshed {
                        *guard = Some(credential.clone());
                    }
                    refreshed
                }
            }
        };
        drop(slot);

        // Drop idle slots whose credential has expired. A slot another request
        // has cloned stays, so late arrivals still queue behind it.
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => guard.as_ref().is_some_and(|c| !c.is_expired()),
                Err(_) => true,
            }
        });

        result
    }

    async fn bounded<F>(&self, call: F) -> Result<TokenResponse, EndpointError>
    where
        F: Future<Output = Result<TokenResponse, EndpointError>>,
    {
        match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(EndpointError::Timeout),
        }
    }
}

/// Single-flight slots are keyed by a hash so the map never holds refresh tokens.
fn slot_key(refresh_token: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    refresh_token.hash(&mut hasher);
    hasher.finish()
}
