//! Authenticated request gate.
//!
//! Turns the request's cookies into a ready-to-use Google client:
//!
//! ```text
//! cookie ──retrieve──▶ Credential ──refresh if expired──▶ AuthenticatedClient
//!    │                                   │
//!    └─ absent / unreadable ─▶ None      └─ invalid_grant ─▶ clear cookie, None
//! ```

use crate::auth::CookieJar;
use crate::credentials::{Credential, TokenStore};
use crate::oauth::{AuthError, OAuthClient};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for downstream Google API calls
const API_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AuthGate {
    oauth: Arc<OAuthClient>,
    http: reqwest::Client,
}

impl AuthGate {
    pub fn new(oauth: Arc<OAuthClient>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(API_TIMEOUT).build()?;
        Ok(Self::with_http_client(oauth, http))
    }

    pub fn with_http_client(oauth: Arc<OAuthClient>, http: reqwest::Client) -> Self {
        Self { oauth, http }
    }

    fn store(&self) -> &Arc<dyn TokenStore> {
        self.oauth.store()
    }

    /// Client bound to a valid access token, refreshing it first if needed.
    ///
    /// Returns `Ok(None)` when no credential is stored, or when Google has
    /// revoked the grant (the stored credential is cleared in that case).
    /// Transient refresh failures propagate.
    pub async fn get_client(
        &self,
        jar: &mut CookieJar,
    ) -> Result<Option<AuthenticatedClient>, AuthError> {
        let Some(credential) = self.store().retrieve(jar) else {
            debug!("No stored Google credential");
            return Ok(None);
        };

        match self.oauth.refresh(jar, credential).await {
            Ok(credential) => Ok(Some(AuthenticatedClient {
                credential,
                http: self.http.clone(),
            })),
            Err(e) if e.requires_reauthorization() => {
                info!(error = %e, "Google grant no longer valid, disconnecting");
                self.store().clear(jar);
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Could not refresh Google credential");
                Err(e)
            }
        }
    }

    /// A readable credential is present. No network call, no expiry check.
    pub fn is_authenticated(&self, jar: &CookieJar) -> bool {
        self.store().retrieve(jar).is_some()
    }

    /// Remove the stored credential.
    pub fn disconnect(&self, jar: &mut CookieJar) {
        self.store().clear(jar);
    }
}

/// HTTP client bound to one user's fresh access token.
#[derive(Clone)]
pub struct AuthenticatedClient {
    credential: Credential,
    http: reqwest::Client,
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("expires_at", &self.credential.expires_at)
            .field("scope", &self.credential.scope)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedClient {
    pub fn access_token(&self) -> &str {
        &self.credential.access_token
    }

    /// Authorized `GET` decoding a JSON body. Non-2xx statuses are errors.
    pub async fn get_json<T, Q>(&self, url: &str, query: &Q) -> Result<T, reqwest::Error>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        self.http
            .get(url)
            .bearer_auth(&self.credential.access_token)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}
