//! Google OAuth provider settings.

use crate::config::{OAuthConfig, Secrets};
use std::fmt;

/// Everything needed to talk to the Google authorization server.
#[derive(Clone)]
pub struct ProviderSettings {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token exchange endpoint URL
    pub token_url: String,

    /// Requested scopes (fixed per deployment)
    pub scopes: Vec<String>,

    pub client_id: String,
    pub client_secret: String,

    /// Must match the redirect URI registered with Google
    pub redirect_uri: String,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

impl ProviderSettings {
    pub fn new(config: &OAuthConfig, secrets: &Secrets) -> Self {
        Self {
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            scopes: config.scopes.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            redirect_uri: secrets.redirect_uri.clone(),
        }
    }

    /// Build the consent URL.
    ///
    /// Requests offline access so a refresh token is issued, and forces the
    /// consent prompt so Google issues one even on repeat authorizations.
    /// The result depends only on the settings.
    pub fn build_auth_url(&self) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?access_type=offline&scope={}&prompt=consent&response_type=code&client_id={}&redirect_uri={}",
            self.auth_url,
            urlencoding::encode(&scopes),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
        )
    }
}
