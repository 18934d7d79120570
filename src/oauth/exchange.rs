//! OAuth token endpoint calls.
//!
//! Handles exchanging authorization codes and refresh tokens for access tokens.

use super::provider::ProviderSettings;
use crate::credentials::{Credential, Expiry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Convert into a stored credential.
    ///
    /// `previous_refresh_token` is kept when the provider omits a new one,
    /// which Google does on every refresh grant.
    pub fn into_credential(
        self,
        issued_at: DateTime<Utc>,
        previous_refresh_token: Option<String>,
    ) -> Credential {
        // A lifetime that overflows is left unset, which reads as expired
        let expires_at = self
            .expires_in
            .and_then(|seconds| seconds.checked_mul(1000))
            .and_then(|millis| millis.checked_add(issued_at.timestamp_millis()))
            .map(Expiry::from_millis);

        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expires_at,
            scope: self
                .scope
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            token_type: self.token_type,
        }
    }
}

/// OAuth error body returned by the token endpoint
#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Failure of a single token endpoint call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("token request timed out")]
    Timeout,

    #[error("connection reset by token endpoint")]
    ConnectionReset,

    #[error("token endpoint rejected the request ({status}): {error} - {description}")]
    Provider {
        status: u16,
        error: String,
        description: String,
    },

    #[error("token request failed: {0}")]
    Transport(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

impl EndpointError {
    /// Only transient network failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, EndpointError::Timeout | EndpointError::ConnectionReset)
    }

    /// The grant was revoked or the refresh token is no longer valid.
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, EndpointError::Provider { error, .. } if error == "invalid_grant")
    }
}

/// The provider's token endpoint.
///
/// `GoogleTokenEndpoint` is the production implementation; mock mode and
/// tests substitute their own.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// `grant_type=authorization_code`
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, EndpointError>;

    /// `grant_type=refresh_token`
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, EndpointError>;
}

/// Token endpoint backed by reqwest.
pub struct GoogleTokenEndpoint {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl GoogleTokenEndpoint {
    /// # Arguments
    /// * `settings` - Provider URLs and client credentials
    /// * `timeout` - Per-request network timeout
    pub fn new(settings: ProviderSettings, timeout: Duration) -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EndpointError::Transport(e.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn post_form(&self, form_data: HashMap<&str, &str>) -> Result<TokenResponse, EndpointError> {
        tracing::debug!(
            token_url = %self.settings.token_url,
            grant_type = form_data.get("grant_type").copied().unwrap_or_default(),
            "Calling token endpoint"
        );

        let response = self
            .client
            .post(&self.settings.token_url)
            .header("Accept", "application/json")
            .form(&form_data)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (error, description) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(parsed) => (parsed.error, parsed.error_description.unwrap_or_default()),
                Err(_) => ("http_error".to_string(), body),
            };
            return Err(EndpointError::Provider {
                status: status.as_u16(),
                error,
                description,
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| EndpointError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            has_refresh_token = token_response.refresh_token.is_some(),
            expires_in = ?token_response.expires_in,
            "Token endpoint call successful"
        );

        Ok(token_response)
    }
}

#[async_trait]
impl TokenEndpoint for GoogleTokenEndpoint {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, EndpointError> {
        let mut form_data = HashMap::new();
        form_data.insert("grant_type", "authorization_code");
        form_data.insert("code", code);
        form_data.insert("redirect_uri", self.settings.redirect_uri.as_str());
        form_data.insert("client_id", self.settings.client_id.as_str());
        form_data.insert("client_secret", self.settings.client_secret.as_str());

        self.post_form(form_data).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, EndpointError> {
        let mut form_data = HashMap::new();
        form_data.insert("grant_type", "refresh_token");
        form_data.insert("refresh_token", refresh_token);
        form_data.insert("client_id", self.settings.client_id.as_str());
        form_data.insert("client_secret", self.settings.client_secret.as_str());

        self.post_form(form_data).await
    }
}

/// Map a reqwest failure to the retry taxonomy by walking its cause chain.
fn classify_transport_error(err: reqwest::Error) -> EndpointError {
    if err.is_timeout() {
        return EndpointError::Timeout;
    }

    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => return EndpointError::Timeout,
                io::ErrorKind::ConnectionReset => return EndpointError::ConnectionReset,
                _ => {}
            }
        }
        source = cause.source();
    }

    EndpointError::Transport(err.to_string())
}
