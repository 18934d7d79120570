use crate::credentials::{CipherError, TokenCipher};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Configuration failures. Detected once at startup, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Google OAuth credentials are not properly configured: {0} is not set")]
    Missing(&'static str),

    #[error("invalid ENCRYPTION_KEY: {0}")]
    InvalidKey(#[from] CipherError),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Complete service configuration (non-secret tunables).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Marks cookies `Secure`. Overridden by `APP_ENV=production`.
    #[serde(default)]
    pub production: bool,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            production: false,
        }
    }
}

/// Google OAuth endpoints and exchange policy
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Retries after the first attempt (4 attempts total by default)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Per-attempt network timeout
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_seconds: u64,
    /// Deadline for the whole callback exchange, retries included
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_seconds: u64,
    /// Collapse concurrent refreshes of the same refresh token in this process
    #[serde(default)]
    pub dedupe_refresh: bool,
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()]
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_attempt_timeout() -> u64 {
    60
}

fn default_callback_timeout() -> u64 {
    65
}

impl OAuthConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_seconds)
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            scopes: default_scopes(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            attempt_timeout_seconds: default_attempt_timeout(),
            callback_timeout_seconds: default_callback_timeout(),
            dedupe_refresh: false,
        }
    }
}

/// Application session gating and redirect targets
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Any cookie whose name starts with this marks a signed-in user
    #[serde(default = "default_cookie_prefix")]
    pub cookie_prefix: String,
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    /// Page the OAuth callback returns to, carrying success/error parameters
    #[serde(default = "default_app_path")]
    pub app_path: String,
}

fn default_cookie_prefix() -> String {
    "__clerk".to_string()
}

fn default_sign_in_path() -> String {
    "/".to_string()
}

fn default_app_path() -> String {
    "/email".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_prefix: default_cookie_prefix(),
            sign_in_path: default_sign_in_path(),
            app_path: default_app_path(),
        }
    }
}

/// Gmail API access
#[derive(Debug, Clone, Deserialize)]
pub struct GmailConfig {
    #[serde(default = "default_gmail_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_results")]
    pub default_max_results: u32,
}

fn default_gmail_api_base() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}

fn default_max_results() -> u32 {
    50
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base: default_gmail_api_base(),
            default_max_results: default_max_results(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

/// Secrets and deployment switches read from the environment.
#[derive(Clone)]
pub struct Secrets {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub cipher: TokenCipher,
    pub mock_mode: bool,
    pub production: bool,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("mock_mode", &self.mock_mode)
            .field("production", &self.production)
            .finish()
    }
}

impl Secrets {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let client_id = required("GOOGLE_CLIENT_ID")?;
        let client_secret = required("GOOGLE_CLIENT_SECRET")?;
        let redirect_uri = required("GOOGLE_REDIRECT_URI")?;
        let cipher = TokenCipher::from_key_material(&required("ENCRYPTION_KEY")?)?;

        let mock_mode = lookup("USE_MOCK_GOOGLE_AUTH")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        let production = lookup("APP_ENV").is_some_and(|v| v == "production");

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            cipher,
            mock_mode,
            production,
        })
    }
}
