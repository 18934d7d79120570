// HTTP API: Google connection flow and mailbox reads

pub mod email;
pub mod google_auth;

pub use email::create_email_router;
pub use google_auth::create_google_auth_router;

use crate::config::SessionConfig;
use crate::gate::AuthGate;
use crate::gmail::MailboxClient;
use crate::oauth::OAuthClient;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state for all routes
pub struct AppState {
    pub oauth: Arc<OAuthClient>,
    pub gate: Arc<AuthGate>,
    pub mailbox: Arc<MailboxClient>,
    pub session: SessionConfig,
    /// Overall deadline for the callback's code exchange
    pub callback_timeout: Duration,
    pub default_max_results: u32,
    /// Serve the synthetic inbox instead of calling Gmail
    pub mock_mailbox: bool,
}

/// Create the full API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .merge(create_google_auth_router(Arc::clone(&state)))
        .merge(create_email_router(state))
}

/// 302 Found to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `path?key=value`, form-encoded.
fn with_param(path: &str, key: &str, value: &str) -> String {
    let pairs: &[(&str, &str)] = &[(key, value)];
    let query = serde_urlencoded::to_string(pairs).unwrap_or_default();
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}", path, separator, query)
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
