//! Google connection endpoints.
//!
//! Implements the authorization code flow for the dashboard user:
//! 1. User clicks "Connect Gmail"
//! 2. GET /api/auth/google/authorize → Redirect to Google consent screen
//! 3. User grants access on Google's site
//! 4. Google redirects to /api/auth/google/callback?code=...
//! 5. Exchange code for tokens, store them in the encrypted cookie
//! 6. Redirect back to the email page with `google_connected=true`

use super::{found, with_param, AppState, ErrorResponse};
use crate::auth::{has_session, CookieJar};
use crate::oauth::AuthError;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// OAuth callback query parameters
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(rename = "isAuthenticated")]
    is_authenticated: bool,
}

#[derive(Serialize)]
struct DisconnectResponse {
    success: bool,
}

/// Failures completing the callback, rendered into the redirect message
#[derive(Debug, Error)]
enum CallbackError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Token exchange timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Failed to store tokens")]
    Store,
}

/// Create Google connection router
pub fn create_google_auth_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/google/authorize", get(authorize))
        .route("/api/auth/google/callback", get(callback))
        .route("/api/auth/google/disconnect", post(disconnect))
        .route("/api/auth/google/status", get(status))
        .with_state(state)
}

/// GET /api/auth/google/authorize
///
/// Redirects a signed-in user to the Google consent screen.
async fn authorize(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !has_session(&jar, &state.session.cookie_prefix) {
        debug!("No application session, redirecting to sign-in");
        return found(&state.session.sign_in_path);
    }

    let auth_url = state.oauth.authorization_url();
    info!(
        client_id = %state.oauth.settings().client_id,
        "Redirecting to Google consent screen"
    );

    found(&auth_url)
}

/// GET /api/auth/google/callback
///
/// Exchanges the authorization code and stores the credential. Every outcome
/// is a redirect; failures carry an `error` parameter for the email page.
async fn callback(
    State(state): State<Arc<AppState>>,
    mut jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    if !has_session(&jar, &state.session.cookie_prefix) {
        debug!("No application session, redirecting to sign-in");
        return found(&state.session.sign_in_path);
    }

    let app_path = &state.session.app_path;

    if let Some(error) = params.error {
        warn!(error = %error, "Google authorization failed");
        return found(&with_param(
            app_path,
            "error",
            &format!("Google authentication failed: {}", error),
        ));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        warn!("Callback received without an authorization code");
        return found(&with_param(app_path, "error", "No authorization code provided"));
    };

    match complete_authorization(&state, &mut jar, &code).await {
        Ok(()) => {
            info!("Google account connected");
            (jar, found(&with_param(app_path, "google_connected", "true"))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to complete Google authentication");
            found(&with_param(
                app_path,
                "error",
                &format!("Failed to complete Google authentication: {}", e),
            ))
        }
    }
}

async fn complete_authorization(
    state: &AppState,
    jar: &mut CookieJar,
    code: &str,
) -> Result<(), CallbackError> {
    let credential = tokio::time::timeout(
        state.callback_timeout,
        state.oauth.exchange_code_for_tokens(code),
    )
    .await
    .map_err(|_| CallbackError::TimedOut(state.callback_timeout.as_secs()))??;

    if !state.oauth.store().store(jar, &credential) {
        return Err(CallbackError::Store);
    }
    Ok(())
}

/// POST /api/auth/google/disconnect
async fn disconnect(State(state): State<Arc<AppState>>, mut jar: CookieJar) -> Response {
    if !has_session(&jar, &state.session.cookie_prefix) {
        let body = Json(ErrorResponse {
            error: "Unauthorized".to_string(),
        });
        return (StatusCode::UNAUTHORIZED, body).into_response();
    }

    state.gate.disconnect(&mut jar);
    info!("Google account disconnected");

    (jar, Json(DisconnectResponse { success: true })).into_response()
}

/// GET /api/auth/google/status
///
/// Never fails; anything unreadable reports as not connected.
async fn status(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<StatusResponse> {
    let is_authenticated = has_session(&jar, &state.session.cookie_prefix)
        && state.gate.is_authenticated(&jar);

    Json(StatusResponse { is_authenticated })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_error_messages() {
        assert_eq!(
            CallbackError::TimedOut(65).to_string(),
            "Token exchange timed out after 65 seconds"
        );
        assert_eq!(CallbackError::Store.to_string(), "Failed to store tokens");
        assert_eq!(
            CallbackError::from(AuthError::MissingRefreshToken).to_string(),
            AuthError::MissingRefreshToken.to_string()
        );
    }

    #[test]
    fn test_callback_params() {
        let params: CallbackParams =
            serde_urlencoded::from_str("code=4%2F0AX4&scope=gmail.readonly").unwrap();
        assert_eq!(params.code.as_deref(), Some("4/0AX4"));
        assert!(params.error.is_none());

        let params: CallbackParams = serde_urlencoded::from_str("error=access_denied").unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert!(params.code.is_none());
    }
}
