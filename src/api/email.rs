use super::AppState;
use crate::auth::{has_session, CookieJar};
use crate::gate::AuthenticatedClient;
use crate::gmail::{mock_messages, ParsedEmail};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Gmail caps `maxResults` at 500
const MAX_RESULTS_LIMIT: u32 = 500;

/// Size of the synthetic inbox in mock mode
const MOCK_INBOX_SIZE: usize = 15;

/// Query parameters for listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    max_results: Option<String>,
    query: Option<String>,
}

#[derive(Serialize)]
struct EmailListResponse {
    success: bool,
    emails: Vec<ParsedEmail>,
}

#[derive(Serialize)]
struct EmailResponse {
    success: bool,
    email: ParsedEmail,
}

#[derive(Serialize)]
struct FailureResponse {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    emails: Option<Vec<ParsedEmail>>,
}

/// Application error types for email endpoints
#[derive(Debug)]
enum EmailError {
    /// No application session
    Unauthorized,
    /// Signed in, but no usable Google credential
    NotConnected { listing: bool },
    FetchFailed,
    GetFailed,
}

impl IntoResponse for EmailError {
    fn into_response(self) -> Response {
        let (status, error, emails) = match self {
            EmailError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            EmailError::NotConnected { listing } => (
                StatusCode::OK,
                "Not authenticated with Google",
                listing.then(Vec::new),
            ),
            EmailError::FetchFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch emails", None)
            }
            EmailError::GetFailed => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get email", None),
        };

        let body = Json(FailureResponse {
            success: false,
            error,
            emails,
        });

        (status, body).into_response()
    }
}

/// Create email API router
pub fn create_email_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/email", get(list_emails))
        .route("/api/email/:id", get(get_email))
        .with_state(state)
}

/// GET /api/email?maxResults=&query=
async fn list_emails(
    State(state): State<Arc<AppState>>,
    mut jar: CookieJar,
    Query(params): Query<ListParams>,
) -> Response {
    let result = fetch_emails(&state, &mut jar, params).await;
    // Refresh or disconnect may have queued cookie updates
    (jar, result).into_response()
}

async fn fetch_emails(
    state: &AppState,
    jar: &mut CookieJar,
    params: ListParams,
) -> Result<Json<EmailListResponse>, EmailError> {
    let max_results = params
        .max_results
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(state.default_max_results)
        .clamp(1, MAX_RESULTS_LIMIT);
    let query = params.query.unwrap_or_default();

    if state.mock_mailbox {
        require_session(state, jar)?;
        if !state.gate.is_authenticated(jar) {
            return Err(EmailError::NotConnected { listing: true });
        }
        debug!("Serving mock inbox");
        return Ok(Json(EmailListResponse {
            success: true,
            emails: mock_messages(MOCK_INBOX_SIZE.min(max_results as usize)),
        }));
    }

    let client = connected_client(state, jar, EmailError::FetchFailed)
        .await?
        .ok_or(EmailError::NotConnected { listing: true })?;

    let emails = state
        .mailbox
        .list_messages(&client, max_results, &query)
        .await
        .map_err(|e| {
            error!(error = %e, "Error fetching emails");
            EmailError::FetchFailed
        })?;

    Ok(Json(EmailListResponse {
        success: true,
        emails,
    }))
}

/// GET /api/email/:id
async fn get_email(
    State(state): State<Arc<AppState>>,
    mut jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let result = fetch_email(&state, &mut jar, &id).await;
    (jar, result).into_response()
}

async fn fetch_email(
    state: &AppState,
    jar: &mut CookieJar,
    id: &str,
) -> Result<Json<EmailResponse>, EmailError> {
    if state.mock_mailbox {
        require_session(state, jar)?;
        if !state.gate.is_authenticated(jar) {
            return Err(EmailError::NotConnected { listing: false });
        }
        return mock_messages(MOCK_INBOX_SIZE)
            .into_iter()
            .find(|email| email.id == id)
            .map(|email| Json(EmailResponse { success: true, email }))
            .ok_or(EmailError::GetFailed);
    }

    let client = connected_client(state, jar, EmailError::GetFailed)
        .await?
        .ok_or(EmailError::NotConnected { listing: false })?;

    let email = state.mailbox.get_message(&client, id).await.map_err(|e| {
        error!(email_id = %id, error = %e, "Error getting email");
        EmailError::GetFailed
    })?;

    Ok(Json(EmailResponse {
        success: true,
        email,
    }))
}

fn require_session(state: &AppState, jar: &CookieJar) -> Result<(), EmailError> {
    if has_session(jar, &state.session.cookie_prefix) {
        Ok(())
    } else {
        Err(EmailError::Unauthorized)
    }
}

/// Session check, then the gate. Refresh failures map to `on_failure`.
async fn connected_client(
    state: &AppState,
    jar: &mut CookieJar,
    on_failure: EmailError,
) -> Result<Option<AuthenticatedClient>, EmailError> {
    require_session(state, jar)?;
    state.gate.get_client(jar).await.map_err(|e| {
        error!(error = %e, "Could not obtain Google client");
        on_failure
    })
}
