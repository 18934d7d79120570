//! Synthetic token endpoint for development and demos.
//!
//! Enabled with `USE_MOCK_GOOGLE_AUTH=true`. Google is never contacted; every
//! grant succeeds with generated tokens, and the rest of the flow (cipher,
//! cookie, refresh) runs unchanged.

use super::exchange::{EndpointError, TokenEndpoint, TokenResponse};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};

/// Code the mock consent URL hands back to the callback.
pub const MOCK_AUTHORIZATION_CODE: &str = "mock-authorization-code";

/// Lifetime of mock access tokens, in seconds
const MOCK_EXPIRES_IN: i64 = 3600;

pub struct MockTokenEndpoint {
    scopes: Vec<String>,
}

impl MockTokenEndpoint {
    pub fn new(scopes: Vec<String>) -> Self {
        Self { scopes }
    }

    fn issue(&self, refresh_token: Option<String>) -> TokenResponse {
        TokenResponse {
            access_token: format!("mock-access-{}", random_suffix()),
            refresh_token,
            expires_in: Some(MOCK_EXPIRES_IN),
            scope: Some(self.scopes.join(" ")),
            token_type: Some("Bearer".to_string()),
        }
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, EndpointError> {
        if code.is_empty() {
            return Err(EndpointError::Provider {
                status: 400,
                error: "invalid_request".to_string(),
                description: "Missing code".to_string(),
            });
        }
        tracing::info!("Issuing mock Google tokens");
        Ok(self.issue(Some(format!("mock-refresh-{}", random_suffix()))))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse, EndpointError> {
        tracing::info!("Refreshing mock Google tokens");
        Ok(self.issue(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_exchange_issues_refresh_token() {
        let endpoint = MockTokenEndpoint::new(vec!["scope-a".to_string()]);
        let response = endpoint.exchange_code(MOCK_AUTHORIZATION_CODE).await.unwrap();

        assert!(response.access_token.starts_with("mock-access-"));
        assert!(response.refresh_token.unwrap().starts_with("mock-refresh-"));
        assert_eq!(response.expires_in, Some(3600));
        assert_eq!(response.scope.as_deref(), Some("scope-a"));
    }

    #[tokio::test]
    async fn test_mock_refresh_issues_new_access_token() {
        let endpoint = MockTokenEndpoint::new(vec![]);
        let first = endpoint.refresh_token("r").await.unwrap();
        let second = endpoint.refresh_token("r").await.unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert!(first.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_mock_rejects_empty_code() {
        let endpoint = MockTokenEndpoint::new(vec![]);
        assert!(endpoint.exchange_code("").await.is_err());
    }
}
