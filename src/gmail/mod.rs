//! Read-only Gmail access for a connected user.
//!
//! Lists message ids, then fetches every message in full concurrently and
//! flattens it with [`GmailMessage::parse`]. A single failed fetch fails the
//! whole listing.

mod message;

pub use message::{Attachment, GmailMessage, Header, MessagePart, ParsedEmail, PartBody};

use crate::gate::AuthenticatedClient;
use chrono::{Duration, Utc};
use futures::future::try_join_all;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("Gmail API request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// `users.messages.list` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

pub struct MailboxClient {
    api_base: String,
}

impl MailboxClient {
    /// # Arguments
    /// * `api_base` - Gmail API root, e.g. `https://gmail.googleapis.com/gmail/v1`
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Up to `max_results` messages matching the Gmail search `query`.
    pub async fn list_messages(
        &self,
        client: &AuthenticatedClient,
        max_results: u32,
        query: &str,
    ) -> Result<Vec<ParsedEmail>, MailboxError> {
        let url = format!("{}/users/me/messages", self.api_base);
        let max_results_param = max_results.to_string();
        let list: MessageList = client
            .get_json(&url, &[("maxResults", max_results_param.as_str()), ("q", query)])
            .await?;

        debug!(count = list.messages.len(), "Listed Gmail messages");

        let fetches = list
            .messages
            .iter()
            .take(max_results as usize)
            .map(|m| self.get_message(client, &m.id));
        let emails = try_join_all(fetches).await?;

        info!(count = emails.len(), "Fetched Gmail messages");
        Ok(emails)
    }

    pub async fn get_message(
        &self,
        client: &AuthenticatedClient,
        id: &str,
    ) -> Result<ParsedEmail, MailboxError> {
        let url = format!(
            "{}/users/me/messages/{}",
            self.api_base,
            urlencoding::encode(id)
        );
        let message: GmailMessage = client.get_json(&url, &[("format", "full")]).await?;
        Ok(message.parse())
    }
}

/// Synthetic inbox served in mock mode.
pub fn mock_messages(count: usize) -> Vec<ParsedEmail> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let date = (now - Duration::days(i as i64)).to_rfc3339();
            let label_ids = if i % 3 == 0 {
                vec!["UNREAD".to_string(), "INBOX".to_string()]
            } else {
                vec!["INBOX".to_string()]
            };
            ParsedEmail {
                id: format!("mock-email-{i}"),
                thread_id: format!("mock-thread-{i}"),
                is_unread: i % 3 == 0,
                is_starred: false,
                is_inbox: true,
                label_ids,
                snippet: format!("This is a mock email snippet {i}..."),
                subject: format!("Mock Email Subject {i}"),
                from: format!("Sender Name {i} <sender{i}@example.com>"),
                to: "Your Name <you@example.com>".to_string(),
                date,
                body: format!(
                    "<p>This is the body of mock email {i}.</p><p>It contains some sample content for testing.</p>"
                ),
                attachments: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CookieJar;
    use crate::credentials::{Credential, MemoryTokenStore};
    use crate::gate::AuthGate;
    use crate::oauth::{MockTokenEndpoint, OAuthClient, ProviderSettings};
    use mockito::Matcher;
    use std::sync::Arc;

    async fn authenticated_client() -> AuthenticatedClient {
        let settings = ProviderSettings {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![],
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost/callback".to_string(),
        };
        let store = Arc::new(MemoryTokenStore::with_credential(Credential {
            access_token: "ya29.test".to_string(),
            refresh_token: Some("1//r".to_string()),
            expires_at: Some((Utc::now() + Duration::hours(1)).into()),
            scope: vec![],
            token_type: Some("Bearer".to_string()),
        }));
        let oauth = OAuthClient::new(settings, Arc::new(MockTokenEndpoint::new(vec![])), store);
        AuthGate::with_http_client(Arc::new(oauth), reqwest::Client::new())
            .get_client(&mut CookieJar::default())
            .await
            .unwrap()
            .unwrap()
    }

    fn full_message(id: &str, subject: &str) -> String {
        serde_json::json!({
            "id": id,
            "threadId": format!("t-{id}"),
            "labelIds": ["INBOX"],
            "snippet": "",
            "payload": {
                "mimeType": "text/plain",
                "headers": [{"name": "Subject", "value": subject}],
                "body": {"data": "SGVsbG8"}
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_list_fetches_each_message() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/users/me/messages")
            .match_header("authorization", "Bearer ya29.test")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("maxResults".into(), "2".into()),
                Matcher::UrlEncoded("q".into(), "from:lender".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"messages":[{"id":"m1","threadId":"t1"},{"id":"m2","threadId":"t2"}],"resultSizeEstimate":2}"#)
            .create_async()
            .await;
        for (id, subject) in [("m1", "Rate lock"), ("m2", "Appraisal")] {
            server
                .mock("GET", format!("/users/me/messages/{id}").as_str())
                .match_query(Matcher::UrlEncoded("format".into(), "full".into()))
                .with_header("content-type", "application/json")
                .with_body(full_message(id, subject))
                .create_async()
                .await;
        }

        let client = authenticated_client().await;
        let mailbox = MailboxClient::new(server.url());
        let emails = mailbox.list_messages(&client, 2, "from:lender").await.unwrap();

        let subjects: Vec<_> = emails.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Rate lock", "Appraisal"]);
        assert_eq!(emails[0].body, "Hello");
        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_mailbox() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/me/messages")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"resultSizeEstimate":0}"#)
            .create_async()
            .await;

        let client = authenticated_client().await;
        let emails = MailboxClient::new(server.url())
            .list_messages(&client, 50, "")
            .await
            .unwrap();
        assert!(emails.is_empty());
    }

    #[tokio::test]
    async fn test_one_failed_fetch_fails_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/me/messages")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"messages":[{"id":"ok"},{"id":"gone"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/users/me/messages/ok")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(full_message("ok", "Fine"))
            .create_async()
            .await;
        server
            .mock("GET", "/users/me/messages/gone")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = authenticated_client().await;
        let result = MailboxClient::new(server.url())
            .list_messages(&client, 50, "")
            .await;
        assert!(matches!(result, Err(MailboxError::Request(_))));
    }

    #[test]
    fn test_mock_messages() {
        let emails = mock_messages(15);
        assert_eq!(emails.len(), 15);
        assert_eq!(emails[0].id, "mock-email-0");
        assert!(emails[0].is_unread);
        assert!(!emails[1].is_unread);
        assert!(emails.iter().all(|e| e.is_inbox));
    }
}
