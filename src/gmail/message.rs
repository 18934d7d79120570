//! Gmail message resources and their flattened, UI-facing form.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

/// `users.messages.get` response (`format=full`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: MessagePart,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// Message as returned by the email API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEmail {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub is_unread: bool,
    pub is_starred: bool,
    pub is_inbox: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

const ATTACHMENT_TYPES: [&str; 4] = ["image/", "application/", "audio/", "video/"];

impl GmailMessage {
    /// Flatten headers, body and attachments.
    ///
    /// Walks every part depth-first. An HTML body wins over plain text
    /// regardless of order; parts without an `attachmentId` are skipped.
    pub fn parse(self) -> ParsedEmail {
        let header = |name: &str| {
            self.payload
                .headers
                .iter()
                .find(|h| h.name == name)
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };
        let subject = header("Subject");
        let from = header("From");
        let to = header("To");
        let date = header("Date");

        let mut walk = BodyWalk::default();
        if !self.payload.parts.is_empty() {
            for part in &self.payload.parts {
                walk.visit(part);
            }
        } else if let Some(data) = self.payload.body.data.as_deref() {
            walk.body = decode_body(data);
        }

        let has_label = |label: &str| self.label_ids.iter().any(|l| l == label);

        ParsedEmail {
            is_unread: has_label("UNREAD"),
            is_starred: has_label("STARRED"),
            is_inbox: has_label("INBOX"),
            id: self.id,
            thread_id: self.thread_id,
            label_ids: self.label_ids,
            snippet: self.snippet,
            subject,
            from,
            to,
            date,
            body: walk.body,
            attachments: walk.attachments,
        }
    }
}

#[derive(Default)]
struct BodyWalk {
    body: String,
    attachments: Vec<Attachment>,
}

impl BodyWalk {
    fn visit(&mut self, part: &MessagePart) {
        match part.mime_type.as_str() {
            "text/html" | "text/plain" => {
                if let Some(data) = part.body.data.as_deref() {
                    let decoded = decode_body(data);
                    if part.mime_type == "text/html" || self.body.is_empty() {
                        self.body = decoded;
                    }
                }
            }
            mime if ATTACHMENT_TYPES.iter().any(|prefix| mime.starts_with(prefix)) => {
                if let Some(id) = &part.body.attachment_id {
                    self.attachments.push(Attachment {
                        id: id.clone(),
                        filename: part.filename.clone(),
                        mime_type: part.mime_type.clone(),
                        size: part.body.size,
                    });
                }
            }
            _ => {}
        }

        for child in &part.parts {
            self.visit(child);
        }
    }
}

/// Gmail bodies are URL-safe base64, padded or not. Undecodable data
/// yields an empty body.
fn decode_body(data: &str) -> String {
    let normalized: String = data
        .trim_end_matches('=')
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    match URL_SAFE_NO_PAD.decode(normalized) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping undecodable message body");
            String::new()
        }
    }
}
