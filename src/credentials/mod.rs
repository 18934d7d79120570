//! Encrypted credential persistence for Google OAuth tokens.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       TokenStore (CookieTokenStore)      │
//! │  - store / retrieve / clear              │
//! │  - failures collapse to "no credential"  │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!    (encrypt)            (decrypt)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       TokenCipher                        │
//! │  - AES-256-CBC                           │
//! │  - fresh random IV per blob              │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       CookieJar (per request)            │
//! │  - google_tokens=ivHex:cipherHex         │
//! │  - HttpOnly, 30 day Max-Age, Path=/      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use realty_auth::auth::CookieJar;
//! use realty_auth::credentials::{CookieTokenStore, Credential, TokenCipher, TokenStore};
//! use chrono::{Duration, Utc};
//!
//! let cipher = TokenCipher::from_key_material("this-is-a-32-character-key-12345").unwrap();
//! let store = CookieTokenStore::new(cipher, false);
//! let mut jar = CookieJar::default();
//!
//! let credential = Credential {
//!     access_token: "ya29.access".to_string(),
//!     refresh_token: Some("1//refresh".to_string()),
//!     expires_at: Some((Utc::now() + Duration::hours(1)).into()),
//!     scope: vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()],
//!     token_type: Some("Bearer".to_string()),
//! };
//! assert!(store.store(&mut jar, &credential));
//! assert!(store.retrieve(&jar).is_some());
//! store.clear(&mut jar);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod encryption;
mod storage;

pub use encryption::{validate_key, CipherError, TokenCipher, IV_SIZE, KEY_SIZE};
pub use storage::{CookieTokenStore, MemoryTokenStore, TokenStore, TOKEN_COOKIE};

/// Delegated Google credentials for one end user.
///
/// Created by a code exchange or a refresh and replaced wholesale by the next
/// refresh. The JSON form matches the provider's token shape so that blobs
/// written by earlier deployments still parse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token expiry
    #[serde(rename = "expiry_date", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Expiry>,

    #[serde(default, with = "scope_list")]
    pub scope: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Credential {
    /// True when the expiry is missing or not in the future.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => Expiry::from(now) >= expires_at,
            None => true,
        }
    }
}

/// Expiry instant in epoch milliseconds, the precision it is persisted with.
///
/// Converting from a `DateTime` truncates sub-millisecond digits, so a
/// credential read back from its cookie compares equal to the one written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expiry(i64);

impl Expiry {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    /// `None` when outside chrono's representable range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
    }
}

impl From<DateTime<Utc>> for Expiry {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis())
    }
}

/// Scopes are written as a list. The provider's space-delimited string is
/// accepted on read so older cookies still parse.
mod scope_list {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Joined(String),
        List(Vec<String>),
    }

    pub fn serialize<S: Serializer>(scopes: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        scopes.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Option::<Stored>::deserialize(deserializer)? {
            Some(Stored::Joined(joined)) => joined.split_whitespace().map(str::to_string).collect(),
            Some(Stored::List(list)) => list,
            None => Vec::new(),
        })
    }
}
