//! Credential persistence in an encrypted, HTTP-only cookie.
//!
//! Every operation takes the request's [`CookieJar`] explicitly. Reads see the
//! cookies the browser sent plus anything written earlier in the same request;
//! writes are emitted as `Set-Cookie` headers on the response.

use super::{Credential, TokenCipher};
use crate::auth::{CookieJar, CookieOptions};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Name of the cookie holding the encrypted credential blob.
pub const TOKEN_COOKIE: &str = "google_tokens";

/// 30 days, in seconds
const TOKEN_COOKIE_MAX_AGE: i64 = 30 * 24 * 60 * 60;

/// Durable per-session credential persistence.
///
/// Implementations never surface errors to callers: a failed write returns
/// `false` and an unreadable credential is reported as absent, because the
/// user can always re-authorize.
pub trait TokenStore: Send + Sync {
    /// Persists the credential. Returns `false` (after logging the cause) on failure.
    fn store(&self, jar: &mut CookieJar, credential: &Credential) -> bool;

    /// Returns the stored credential, or `None` if absent or unreadable.
    fn retrieve(&self, jar: &CookieJar) -> Option<Credential>;

    /// Removes the stored credential. Idempotent.
    fn clear(&self, jar: &mut CookieJar);
}

/// Production store: JSON → AES-256-CBC → `google_tokens` cookie.
///
/// # Security
/// - Cookie is HttpOnly, `Secure` in production, `Path=/`, 30 day Max-Age
/// - Plaintext tokens are never logged
pub struct CookieTokenStore {
    cipher: TokenCipher,
    options: CookieOptions,
}

impl CookieTokenStore {
    /// Creates a store bound to the process-wide cipher.
    ///
    /// # Arguments
    /// * `cipher` - Cipher holding the 32-byte key
    /// * `secure` - Mark the cookie `Secure` (production deployments)
    pub fn new(cipher: TokenCipher, secure: bool) -> Self {
        Self {
            cipher,
            options: CookieOptions {
                max_age: Some(TOKEN_COOKIE_MAX_AGE),
                path: "/".to_string(),
                http_only: true,
                secure,
            },
        }
    }
}

impl TokenStore for CookieTokenStore {
    fn store(&self, jar: &mut CookieJar, credential: &Credential) -> bool {
        let serialized = match serde_json::to_string(credential) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize credential");
                return false;
            }
        };

        let blob = match self.cipher.encrypt(&serialized) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Failed to encrypt credential");
                return false;
            }
        };

        if let Err(e) = jar.set(TOKEN_COOKIE, &blob, &self.options) {
            warn!(error = %e, "Failed to write credential cookie");
            return false;
        }

        debug!(
            has_refresh_token = credential.refresh_token.is_some(),
            "Stored encrypted credential cookie"
        );
        true
    }

    fn retrieve(&self, jar: &CookieJar) -> Option<Credential> {
        let blob = jar.get(TOKEN_COOKIE)?;

        let plaintext = match self.cipher.decrypt(blob) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable credential cookie");
                return None;
            }
        };

        match serde_json::from_str(&plaintext) {
            Ok(credential) => Some(credential),
            Err(e) => {
                // serde_json errors carry line/column only, not input text
                warn!(error = %e, "Discarding credential cookie with invalid JSON");
                None
            }
        }
    }

    fn clear(&self, jar: &mut CookieJar) {
        jar.remove(TOKEN_COOKIE, &self.options);
        debug!("Cleared credential cookie");
    }
}

/// In-memory store for tests and tools. Ignores the jar.
#[derive(Default)]
pub struct MemoryTokenStore {
    credential: Mutex<Option<Credential>>,
    writes: Mutex<usize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
            writes: Mutex::new(0),
        }
    }

    /// Number of successful `store` calls.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or_default()
    }

    /// Current contents, bypassing the trait.
    pub fn snapshot(&self) -> Option<Credential> {
        self.credential.lock().ok().and_then(|c| c.clone())
    }
}

impl TokenStore for MemoryTokenStore {
    fn store(&self, _jar: &mut CookieJar, credential: &Credential) -> bool {
        match (self.credential.lock(), self.writes.lock()) {
            (Ok(mut slot), Ok(mut writes)) => {
                *slot = Some(credential.clone());
                *writes += 1;
                true
            }
            _ => false,
        }
    }

    fn retrieve(&self, _jar: &CookieJar) -> Option<Credential> {
        self.snapshot()
    }

    fn clear(&self, _jar: &mut CookieJar) {
        if let Ok(mut slot) = self.credential.lock() {
            *slot = None;
        }
    }
}
