//! AES-256-CBC encryption for credential blobs.
//!
//! Each blob is encrypted with a fresh random IV and serialized as
//! `ivHex:cipherHex`. The key must be 32 bytes (256 bits) and is provided
//! once at startup.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the initialization vector in bytes (one AES block)
pub const IV_SIZE: usize = 16;

const DELIMITER: char = ':';

/// Cipher failures. Messages never include plaintext or key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid encrypted blob format: expected exactly one ':' delimiter")]
    MalformedBlob,

    #[error("encrypted blob is not valid hex")]
    InvalidHex,

    #[error("invalid IV size: expected 16 bytes, got {0}")]
    InvalidIv(usize),

    #[error("decryption failed (wrong key or corrupted data)")]
    Decrypt,

    #[error("decrypted data is not valid UTF-8")]
    NotUtf8,

    #[error("encryption key must be 32 bytes (256 bits), got {0} bytes")]
    InvalidKey(usize),
}

/// Symmetric cipher bound to the process-wide key.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_SIZE],
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher").field("key", &"[REDACTED]").finish()
    }
}

impl TokenCipher {
    /// Creates a cipher from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let key: [u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| CipherError::InvalidKey(key.len()))?;
        Ok(Self { key })
    }

    /// Creates a cipher from configured key material.
    ///
    /// Accepts, in order: a raw 32-byte string, 64 hex characters, or
    /// base64 encoding 32 bytes.
    pub fn from_key_material(material: &str) -> Result<Self, CipherError> {
        let key = validate_key(material)?;
        Self::new(&key)
    }

    /// Encrypts plaintext into an `ivHex:cipherHex` blob.
    ///
    /// # Security
    /// - Uses a cryptographically secure random IV (never reused)
    /// - Plaintext is never logged or included in errors
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|_| CipherError::InvalidKey(self.key.len()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!(
            "{}{}{}",
            hex::encode(iv),
            DELIMITER,
            hex::encode(ciphertext)
        ))
    }

    /// Decrypts an `ivHex:cipherHex` blob back into the original plaintext.
    ///
    /// # Returns
    /// * `Ok(String)` - Decrypted plaintext
    /// * `Err` - Wrong segment count, bad hex, wrong IV size, wrong key or
    ///   corrupted ciphertext
    pub fn decrypt(&self, blob: &str) -> Result<String, CipherError> {
        let mut parts = blob.split(DELIMITER);
        let (iv_hex, cipher_hex) = match (parts.next(), parts.next(), parts.next()) {
            (Some(iv), Some(ct), None) => (iv, ct),
            _ => return Err(CipherError::MalformedBlob),
        };

        let iv = hex::decode(iv_hex).map_err(|_| CipherError::InvalidHex)?;
        if iv.len() != IV_SIZE {
            return Err(CipherError::InvalidIv(iv.len()));
        }
        let ciphertext = hex::decode(cipher_hex).map_err(|_| CipherError::InvalidHex)?;

        let plaintext = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|_| CipherError::Decrypt)?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::NotUtf8)
    }
}

/// Validates key material and returns the 32 key bytes.
pub fn validate_key(material: &str) -> Result<Vec<u8>, CipherError> {
    if material.len() == KEY_SIZE {
        return Ok(material.as_bytes().to_vec());
    }

    if material.len() == KEY_SIZE * 2 {
        if let Ok(bytes) = hex::decode(material) {
            return Ok(bytes);
        }
    }

    match BASE64.decode(material) {
        Ok(bytes) if bytes.len() == KEY_SIZE => Ok(bytes),
        Ok(bytes) => Err(CipherError::InvalidKey(bytes.len())),
        Err(_) => Err(CipherError::InvalidKey(material.len())),
    }
}
