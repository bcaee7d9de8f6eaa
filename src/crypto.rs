// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! # Credential Encryption
//!
//! Authenticated symmetric encryption for the small secrets stored on
//! credential records (passwords and 2FA seeds).
//!
//! ## Token Format
//!
//! ```text
//! base64url_unpadded( 0x01 | nonce (12 bytes) | ciphertext | tag (16 bytes) )
//! ```
//!
//! AES-256-GCM from `ring`, with a fresh random nonce per call.
//!
//! ## Key Handling
//!
//! The configured secret is used directly when it is base64 (any alphabet,
//! padded or not) that decodes to exactly 32 bytes. Any other string is
//! truncated or right-padded with ASCII `'0'` to 32 bytes. That fallback is
//! much weaker than a random key and is logged as a warning.
//!
//! There is no key rotation: tokens produced under an old key fail to decrypt
//! under a new one.

use base64ct::{Base64, Base64Unpadded, Base64Url, Base64UrlUnpadded, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::warn;

/// Leading byte of every token.
const TOKEN_VERSION: u8 = 0x01;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

const TAG_LEN: usize = 16;

/// Errors from the encryption service.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// No encryption key is configured.
    #[error("encryption is not configured: {0}")]
    Configuration(String),

    /// The token could not be decrypted. Never carries partial plaintext.
    #[error("decryption failed: {0}")]
    Decryption(&'static str),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// How the configured secret became a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// The secret was a base64 encoding of 32 bytes.
    Encoded,
    /// The secret's raw bytes were truncated or padded to 32 bytes.
    Padded,
}

/// Turn the configured secret into key bytes.
pub fn derive_key(secret: &str) -> ([u8; KEY_LEN], KeySource) {
    let decoders: [fn(&str) -> Result<Vec<u8>, base64ct::Error>; 4] = [
        Base64::decode_vec,
        Base64Unpadded::decode_vec,
        Base64Url::decode_vec,
        Base64UrlUnpadded::decode_vec,
    ];

    for decode in decoders {
        if let Ok(bytes) = decode(secret) {
            if let Ok(key) = <[u8; KEY_LEN]>::try_from(bytes.as_slice()) {
                return (key, KeySource::Encoded);
            }
        }
    }

    let mut key = [b'0'; KEY_LEN];
    let raw = secret.as_bytes();
    let len = raw.len().min(KEY_LEN);
    key[..len].copy_from_slice(&raw[..len]);
    (key, KeySource::Padded)
}

/// Generate a fresh random key, base64-encoded for use as `ENCRYPTION_KEY`.
pub fn generate_key() -> CryptoResult<String> {
    let mut key = [0u8; KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| CryptoError::Configuration("system RNG unavailable".to_string()))?;
    Ok(Base64::encode_string(&key))
}

/// Encrypts and decrypts credential secrets with one configured key.
pub struct SecretCipher {
    key: Option<LessSafeKey>,
    rng: SystemRandom,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl SecretCipher {
    /// Build a cipher from the configured secret.
    ///
    /// `None` or a blank secret yields a cipher that refuses every operation
    /// with [`CryptoError::Configuration`].
    pub fn new(secret: Option<&str>) -> Self {
        let key = secret
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|secret| {
                let (bytes, source) = derive_key(secret);
                if source == KeySource::Padded {
                    warn!(
                        "ENCRYPTION_KEY is not a base64-encoded 32-byte key; \
                         falling back to a padded key derived from the raw string"
                    );
                }
                UnboundKey::new(&AES_256_GCM, &bytes).ok().map(LessSafeKey::new)
            });

        Self {
            key,
            rng: SystemRandom::new(),
        }
    }

    /// A cipher with no key configured.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    fn key(&self) -> CryptoResult<&LessSafeKey> {
        self.key
            .as_ref()
            .ok_or_else(|| CryptoError::Configuration("ENCRYPTION_KEY is not set".to_string()))
    }

    /// Encrypt `plaintext` into a token.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let key = self.key()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::Configuration("system RNG unavailable".to_string()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CryptoError::Configuration("sealing failed".to_string()))?;

        let mut token = Vec::with_capacity(1 + NONCE_LEN + in_out.len());
        token.push(TOKEN_VERSION);
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&in_out);
        Ok(Base64UrlUnpadded::encode_string(&token))
    }

    /// Decrypt a token produced by [`SecretCipher::encrypt`].
    pub fn decrypt(&self, token: &str) -> CryptoResult<String> {
        let key = self.key()?;

        let bytes = Base64UrlUnpadded::decode_vec(token.trim())
            .map_err(|_| CryptoError::Decryption("malformed token"))?;

        if bytes.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decryption("token too short"));
        }
        if bytes[0] != TOKEN_VERSION {
            return Err(CryptoError::Decryption("unsupported token version"));
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(&bytes[1..1 + NONCE_LEN]);
        let mut in_out = bytes[1 + NONCE_LEN..].to_vec();

        let plaintext = key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Decryption("authentication failed"))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8"))
    }

    /// Encrypt an optional value; absent or empty input stays absent.
    pub fn encrypt_optional(&self, plaintext: Option<&str>) -> CryptoResult<Option<String>> {
        match plaintext {
            Some(value) if !value.is_empty() => self.encrypt(value).map(Some),
            _ => Ok(None),
        }
    }

    /// Decrypt an optional token; absent or empty input stays absent.
    pub fn decrypt_optional(&self, token: Option<&str>) -> CryptoResult<Option<String>> {
        match token {
            Some(value) if !value.is_empty() => self.decrypt(value).map(Some),
            _ => Ok(None),
        }
    }
}
