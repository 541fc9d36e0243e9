//! Credential vault: symmetric encryption for stored provider access tokens.
//!
//! Tokens are sealed with ChaCha20-Poly1305 under a single 32-byte key and a
//! fresh random nonce per encryption. The stored envelope is
//! `v1:<nonce>:<ciphertext>`, both parts URL-safe base64 without padding.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chacha20poly1305::aead::{Aead, AeadCore, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use secrecy::{ExposeSecret, SecretString};

use crate::error::VaultError;

const ENVELOPE_VERSION: &str = "v1";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Encrypts and decrypts access tokens with a single symmetric key.
#[derive(Clone)]
pub struct CredentialVault {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Create a vault from raw key bytes.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Create a vault from a base64-encoded 32-byte key (URL-safe or standard alphabet).
    pub fn from_base64(encoded: &SecretString) -> Result<Self, VaultError> {
        let raw = encoded.expose_secret().trim();
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.as_bytes())
            .or_else(|_| STANDARD.decode(raw.as_bytes()))
            .map_err(|e| VaultError::InvalidKey(format!("not valid base64: {e}")))?;

        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            VaultError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self::new(key))
    }

    /// Seal a plaintext token into a storable envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        Ok(format!(
            "{ENVELOPE_VERSION}:{}:{}",
            URL_SAFE_NO_PAD.encode(nonce),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    /// Open an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// Every failure (bad shape, wrong key, tampering) is `CredentialCorrupt`.
    pub fn decrypt(&self, envelope: &str) -> Result<SecretString, VaultError> {
        let mut parts = envelope.split(':');
        let (Some(version), Some(nonce_b64), Some(ciphertext_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VaultError::CredentialCorrupt("malformed envelope".into()));
        };

        if version != ENVELOPE_VERSION {
            return Err(VaultError::CredentialCorrupt(format!(
                "unsupported envelope version {version}"
            )));
        }

        let nonce_raw = URL_SAFE_NO_PAD
            .decode(nonce_b64.as_bytes())
            .map_err(|e| VaultError::CredentialCorrupt(format!("nonce: {e}")))?;
        if nonce_raw.len() != NONCE_LEN {
            return Err(VaultError::CredentialCorrupt("nonce length is invalid".into()));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_b64.as_bytes())
            .map_err(|e| VaultError::CredentialCorrupt(format!("payload: {e}")))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_raw), ciphertext.as_ref())
            .map_err(|_| VaultError::CredentialCorrupt("authentication failed".into()))?;

        String::from_utf8(plaintext)
            .map(SecretString::from)
            .map_err(|e| VaultError::CredentialCorrupt(format!("invalid utf8: {e}")))
    }
}
