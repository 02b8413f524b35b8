//! Authenticated encryption of client secrets at rest.
//!
//! A sealed secret is `nonce (12 bytes) || ciphertext || tag (16 bytes)`
//! under ChaCha20-Poly1305 with a fresh random nonce per seal.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;

use crate::error::{PermsError, Result};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// The deployment key secrets are sealed under.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the base64 form used in service configuration.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| PermsError::InvalidKey(e.to_string()))?;
        let len = decoded.len();
        let bytes: [u8; KEY_LEN] = decoded.try_into().map_err(|_| {
            PermsError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, len))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Encrypt `plaintext` under a fresh nonce, returning nonce and
    /// ciphertext in one buffer.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Reverse [`seal`](Self::seal).
    ///
    /// Truncated input, a foreign key, and any modified byte all fail with
    /// `InvalidSecret`.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(PermsError::InvalidSecret("truncated".into()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| PermsError::InvalidSecret("authentication failed".into()))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let key = EncryptionKey::generate();
        let sealed = key.seal(b"client secret").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + b"client secret".len() + 16);
        assert_eq!(key.open(&sealed).unwrap(), b"client secret");
    }

    #[test]
    fn test_open_rejects_foreign_key_and_truncation() {
        let sealed = EncryptionKey::generate().seal(b"secret").unwrap();
        let other = EncryptionKey::generate();

        assert!(matches!(other.open(&sealed), Err(PermsError::InvalidSecret(_))));
        assert!(matches!(
            other.open(&sealed[..NONCE_LEN - 1]),
            Err(PermsError::InvalidSecret(_))
        ));
    }

    #[test]
    fn test_key_base64_roundtrip() {
        let key = EncryptionKey::from_bytes([7u8; KEY_LEN]);
        let parsed = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(parsed.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_key_wrong_length_rejected() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            EncryptionKey::from_base64(&short),
            Err(PermsError::InvalidKey(_))
        ));
        assert!(EncryptionKey::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = EncryptionKey::from_bytes([0xab; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "EncryptionKey(..)");
    }
}
