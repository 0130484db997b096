//! Process-wide master key.
//!
//! The key is generated or loaded once at startup and held for the process
//! lifetime. Tokens only survive a restart when the key is supplied through
//! configuration.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use staffdesk_core::ConfigError;

pub const KEY_LEN: usize = 32;

/// Environment variable carrying the master key (64 hex chars or base64).
pub const KEY_ENV: &str = "STAFFDESK_CODEC_KEY";

pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse an encoded key: 64 hex characters, or standard / URL-safe base64
    /// of exactly 32 bytes.
    pub fn parse(encoded: &str) -> Result<Self, ConfigError> {
        let encoded = encoded.trim();

        let mut decoded = if encoded.len() == KEY_LEN * 2
            && encoded.bytes().all(|b| b.is_ascii_hexdigit())
        {
            hex::decode(encoded).map_err(|e| ConfigError::invalid(KEY_ENV, e.to_string()))?
        } else {
            STANDARD
                .decode(encoded)
                .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
                .map_err(|_| ConfigError::invalid(KEY_ENV, "expected 64 hex chars or base64"))?
        };

        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(ConfigError::invalid(
                KEY_ENV,
                format!("expected {KEY_LEN} key bytes, got {len}"),
            ));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(bytes))
    }

    /// Load the key from [`KEY_ENV`], generating a fresh one when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(KEY_ENV).filter(|v| !v.trim().is_empty()) {
            Some(encoded) => Self::parse(&encoded),
            None => {
                tracing::warn!(
                    env = KEY_ENV,
                    "codec key not configured; generated an ephemeral key (tokens will not survive restart)"
                );
                Ok(Self::generate())
            }
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl core::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_base64() {
        let raw = [7u8; KEY_LEN];
        let from_hex = MasterKey::parse(&hex::encode(raw)).unwrap();
        let from_b64 = MasterKey::parse(&STANDARD.encode(raw)).unwrap();
        let from_url = MasterKey::parse(&URL_SAFE_NO_PAD.encode(raw)).unwrap();
        assert_eq!(from_hex.as_bytes(), &raw);
        assert_eq!(from_b64.as_bytes(), &raw);
        assert_eq!(from_url.as_bytes(), &raw);
    }

    #[test]
    fn rejects_wrong_length_and_garbage() {
        assert!(MasterKey::parse(&hex::encode([1u8; 16])).is_err());
        assert!(MasterKey::parse("not a key!").is_err());
    }

    #[test]
    fn missing_env_generates_key() {
        let a = MasterKey::from_lookup(|_| None).unwrap();
        let b = MasterKey::from_lookup(|_| None).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn debug_is_redacted() {
        let key = MasterKey::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "MasterKey(<redacted>)");
    }
}
