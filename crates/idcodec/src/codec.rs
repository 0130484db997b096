//! Token construction.
//!
//! Wire format (base64url, no padding):
//!
//! ```text
//! [VERSION:1][NONCE:24][CIPHERTEXT || TAG:16]
//! ```
//!
//! The plaintext is the canonical decimal form of the id. Each purpose gets
//! its own cipher and nonce keys derived from the master key, and the purpose
//! is also bound as associated data. The nonce is a keyed hash of the
//! plaintext, so encoding is deterministic per (key, purpose, id).

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::Zeroize;

use crate::error::CodecError;
use crate::key::MasterKey;
use crate::purpose::Purpose;

pub const VERSION: u8 = 0x01;
pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;
/// Shortest decodable token body: version, nonce, one plaintext byte, tag.
pub const MIN_TOKEN_BYTES: usize = 1 + NONCE_LEN + 1 + TAG_LEN;
/// `u64::MAX` has 20 decimal digits.
const MAX_PAYLOAD_LEN: usize = 20;
const MAX_TOKEN_BYTES: usize = 1 + NONCE_LEN + MAX_PAYLOAD_LEN + TAG_LEN;

const CIPHER_CONTEXT: &str = "staffdesk idcodec v1 cipher key";
const NONCE_CONTEXT: &str = "staffdesk idcodec v1 nonce key";

/// Why a token was rejected. Only ever logged, never returned.
#[derive(Debug, Clone, Copy)]
enum Rejection {
    Encoding,
    Length,
    Version,
    Authentication,
    Payload,
}

struct PurposeKeys {
    cipher: XChaCha20Poly1305,
    nonce_key: [u8; 32],
}

impl PurposeKeys {
    fn derive(master: &MasterKey, purpose: &Purpose) -> Self {
        let mut material = Vec::with_capacity(master.as_bytes().len() + 1 + purpose.as_bytes().len());
        material.extend_from_slice(master.as_bytes());
        material.push(0);
        material.extend_from_slice(purpose.as_bytes());

        let mut cipher_key = blake3::derive_key(CIPHER_CONTEXT, &material);
        let nonce_key = blake3::derive_key(NONCE_CONTEXT, &material);
        material.zeroize();

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&cipher_key));
        cipher_key.zeroize();

        Self { cipher, nonce_key }
    }
}

impl Drop for PurposeKeys {
    fn drop(&mut self) {
        self.nonce_key.zeroize();
    }
}

/// Codec over the process-wide master key.
///
/// Cheap to clone; the key is shared read-only behind an `Arc`.
#[derive(Clone)]
pub struct IdCodec {
    master: Arc<MasterKey>,
}

impl IdCodec {
    pub fn new(master: MasterKey) -> Self {
        Self {
            master: Arc::new(master),
        }
    }

    /// Build a codec from `STAFFDESK_CODEC_KEY` (see [`MasterKey::from_env`]).
    pub fn from_env() -> Result<Self, staffdesk_core::ConfigError> {
        Ok(Self::new(MasterKey::from_env()?))
    }

    /// A codec bound to one purpose, with its keys derived once.
    pub fn protector(&self, purpose: &str) -> Result<Protector, CodecError> {
        let purpose = Purpose::new(purpose)?;
        let keys = PurposeKeys::derive(&self.master, &purpose);
        Ok(Protector {
            purpose,
            keys: Arc::new(keys),
        })
    }

    pub fn encode(&self, purpose: &str, id: u64) -> Result<String, CodecError> {
        self.protector(purpose)?.encode(id)
    }

    pub fn decode(&self, purpose: &str, token: &str) -> Result<u64, CodecError> {
        self.protector(purpose)?.decode(token)
    }
}

impl core::fmt::Debug for IdCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdCodec").finish_non_exhaustive()
    }
}

/// Purpose-bound encoder/decoder.
#[derive(Clone)]
pub struct Protector {
    purpose: Purpose,
    keys: Arc<PurposeKeys>,
}

impl Protector {
    pub fn purpose(&self) -> &Purpose {
        &self.purpose
    }

    pub fn encode(&self, id: u64) -> Result<String, CodecError> {
        let payload = id.to_string();
        let digest = blake3::keyed_hash(&self.keys.nonce_key, payload.as_bytes());
        let nonce = XNonce::from_slice(&digest.as_bytes()[..NONCE_LEN]);

        let sealed = self
            .keys
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: payload.as_bytes(),
                    aad: self.purpose.as_bytes(),
                },
            )
            .map_err(|_| CodecError::Encryption)?;

        let mut out = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        out.push(VERSION);
        out.extend_from_slice(nonce);
        out.extend_from_slice(&sealed);

        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Recover the id from a token.
    ///
    /// Every failure maps to [`CodecError::InvalidToken`]; callers treat it as
    /// "resource not found".
    pub fn decode(&self, token: &str) -> Result<u64, CodecError> {
        self.open(token).map_err(|reason| {
            tracing::debug!(purpose = %self.purpose, ?reason, "rejected opaque token");
            CodecError::InvalidToken
        })
    }

    fn open(&self, token: &str) -> Result<u64, Rejection> {
        // Reject oversized input before allocating for it.
        if token.len() > (MAX_TOKEN_BYTES * 4).div_ceil(3) {
            return Err(Rejection::Length);
        }

        let raw = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| Rejection::Encoding)?;

        if raw.len() < MIN_TOKEN_BYTES || raw.len() > MAX_TOKEN_BYTES {
            return Err(Rejection::Length);
        }
        if raw[0] != VERSION {
            return Err(Rejection::Version);
        }

        let nonce = XNonce::from_slice(&raw[1..1 + NONCE_LEN]);
        let plaintext = self
            .keys
            .cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &raw[1 + NONCE_LEN..],
                    aad: self.purpose.as_bytes(),
                },
            )
            .map_err(|_| Rejection::Authentication)?;

        parse_canonical_u64(&plaintext).ok_or(Rejection::Payload)
    }
}

impl core::fmt::Debug for Protector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Protector")
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}

/// Canonical decimal only: digits, no sign, no leading zeros (except "0").
fn parse_canonical_u64(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > MAX_PAYLOAD_LEN {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    core::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::purpose::purposes;

    fn codec() -> IdCodec {
        IdCodec::new(MasterKey::from_bytes([42u8; 32]))
    }

    #[test]
    fn round_trips_edges() {
        let p = codec().protector(purposes::EMPLOYEE_ID_ROUTE_VALUE).unwrap();
        for id in [0, 1, 9, 10, 1_000_000, u64::MAX] {
            let token = p.encode(id).unwrap();
            assert_eq!(p.decode(&token).unwrap(), id);
        }
    }

    #[test]
    fn encoding_is_deterministic_and_url_safe() {
        let p = codec().protector("Employee").unwrap();
        let a = p.encode(7).unwrap();
        let b = p.encode(7).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, p.encode(8).unwrap());
        assert!(a.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_'));
    }

    #[test]
    fn token_does_not_contain_the_id() {
        let p = codec().protector("Employee").unwrap();
        let token = p.encode(123456789).unwrap();
        assert!(!token.contains("123456789"));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = codec().encode("Employee", 5).unwrap();
        let other = IdCodec::new(MasterKey::from_bytes([43u8; 32]));
        assert_eq!(other.decode("Employee", &token), Err(CodecError::InvalidToken));
    }

    #[test]
    fn malformed_inputs_are_rejected_without_panicking() {
        let p = codec().protector("Employee").unwrap();
        let valid = p.encode(5).unwrap();
        let inputs = [
            String::new(),
            "5".to_string(),
            "!!!!".to_string(),
            "====".to_string(),
            valid[..valid.len() - 1].to_string(),
            format!("{valid}AA"),
            "A".repeat(10_000),
        ];
        for input in inputs {
            assert_eq!(p.decode(&input), Err(CodecError::InvalidToken), "{input:?}");
        }
    }

    #[test]
    fn unknown_version_is_rejected() {
        let p = codec().protector("Employee").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(p.encode(5).unwrap()).unwrap();
        raw[0] = 0x02;
        assert_eq!(
            p.decode(&URL_SAFE_NO_PAD.encode(raw)),
            Err(CodecError::InvalidToken)
        );
    }

    #[test]
    fn canonical_payload_rules() {
        assert_eq!(parse_canonical_u64(b"0"), Some(0));
        assert_eq!(parse_canonical_u64(b"18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_canonical_u64(b"18446744073709551616"), None);
        assert_eq!(parse_canonical_u64(b"007"), None);
        assert_eq!(parse_canonical_u64(b"-1"), None);
        assert_eq!(parse_canonical_u64(b"+1"), None);
        assert_eq!(parse_canonical_u64(b""), None);
    }
}
