use thiserror::Error;

use staffdesk_core::{AccessError, ConfigError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The token did not decode under this key and purpose.
    ///
    /// Malformed, truncated, tampered, wrong-key, and wrong-purpose tokens
    /// are all reported identically.
    #[error("invalid token")]
    InvalidToken,

    #[error("invalid purpose: {0}")]
    InvalidPurpose(String),

    #[error("encryption failed")]
    Encryption,
}

impl From<CodecError> for AccessError {
    fn from(value: CodecError) -> Self {
        match value {
            CodecError::InvalidToken => AccessError::InvalidToken,
            CodecError::InvalidPurpose(reason) => {
                AccessError::Config(ConfigError::invalid("purpose", reason))
            }
            CodecError::Encryption => AccessError::validation("identifier could not be encoded"),
        }
    }
}
