//! Access-control error model.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type used across the access-control layer.
pub type AccessResult<T> = Result<T, AccessError>;

/// A fault raised by the backing identity store itself (not a rejected
/// mutation): the store is unreachable, timed out, or returned garbage.
///
/// Faults propagate to the caller's own error handling; they are never folded
/// into an authorization verdict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreFault {
    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    #[error("identity store returned corrupt data: {0}")]
    Corrupt(String),
}

impl StoreFault {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

/// Access-control error.
///
/// Expected conditions (denial, missing identity, rejected batch) are modeled
/// here as values. Only `Store` represents a genuine fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Identity or role absent.
    #[error("not found")]
    NotFound,

    /// An opaque resource token failed to decode.
    ///
    /// Deliberately carries no detail: callers must not learn whether the
    /// token was malformed, tampered, or minted for another purpose.
    #[error("invalid token")]
    InvalidToken,

    /// One or more store batches were rejected. Messages are the store's own,
    /// unmodified.
    #[error("identity store rejected the operation: {}", .0.join("; "))]
    StoreOperationFailed(Vec<String>),

    /// A policy name was requested that is not registered.
    #[error("policy '{0}' is not registered")]
    PolicyNotFound(String),

    /// The policy evaluated to a denial.
    #[error("forbidden by policy '{0}'")]
    Forbidden(String),

    /// Input failed validation before reaching the store.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreFault),
}

impl AccessError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn store_failed<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StoreOperationFailed(messages.into_iter().map(Into::into).collect())
    }

    /// Whether this error must be rendered to the caller as "not found".
    ///
    /// Token failures and denials are indistinguishable from a missing
    /// resource so that resource existence is never confirmed to a caller who
    /// may not see it.
    pub fn is_concealed_as_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::InvalidToken | Self::Forbidden(_)
        )
    }

    /// Whether this is a server-side misconfiguration or fault rather than a
    /// caller-facing condition.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::PolicyNotFound(_) | Self::Config(_) | Self::Store(_))
    }
}
