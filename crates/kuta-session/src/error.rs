//! Error types for session management.

use kuta_crypto::CryptoError;

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was empty or did not match the stored digest.
    #[error("invalid session token")]
    InvalidToken,

    /// No session exists for the given token or id.
    #[error("session not found")]
    NotFound,

    /// The session exists but is past its expiry.
    #[error("session expired")]
    Expired,

    /// The configured lifetime puts the expiry outside the representable range.
    #[error("session lifetime of {0} is out of range")]
    LifetimeOutOfRange(chrono::Duration),

    /// Token or identifier generation failed.
    #[error("failed to generate session credentials: {0}")]
    Generation(#[from] CryptoError),

    /// The storage backend failed.
    #[error("storage error while trying to {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
}

impl SessionError {
    pub(crate) fn storage(operation: &'static str, source: StorageError) -> Self {
        SessionError::Storage { operation, source }
    }
}

/// Errors reported by a [`SessionStorage`](crate::SessionStorage) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record matched the lookup.
    #[error("record not found")]
    NotFound,

    /// Anything else the backend could not do.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors reported by a [`SessionCache`](crate::SessionCache) implementation.
///
/// The session manager logs and discards these.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Alias matching the other Kuta crates.
pub type Error = SessionError;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
