//! Error types for the crypto primitives.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur while generating or checking credentials.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A required argument was empty or otherwise unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An encoded password hash could not be parsed.
    ///
    /// Distinct from a failed verification: this means the stored data is
    /// corrupt or was produced by something else.
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    /// The identifier alphabet was rejected at construction.
    #[error("Invalid alphabet: {0}")]
    InvalidAlphabet(String),

    /// The secure random source failed.
    #[error("Random source failure: {0}")]
    Random(String),

    /// The key derivation function rejected its parameters.
    #[error("Key derivation error: {0}")]
    Kdf(String),
}
