//! Secure random byte source.

use rand::TryRngCore;
use rand::rngs::OsRng;
use tracing::warn;

use crate::error::{CryptoError, Result};

/// Supplies cryptographically secure random bytes.
///
/// Tokens, password salts and identifiers all draw from a `RandomSource`.
/// A failure here is never retried; it fails the single call that asked.
pub trait RandomSource: Send + Sync + std::fmt::Debug {
    /// Fill `dest` entirely with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(dest).map_err(|e| {
            warn!(error = %e, "operating system random source failed");
            CryptoError::Random(e.to_string())
        })
    }
}
