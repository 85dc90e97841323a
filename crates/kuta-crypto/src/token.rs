//! Opaque session tokens and their digests.
//!
//! The raw token goes to the client exactly once. Only the SHA-256 digest
//! (lowercase hex) is ever persisted or used as a lookup key.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, Result};
use crate::random::{OsRandom, RandomSource};

/// Default token size in bytes (256 bits).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// A freshly issued token and its digest.
#[derive(Clone)]
pub struct TokenPair {
    /// Value returned to the client.
    pub token: String,
    /// Value kept in storage.
    pub hash: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &"<redacted>")
            .field("hash", &self.hash)
            .finish()
    }
}

/// Generate a URL-safe, unpadded base64 token of `byte_length` random bytes.
///
/// A length of zero falls back to [`DEFAULT_TOKEN_BYTES`].
pub fn generate_token(byte_length: usize) -> Result<String> {
    generate_token_with(&OsRandom, byte_length)
}

/// Same as [`generate_token`], drawing from an explicit random source.
pub fn generate_token_with(source: &dyn RandomSource, byte_length: usize) -> Result<String> {
    let len = if byte_length == 0 {
        DEFAULT_TOKEN_BYTES
    } else {
        byte_length
    };

    let mut bytes = vec![0u8; len];
    source.fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate a token together with its digest.
pub fn generate_hashed_token(byte_length: usize) -> Result<TokenPair> {
    generate_hashed_token_with(&OsRandom, byte_length)
}

/// Same as [`generate_hashed_token`], drawing from an explicit random source.
pub fn generate_hashed_token_with(
    source: &dyn RandomSource,
    byte_length: usize,
) -> Result<TokenPair> {
    let token = generate_token_with(source, byte_length)?;
    let hash = hash_token(&token);
    Ok(TokenPair { token, hash })
}

/// SHA-256 digest of a token, hex-encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a raw token against a stored digest.
///
/// # Errors
/// [`CryptoError::InvalidInput`] if either argument is empty.
pub fn verify_token(token: &str, stored_hash: &str) -> Result<bool> {
    if token.is_empty() || stored_hash.is_empty() {
        return Err(CryptoError::InvalidInput(
            "token and hash cannot be empty".to_string(),
        ));
    }

    let computed = hash_token(token);
    Ok(constant_time_eq(computed.as_bytes(), stored_hash.as_bytes()))
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Differing lengths still run a comparison of equal cost before returning
/// false.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() == b.len() {
        a.ct_eq(b).into()
    } else {
        let _ = a.ct_eq(a);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BrokenSource;

    impl RandomSource for BrokenSource {
        fn fill_bytes(&self, _dest: &mut [u8]) -> Result<()> {
            Err(CryptoError::Random("entropy pool unavailable".to_string()))
        }
    }

    #[test]
    fn test_generate_token_default_length() {
        let token = generate_token(0).unwrap();
        // 32 bytes -> 43 unpadded base64 chars
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn test_generate_token_custom_length() {
        let token = generate_token(16).unwrap();
        assert_eq!(token.len(), 22);
        let decoded = URL_SAFE_NO_PAD.decode(&token).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn test_generate_token_unique() {
        let a = generate_token(DEFAULT_TOKEN_BYTES).unwrap();
        let b = generate_token(DEFAULT_TOKEN_BYTES).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_token_random_failure() {
        let err = generate_token_with(&BrokenSource, 32).unwrap_err();
        assert!(matches!(err, CryptoError::Random(_)));

        let err = generate_hashed_token_with(&BrokenSource, 32).unwrap_err();
        assert!(matches!(err, CryptoError::Random(_)));
    }

    #[test]
    fn test_hashed_token_digest_matches() {
        let pair = generate_hashed_token(32).unwrap();
        assert_eq!(pair.hash, hash_token(&pair.token));
        assert_eq!(pair.hash.len(), 64);
        assert!(pair.hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(pair.token, pair.hash);
    }

    #[test]
    fn test_hash_token_known_vector() {
        // sha256("abc")
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_token_matches() {
        let pair = generate_hashed_token(32).unwrap();
        assert!(verify_token(&pair.token, &pair.hash).unwrap());
    }

    #[test]
    fn test_verify_token_other_digest() {
        let a = generate_hashed_token(32).unwrap();
        let b = generate_hashed_token(32).unwrap();
        assert!(!verify_token(&a.token, &b.hash).unwrap());
    }

    #[test]
    fn test_verify_token_single_char_mutation() {
        let pair = generate_hashed_token(32).unwrap();
        let mut chars: Vec<char> = pair.token.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let mutated: String = chars.into_iter().collect();

        assert!(!verify_token(&mutated, &pair.hash).unwrap());
    }

    #[test]
    fn test_verify_token_empty_inputs() {
        assert!(matches!(
            verify_token("", "abc"),
            Err(CryptoError::InvalidInput(_))
        ));
        assert!(matches!(
            verify_token("abc", ""),
            Err(CryptoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_verify_token_truncated_digest() {
        let pair = generate_hashed_token(32).unwrap();
        assert!(!verify_token(&pair.token, &pair.hash[..63]).unwrap());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer_string"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_token_pair_debug_redacts_token() {
        let pair = generate_hashed_token(32).unwrap();
        let debug = format!("{:?}", pair);
        assert!(!debug.contains(&pair.token));
        assert!(debug.contains("<redacted>"));
    }
}
