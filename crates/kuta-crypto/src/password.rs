//! Argon2id password hashing.
//!
//! Hashes are stored in the self-describing form
//!
//! ```text
//! $argon2id$v=19$m=65536,t=3,p=2$<salt>$<key>
//! ```
//!
//! with salt and derived key in standard base64 without padding. Verification
//! always re-derives with the cost parameters embedded in the string, so
//! hashes produced under older settings keep verifying after the defaults
//! change.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use tracing::debug;

use crate::error::{CryptoError, Result};
use crate::random::{OsRandom, RandomSource};
use crate::token::constant_time_eq;

/// Algorithm tag written into every encoded hash.
const ALGORITHM_TAG: &str = "argon2id";

/// Segment delimiter of the encoded form.
const DELIMITER: char = '$';

/// Number of segments after splitting on the delimiter (the first is empty).
const SEGMENT_COUNT: usize = 6;

/// Largest memory cost, in KiB, a stored hash may ask for: 4 GiB.
pub const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;

/// Largest time cost a stored hash may ask for.
pub const MAX_ITERATIONS: u32 = 64;

/// Largest degree of parallelism a stored hash may ask for.
pub const MAX_PARALLELISM: u32 = 64;

/// Argon2 cost parameters.
///
/// Defaults follow the OWASP password storage guidance for Argon2id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes (time cost).
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Salt length in bytes. Only used when hashing.
    pub salt_length: usize,
    /// Derived key length in bytes.
    pub key_length: usize,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
            salt_length: 16,
            key_length: 32,
        }
    }
}

/// Derives and checks password hashes.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Argon2Params,
    source: Arc<dyn RandomSource>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    /// Create a hasher with the default cost parameters.
    pub fn new() -> Self {
        Self::with_params(Argon2Params::default())
    }

    /// Create a hasher with explicit cost parameters.
    pub fn with_params(params: Argon2Params) -> Self {
        Self {
            params,
            source: Arc::new(OsRandom),
        }
    }

    /// Replace the random source used for salts.
    pub fn with_random_source(mut self, source: Arc<dyn RandomSource>) -> Self {
        self.source = source;
        self
    }

    /// The parameters new hashes are produced with.
    pub fn params(&self) -> &Argon2Params {
        &self.params
    }

    /// Hash a password with a fresh random salt.
    ///
    /// Hashing the same password twice yields two different strings.
    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt = vec![0u8; self.params.salt_length];
        self.source.fill_bytes(&mut salt)?;

        let key = derive_key(
            password.as_bytes(),
            &salt,
            Version::V0x13,
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            self.params.key_length,
        )
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;

        Ok(format!(
            "${}$v={}$m={},t={},p={}${}${}",
            ALGORITHM_TAG,
            Version::V0x13 as u32,
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            STANDARD_NO_PAD.encode(&salt),
            STANDARD_NO_PAD.encode(&key),
        ))
    }

    /// Check a password against an encoded hash.
    ///
    /// # Errors
    /// [`CryptoError::MalformedHash`] when `encoded` cannot be parsed or
    /// claims costs above [`MAX_MEMORY_KIB`], [`MAX_ITERATIONS`] or
    /// [`MAX_PARALLELISM`]. A wrong password is `Ok(false)`, never an error.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool> {
        let decoded = EncodedHash::parse(encoded).inspect_err(|e| {
            debug!(error = %e, "rejected encoded password hash");
        })?;

        let computed = derive_key(
            password.as_bytes(),
            &decoded.salt,
            decoded.version,
            decoded.memory_kib,
            decoded.iterations,
            decoded.parallelism,
            decoded.key.len(),
        )
        .map_err(|e| CryptoError::MalformedHash(format!("embedded parameters rejected: {}", e)))?;

        Ok(constant_time_eq(&computed, &decoded.key))
    }
}

fn derive_key(
    password: &[u8],
    salt: &[u8],
    version: Version,
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    key_length: usize,
) -> std::result::Result<Vec<u8>, argon2::Error> {
    let params = Params::new(memory_kib, iterations, parallelism, Some(key_length))?;
    let argon = Argon2::new(Algorithm::Argon2id, version, params);

    let mut out = vec![0u8; key_length];
    argon.hash_password_into(password, salt, &mut out)?;
    Ok(out)
}

/// A parsed `$argon2id$...` string.
#[derive(Debug)]
struct EncodedHash {
    version: Version,
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    salt: Vec<u8>,
    key: Vec<u8>,
}

impl EncodedHash {
    fn parse(encoded: &str) -> Result<Self> {
        let parts: Vec<&str> = encoded.split(DELIMITER).collect();
        if parts.len() != SEGMENT_COUNT {
            return Err(malformed(format!(
                "expected {} segments, found {}",
                SEGMENT_COUNT,
                parts.len()
            )));
        }
        if !parts[0].is_empty() {
            return Err(malformed("hash must begin with '$'"));
        }
        if parts[1] != ALGORITHM_TAG {
            return Err(malformed(format!("unsupported algorithm '{}'", parts[1])));
        }

        let version = parts[2]
            .strip_prefix("v=")
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| malformed(format!("invalid version '{}'", parts[2])))?;
        let version = match version {
            0x13 => Version::V0x13,
            0x10 => Version::V0x10,
            other => return Err(malformed(format!("unsupported version {}", other))),
        };

        let params: Vec<&str> = parts[3].split(',').collect();
        if params.len() != 3 {
            return Err(malformed(format!("invalid parameters '{}'", parts[3])));
        }
        let memory_kib = parse_param(params[0], "m")?;
        let iterations = parse_param(params[1], "t")?;
        let parallelism = parse_param(params[2], "p")?;
        check_limit("m", memory_kib, MAX_MEMORY_KIB)?;
        check_limit("t", iterations, MAX_ITERATIONS)?;
        check_limit("p", parallelism, MAX_PARALLELISM)?;

        let salt = STANDARD_NO_PAD
            .decode(parts[4])
            .map_err(|e| malformed(format!("invalid salt encoding: {}", e)))?;
        let key = STANDARD_NO_PAD
            .decode(parts[5])
            .map_err(|e| malformed(format!("invalid key encoding: {}", e)))?;
        if key.is_empty() {
            return Err(malformed("empty derived key"));
        }

        Ok(Self {
            version,
            memory_kib,
            iterations,
            parallelism,
            salt,
            key,
        })
    }
}

fn parse_param(segment: &str, name: &str) -> Result<u32> {
    segment
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('='))
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| malformed(format!("invalid '{}' parameter '{}'", name, segment)))
}

fn check_limit(name: &str, value: u32, max: u32) -> Result<()> {
    if value > max {
        return Err(malformed(format!(
            "'{}' parameter {} exceeds limit {}",
            name, value, max
        )));
    }
    Ok(())
}

fn malformed(msg: impl Into<String>) -> CryptoError {
    CryptoError::MalformedHash(msg.into())
}
