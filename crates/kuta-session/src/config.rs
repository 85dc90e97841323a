//! Configuration for sessions and the session cache.

use std::time::Duration;

use kuta_crypto::{DEFAULT_ID_LENGTH, DEFAULT_TOKEN_BYTES};

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Longest session lifetime accepted from configuration: 100 years.
pub const MAX_SESSION_MAX_AGE_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Default time-to-live for cached sessions.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of cached sessions.
pub const DEFAULT_CACHE_MAX_SIZE: usize = 500;

/// Configuration for issued sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a new session stays valid.
    ///
    /// Signed so that tests can mint sessions that are already expired.
    pub max_age: chrono::Duration,

    /// Random bytes per token.
    pub token_bytes: usize,

    /// Length of session identifiers.
    pub id_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: chrono::Duration::seconds(DEFAULT_SESSION_MAX_AGE_SECS),
            token_bytes: DEFAULT_TOKEN_BYTES,
            id_length: DEFAULT_ID_LENGTH,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session lifetime.
    pub fn with_max_age(mut self, max_age: chrono::Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the session lifetime in whole seconds.
    ///
    /// Values beyond what a `chrono::Duration` can hold saturate; `create`
    /// then reports the unrepresentable expiry instead of issuing a session.
    pub fn with_max_age_secs(self, secs: i64) -> Self {
        let max_age = chrono::Duration::try_seconds(secs).unwrap_or(if secs < 0 {
            chrono::Duration::MIN
        } else {
            chrono::Duration::MAX
        });
        self.with_max_age(max_age)
    }

    /// Set the number of random bytes per token.
    pub fn with_token_bytes(mut self, bytes: usize) -> Self {
        self.token_bytes = bytes;
        self
    }

    /// Set the session identifier length.
    pub fn with_id_length(mut self, length: usize) -> Self {
        self.id_length = length;
        self
    }
}

/// Configuration for [`MemoryCache`](crate::MemoryCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry is served after insertion.
    ///
    /// Independent of the cached session's own expiry; both are checked.
    pub ttl: Duration,

    /// Maximum number of entries before one is evicted.
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_size: DEFAULT_CACHE_MAX_SIZE,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of entries.
    pub fn with_max_size(mut self, max: usize) -> Self {
        self.max_size = max;
        self
    }

    /// Replace zero values with the defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if self.ttl.is_zero() {
            self.ttl = DEFAULT_CACHE_TTL;
        }
        if self.max_size == 0 {
            self.max_size = DEFAULT_CACHE_MAX_SIZE;
        }
        self
    }
}
