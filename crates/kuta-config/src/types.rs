//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]       # lifetime, token size, id length
//! [cache]         # session cache in front of storage
//! [password]      # Argon2id cost parameters
//! [identifier]    # identifier alphabet and default length
//! [logging]       # log level, format and optional file output
//! ```

use std::path::PathBuf;
use std::time::Duration;

use kuta_crypto::{
    Argon2Params, DEFAULT_ALPHABET, DEFAULT_ID_LENGTH, DEFAULT_TOKEN_BYTES, MAX_ITERATIONS,
    MAX_MEMORY_KIB, MAX_PARALLELISM, NanoId,
};
use kuta_session::{
    CacheConfig, DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL, DEFAULT_SESSION_MAX_AGE_SECS,
    MAX_SESSION_MAX_AGE_SECS, SessionConfig,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Smallest token size accepted from configuration.
pub const MIN_TOKEN_BYTES: usize = 16;

/// Argon2 minimum salt length in bytes.
pub const MIN_SALT_LENGTH: usize = 8;

/// Argon2 minimum output length in bytes.
pub const MIN_KEY_LENGTH: usize = 4;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KutaConfig {
    /// Session issuance settings.
    pub session: Option<SessionSection>,

    /// Session cache settings.
    pub cache: Option<CacheSection>,

    /// Password hashing cost parameters.
    pub password: Option<PasswordSection>,

    /// Identifier generation settings.
    pub identifier: Option<IdentifierSection>,

    /// Logging settings.
    pub logging: Option<LoggingSection>,
}

impl KutaConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config with every section present and set to its defaults.
    pub fn with_defaults() -> Self {
        Self {
            session: Some(SessionSection::default()),
            cache: Some(CacheSection::default()),
            password: Some(PasswordSection::default()),
            identifier: Some(IdentifierSection::default()),
            logging: Some(LoggingSection::default()),
        }
    }

    /// This config with every missing section filled in with its defaults.
    pub fn resolved(&self) -> Self {
        let mut full = Self::with_defaults();
        full.merge(self.clone());
        full
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, never field by field.
    pub fn merge(&mut self, other: KutaConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.identifier.is_some() {
            self.identifier = other.identifier;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Check every present section for values the runtime would reject.
    pub fn validate(&self) -> Result<()> {
        if let Some(session) = &self.session {
            session.validate()?;
        }
        if let Some(cache) = &self.cache {
            cache.validate()?;
        }
        if let Some(password) = &self.password {
            password.validate()?;
        }
        if let Some(identifier) = &self.identifier {
            identifier.validate()?;
        }
        if let Some(logging) = &self.logging {
            logging.validate()?;
        }
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    /// Session lifetime in seconds.
    pub fn session_max_age_secs(&self) -> i64 {
        self.session
            .as_ref()
            .map_or(DEFAULT_SESSION_MAX_AGE_SECS, |s| s.max_age_secs)
    }

    /// Whether a session cache should be put in front of storage.
    pub fn cache_enabled(&self) -> bool {
        self.cache.as_ref().is_none_or(|c| c.enabled)
    }

    /// Cache entry time-to-live in seconds.
    pub fn cache_ttl_secs(&self) -> u64 {
        self.cache
            .as_ref()
            .map_or(DEFAULT_CACHE_TTL.as_secs(), |c| c.ttl_secs)
    }

    /// Maximum number of cached sessions.
    pub fn cache_max_size(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(DEFAULT_CACHE_MAX_SIZE, |c| c.max_size)
    }

    /// Alphabet for generated identifiers.
    pub fn identifier_alphabet(&self) -> &str {
        self.identifier
            .as_ref()
            .map_or(DEFAULT_ALPHABET, |i| i.alphabet.as_str())
    }

    /// Default identifier length.
    pub fn identifier_length(&self) -> usize {
        self.identifier
            .as_ref()
            .map_or(DEFAULT_ID_LENGTH, |i| i.length)
    }

    /// Resolved session settings.
    pub fn session_config(&self) -> SessionConfig {
        let section = self.session.clone().unwrap_or_default();
        SessionConfig::new()
            .with_max_age_secs(section.max_age_secs)
            .with_token_bytes(section.token_bytes)
            .with_id_length(section.id_length)
    }

    /// Resolved cache settings, or `None` when the cache is disabled.
    pub fn cache_config(&self) -> Option<CacheConfig> {
        self.cache_enabled().then(|| {
            CacheConfig::new()
                .with_ttl(Duration::from_secs(self.cache_ttl_secs()))
                .with_max_size(self.cache_max_size())
        })
    }

    /// Resolved Argon2 parameters.
    pub fn argon2_params(&self) -> Argon2Params {
        self.password.clone().unwrap_or_default().into()
    }

    /// Identifier generator over the configured alphabet.
    pub fn id_generator(&self) -> Result<NanoId> {
        NanoId::with_alphabet(self.identifier_alphabet())
            .map_err(|e| ConfigError::invalid("identifier.alphabet", e.to_string()))
    }

    /// Configured log level, if any.
    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    /// Whether logs should be emitted as JSON.
    pub fn log_json(&self) -> bool {
        self.logging.as_ref().is_some_and(|l| l.json)
    }

    /// Directory for log files, if file logging is enabled.
    pub fn log_directory(&self) -> Option<&PathBuf> {
        self.logging.as_ref().and_then(|l| l.directory.as_ref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session issuance settings.
///
/// ```toml
/// [session]
/// max_age_secs = 86400
/// token_bytes = 32
/// id_length = 22
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// How long a new session stays valid.
    pub max_age_secs: i64,
    /// Random bytes per session token.
    pub token_bytes: usize,
    /// Length of session identifiers.
    pub id_length: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_age_secs: DEFAULT_SESSION_MAX_AGE_SECS,
            token_bytes: DEFAULT_TOKEN_BYTES,
            id_length: DEFAULT_ID_LENGTH,
        }
    }
}

impl SessionSection {
    fn validate(&self) -> Result<()> {
        if self.max_age_secs <= 0 {
            return Err(ConfigError::invalid(
                "session.max_age_secs",
                "must be positive",
            ));
        }
        if self.max_age_secs > MAX_SESSION_MAX_AGE_SECS {
            return Err(ConfigError::invalid(
                "session.max_age_secs",
                format!("must be at most {}", MAX_SESSION_MAX_AGE_SECS),
            ));
        }
        if self.token_bytes < MIN_TOKEN_BYTES {
            return Err(ConfigError::invalid(
                "session.token_bytes",
                format!("must be at least {}", MIN_TOKEN_BYTES),
            ));
        }
        if self.id_length == 0 {
            return Err(ConfigError::invalid("session.id_length", "must be positive"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Whether the cache is used at all.
    pub enabled: bool,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
    /// Maximum number of cached sessions.
    pub max_size: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            max_size: DEFAULT_CACHE_MAX_SIZE,
        }
    }
}

impl CacheSection {
    fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::invalid("cache.ttl_secs", "must be positive"));
        }
        if self.max_size == 0 {
            return Err(ConfigError::invalid("cache.max_size", "must be positive"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Password Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Argon2id cost parameters.
///
/// Changing these only affects new hashes; existing hashes carry their own
/// parameters and keep verifying.
///
/// ```toml
/// [password]
/// memory_kib = 65536
/// iterations = 3
/// parallelism = 2
/// salt_length = 16
/// key_length = 32
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSection {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub salt_length: usize,
    pub key_length: usize,
}

impl Default for PasswordSection {
    fn default() -> Self {
        Argon2Params::default().into()
    }
}

impl From<Argon2Params> for PasswordSection {
    fn from(p: Argon2Params) -> Self {
        Self {
            memory_kib: p.memory_kib,
            iterations: p.iterations,
            parallelism: p.parallelism,
            salt_length: p.salt_length,
            key_length: p.key_length,
        }
    }
}

impl From<PasswordSection> for Argon2Params {
    fn from(s: PasswordSection) -> Self {
        Self {
            memory_kib: s.memory_kib,
            iterations: s.iterations,
            parallelism: s.parallelism,
            salt_length: s.salt_length,
            key_length: s.key_length,
        }
    }
}

impl PasswordSection {
    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(ConfigError::invalid("password.iterations", "must be at least 1"));
        }
        if self.parallelism == 0 {
            return Err(ConfigError::invalid("password.parallelism", "must be at least 1"));
        }
        // Hashes above these costs would be refused at verification.
        if self.iterations > MAX_ITERATIONS {
            return Err(ConfigError::invalid(
                "password.iterations",
                format!("must be at most {}", MAX_ITERATIONS),
            ));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(ConfigError::invalid(
                "password.parallelism",
                format!("must be at most {}", MAX_PARALLELISM),
            ));
        }
        if self.memory_kib > MAX_MEMORY_KIB {
            return Err(ConfigError::invalid(
                "password.memory_kib",
                format!("must be at most {}", MAX_MEMORY_KIB),
            ));
        }
        // Argon2 needs 8 KiB per lane.
        if u64::from(self.memory_kib) < 8 * u64::from(self.parallelism) {
            return Err(ConfigError::invalid(
                "password.memory_kib",
                format!("must be at least 8 x parallelism ({})", 8 * self.parallelism),
            ));
        }
        if self.salt_length < MIN_SALT_LENGTH {
            return Err(ConfigError::invalid(
                "password.salt_length",
                format!("must be at least {}", MIN_SALT_LENGTH),
            ));
        }
        if self.key_length < MIN_KEY_LENGTH {
            return Err(ConfigError::invalid(
                "password.key_length",
                format!("must be at least {}", MIN_KEY_LENGTH),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identifier Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierSection {
    /// Characters identifiers are drawn from (ASCII, 8 to 255 of them).
    pub alphabet: String,
    /// Default length for generated identifiers.
    pub length: usize,
}

impl Default for IdentifierSection {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.to_string(),
            length: DEFAULT_ID_LENGTH,
        }
    }
}

impl IdentifierSection {
    fn validate(&self) -> Result<()> {
        NanoId::with_alphabet(&self.alphabet)
            .map_err(|e| ConfigError::invalid("identifier.alphabet", e.to_string()))?;
        if self.length == 0 {
            return Err(ConfigError::invalid("identifier.length", "must be positive"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging settings.
///
/// ```toml
/// [logging]
/// level = "info"
/// json = false
/// directory = "/var/log/kuta"   # optional, enables daily log files
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level filter. `RUST_LOG` overrides it.
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Also write daily-rotated log files into this directory.
    pub directory: Option<PathBuf>,
}

impl LoggingSection {
    fn validate(&self) -> Result<()> {
        if let Some(level) = &self.level
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("'{}' is not one of {}", level, LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
