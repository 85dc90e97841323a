//! Configuration system for the Kuta session engine.
//!
//! Provides TOML-based configuration with:
//! - Session, cache, password hashing and identifier sections
//! - Config file layering (user config plus project-local overrides)
//! - Validation of values the crypto primitives would reject at runtime
//!
//! Every section is optional; accessors fall back to the library defaults.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, discover_config, read_config_file, user_config_dir,
    user_config_path, write_config_file,
};
pub use error::{ConfigError, Result};
pub use types::*;
