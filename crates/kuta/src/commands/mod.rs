//! CLI command handlers.

use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;

use anyhow::{Result, bail};
use kuta_config::{KutaConfig, LoadedConfig};

pub mod config;
pub mod demo;
pub mod id;
pub mod password;
pub mod token;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Explicit user config directory, if given.
    pub config_dir: Option<PathBuf>,
    /// Discovered configuration and where it came from.
    pub loaded: LoadedConfig,
}

impl Context {
    /// The merged configuration.
    pub fn config(&self) -> &KutaConfig {
        &self.loaded.config
    }
}

/// Take a secret from the flag, the terminal (hidden), or one line of stdin.
pub(crate) fn read_secret(flag: Option<String>, prompt: &str) -> Result<String> {
    if let Some(value) = flag {
        return Ok(value);
    }

    let secret = if std::io::stdin().is_terminal() {
        rpassword::prompt_password(prompt)?
    } else {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line.trim_end_matches(['\r', '\n']).to_string()
    };

    if secret.is_empty() {
        bail!("no password provided");
    }
    Ok(secret)
}
