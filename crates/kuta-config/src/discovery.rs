//! Finding and layering `kuta` config files.
//!
//! Two layers are read, the second winning section by section:
//! - the user file, `config.toml` inside the user config directory
//! - the project file, `kuta.toml` in the working directory
//!
//! The user config directory is the `--config-dir` override when given,
//! then `$KUTA_CONFIG_DIR`, then `<platform config dir>/kuta`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{ConfigError, KutaConfig, Result};

const USER_FILE_NAME: &str = "config.toml";
const PROJECT_FILE_NAME: &str = "kuta.toml";
const CONFIG_DIR_ENV: &str = "KUTA_CONFIG_DIR";

/// One file the discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// False when the file is missing or failed to parse.
    pub loaded: bool,
}

/// Outcome of [`discover_config`].
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// All layers merged, user first.
    pub config: KutaConfig,
    /// Every file looked at, user first.
    pub sources: Vec<ConfigSource>,
    /// One message per file that exists but could not be used.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Files that actually contributed settings.
    pub fn applied_paths(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter_map(|s| s.loaded.then_some(s.path.as_path()))
            .collect()
    }
}

/// Read and merge the user and project config files.
///
/// Missing files are skipped. A file that cannot be read or parsed is
/// reported in [`LoadedConfig::warnings`] and skipped as well, so this only
/// fails if a future layer needs to.
pub fn discover_config(
    config_dir: Option<&Path>,
    project_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let project_file = match project_dir {
        Some(dir) => dir.join(PROJECT_FILE_NAME),
        None => PathBuf::from(PROJECT_FILE_NAME),
    };
    let candidates = user_config_path(config_dir)
        .into_iter()
        .chain(std::iter::once(project_file));

    let mut loaded = LoadedConfig {
        config: KutaConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };
    for path in candidates {
        let applied = apply_layer(&mut loaded, &path);
        loaded.sources.push(ConfigSource {
            path,
            loaded: applied,
        });
    }
    Ok(loaded)
}

/// Parse one config file.
pub fn read_config_file(path: &Path) -> Result<KutaConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    KutaConfig::from_toml(&text)
}

/// Serialize `config` to `path`, creating missing parent directories.
pub fn write_config_file(config: &KutaConfig, path: &Path) -> Result<()> {
    let write_error = |at: &Path, source| ConfigError::WriteFile {
        path: at.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
    }
    std::fs::write(path, config.to_toml()?).map_err(|e| write_error(path, e))?;

    debug!(path = %path.display(), "wrote config file");
    Ok(())
}

/// Location of the user config file, honoring an explicit directory first.
pub fn user_config_path(config_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => user_config_dir()?,
    };
    Some(dir.join(USER_FILE_NAME))
}

/// `$KUTA_CONFIG_DIR` when set and non-empty, else `<platform config dir>/kuta`.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join("kuta")),
    }
}

/// Merge the file at `path` into `loaded`, returning whether it applied.
fn apply_layer(loaded: &mut LoadedConfig, path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match read_config_file(path) {
        Ok(layer) => {
            loaded.config.merge(layer);
            debug!(path = %path.display(), "applied config layer");
            true
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping config layer");
            loaded
                .warnings
                .push(format!("Failed to load {}: {}", path.display(), e));
            false
        }
    }
}
