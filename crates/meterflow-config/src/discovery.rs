//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/meterflow/config.toml` (XDG user config)
//! 2. `./meterflow.toml` (project-local)
//! 3. Environment (`METERFLOW_DB_PASSWORD`)

use std::path::{Path, PathBuf};

use crate::{ConfigError, MeterflowConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "meterflow.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "meterflow";

/// Environment variable overriding the user config directory.
const CONFIG_DIR_ENV: &str = "METERFLOW_CONFIG_DIR";

/// Environment variable supplying the database password.
const DB_PASSWORD_ENV: &str = "METERFLOW_DB_PASSWORD";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: MeterflowConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., unparsable layer files).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
///
/// Searches for config files in order:
/// 1. User config dir (from `config_dir`, `METERFLOW_CONFIG_DIR` env, or
///    platform default)
/// 2. Project-local (`./meterflow.toml` or specified project dir)
///
/// Later files override earlier ones, section by section. After merging,
/// `METERFLOW_DB_PASSWORD` (when set and the file value is empty) fills in
/// the database password so credentials can stay out of files.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `METERFLOW_CONFIG_DIR` and the platform
/// default. Pass `Some(path)` for a specific directory, `None` for default
/// resolution.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = MeterflowConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config — explicit override, then env var, then platform default
    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        let source = load_layer(&mut config, &path, &mut warnings)?;
        sources.push(source);
    }

    // 2. Project-local config
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    let source = load_layer(&mut config, &project_path, &mut warnings)?;
    sources.push(source);

    // 3. Environment password fallback
    apply_env_password(&mut config);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<MeterflowConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    MeterflowConfig::from_toml(&contents)
}

/// Save configuration to a file, creating parent directories if needed.
pub fn save_config(config: &MeterflowConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// The user config directory (`METERFLOW_CONFIG_DIR` env or platform default).
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Full path to the user config file, if a config directory exists.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(
    config: &mut MeterflowConfig,
    path: &Path,
    warnings: &mut Vec<String>,
) -> Result<ConfigSource> {
    if !path.is_file() {
        return Ok(ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        });
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            Ok(ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            })
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            Ok(ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            })
        }
    }
}

/// Fill in the database password from the environment when the file layers
/// left it empty. A password set in a file wins over the environment.
fn apply_env_password(config: &mut MeterflowConfig) {
    if let Ok(password) = std::env::var(DB_PASSWORD_ENV)
        && !password.is_empty()
    {
        let mut database = config.database();
        if database.password.is_empty() {
            database.password = password;
            config.database = Some(database);
        }
    }
}
