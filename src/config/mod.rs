mod init;
mod schema;

pub use init::write_default_config;
pub use schema::{Config, StoreConfig};

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scoring::validate_scoring;
use crate::synth::validate_generation;

/// Get the config directory path (~/.config/finserv-overlay/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("finserv-overlay"))
}

/// Get the default config file path (~/.config/finserv-overlay/config.yaml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

/// Get the default assessment store path (~/.config/finserv-overlay/assessments.json)
pub fn get_store_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("assessments.json"))
}

/// Store path from config, falling back to the default location.
pub fn resolve_store_path(config: &Config) -> Result<PathBuf> {
    match config.store.as_ref().and_then(|s| s.path.clone()) {
        Some(path) => Ok(expand_home(&path)),
        None => get_store_path(),
    }
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Load configuration from a YAML file
///
/// # Arguments
///
/// * `path` - Optional path to config file. If None, uses the default path
///   (~/.config/finserv-overlay/config.yaml)
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly named config file does not exist
/// - The config file cannot be read
/// - The YAML cannot be parsed
///
/// A missing file at the default path yields the built-in defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let explicit = path.is_some();
    let config_path = match path {
        Some(p) => p,
        None => get_config_path()?,
    };

    if !config_path.exists() {
        if explicit {
            anyhow::bail!("Config file not found at {}", config_path.display());
        }
        tracing::debug!(path = %config_path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    let config: Config = serde_saphyr::from_str(&config_content)
        .with_context(|| {
            format!("Failed to parse config: invalid YAML in {}", config_path.display())
        })?;

    tracing::debug!(path = %config_path.display(), "config loaded");
    Ok(config)
}

/// Validate every section at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(ref scoring) = config.scoring {
        if let Err(e) = validate_scoring(scoring) {
            errors.extend(e);
        }
    }

    if let Some(ref generation) = config.generation {
        if let Err(e) = validate_generation(generation) {
            errors.extend(e);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
