//! Path resolution for vpskit
//!
//! # Environment Variables
//!
//! - `VPSKIT_CONFIG` - Settings file to load
//! - `VPSKIT_CONFIG_DIR` - Override config directory
//! - `VPSKIT_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `VPSKIT_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/vpskit` (if set)
//! 3. `~/.config/vpskit`
//!
//! For state_dir():
//! 1. `VPSKIT_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/vpskit` (if set)
//! 3. `~/.local/state/vpskit`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the settings file
pub const ENV_CONFIG: &str = "VPSKIT_CONFIG";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "VPSKIT_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "VPSKIT_STATE_DIR";

const APP: &str = "vpskit";

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get the vpskit config directory path
pub fn config_dir() -> Result<PathBuf> {
    config_dir_with(process_env, dirs::home_dir())
}

/// Get the vpskit state directory path
pub fn state_dir() -> Result<PathBuf> {
    state_dir_with(process_env, dirs::home_dir())
}

/// Settings file: explicit `--config`, then `VPSKIT_CONFIG`, then
/// `<config_dir>/config.toml`
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    config_file_with(process_env, dirs::home_dir())
}

fn config_dir_with<F>(env: F, home: Option<PathBuf>) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Some(xdg_config) = env("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = home.context("Could not determine home directory")?;
    let path = home.join(".config").join(APP);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

fn state_dir_with<F>(env: F, home: Option<PathBuf>) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg_state) = env("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = home.context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

fn config_file_with<F>(env: F, home: Option<PathBuf>) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(file) = env(ENV_CONFIG) {
        return Ok(expand(&file));
    }
    Ok(config_dir_with(env, home)?.join("config.toml"))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
