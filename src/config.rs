//! Settings file (`config.toml`)
//!
//! Every field has a default, so a missing file or a partial one is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub nginx: NginxSettings,
    pub rate_limit: RateLimitSettings,
    pub github: GithubSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxSettings {
    /// Main configuration file, reconciled in place
    pub conf: PathBuf,
    pub conf_d: PathBuf,
    pub sites_available: PathBuf,
    pub sites_enabled: PathBuf,
    /// Parent of per-site document roots
    pub web_root: PathBuf,
    /// Backups of the main file to keep; older ones are pruned
    pub backups_kept: usize,
    /// Spaces per nesting level for inserted directives
    pub indent: usize,
    pub client_max_body_size: String,
    pub worker_connections: u32,
    pub keepalive_timeout: u32,
}

impl Default for NginxSettings {
    fn default() -> Self {
        Self {
            conf: PathBuf::from("/etc/nginx/nginx.conf"),
            conf_d: PathBuf::from("/etc/nginx/conf.d"),
            sites_available: PathBuf::from("/etc/nginx/sites-available"),
            sites_enabled: PathBuf::from("/etc/nginx/sites-enabled"),
            web_root: PathBuf::from("/var/www"),
            backups_kept: 5,
            indent: 4,
            client_max_body_size: "10m".to_string(),
            worker_connections: 1024,
            keepalive_timeout: 65,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// `limit_req_zone` name shared by all sites
    pub zone: String,
    /// Sustained request rate, nginx syntax (`10r/s`)
    pub rate: String,
    pub burst: u32,
    pub conn_zone: String,
    /// Concurrent connections per client address
    pub connections: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            zone: "vpskit_req".to_string(),
            rate: "10r/s".to_string(),
            burst: 20,
            conn_zone: "vpskit_conn".to_string(),
            connections: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub host: String,
    /// Credential store file; `~` and `$VARS` are expanded
    pub credential_file: String,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            credential_file: "~/.git-credentials".to_string(),
        }
    }
}

impl GithubSettings {
    pub fn credential_path(&self) -> PathBuf {
        paths::expand(&self.credential_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub install_log: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            install_log: PathBuf::from("/var/log/vpskit/install.log"),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Resolve the settings file (see [`paths::config_file`]) and load it
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let path = paths::config_file(explicit)?;
        Self::load(&path)
    }
}
