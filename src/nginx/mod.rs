//! nginx provisioning workflows

pub mod firewall;
pub mod hardening;
pub mod install;
pub mod service;
pub mod site;
pub mod snippets;
pub mod tls;
pub mod transaction;

use std::path::PathBuf;

use crate::config::NginxSettings;

/// Where nginx keeps its files on this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxPaths {
    pub conf: PathBuf,
    pub conf_d: PathBuf,
    pub sites_available: PathBuf,
    pub sites_enabled: PathBuf,
    pub web_root: PathBuf,
}

impl NginxPaths {
    pub fn from_settings(settings: &NginxSettings) -> Self {
        Self {
            conf: settings.conf.clone(),
            conf_d: settings.conf_d.clone(),
            sites_available: settings.sites_available.clone(),
            sites_enabled: settings.sites_enabled.clone(),
            web_root: settings.web_root.clone(),
        }
    }

    /// Rooted under `root`, for tests and staging trees
    #[cfg(test)]
    pub fn under(root: &std::path::Path) -> Self {
        Self {
            conf: root.join("nginx.conf"),
            conf_d: root.join("conf.d"),
            sites_available: root.join("sites-available"),
            sites_enabled: root.join("sites-enabled"),
            web_root: root.join("www"),
        }
    }

    pub fn site_file(&self, domain: &str) -> PathBuf {
        self.sites_available.join(domain)
    }

    pub fn site_link(&self, domain: &str) -> PathBuf {
        self.sites_enabled.join(domain)
    }

    pub fn document_root(&self, domain: &str) -> PathBuf {
        self.web_root.join(domain).join("html")
    }

    /// Glob used by the `include` in the http block
    pub fn conf_d_glob(&self) -> String {
        format!("{}/*.conf", self.conf_d.display())
    }
}
