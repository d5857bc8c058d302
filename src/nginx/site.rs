//! Per-domain server blocks

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use super::NginxPaths;
use super::snippets;
use super::transaction::{LinkState, Transaction, link_state};
use crate::config::RateLimitSettings;

#[derive(Debug, Clone)]
pub struct SiteRequest {
    /// Validated, lowercase domain
    pub domain: String,
    /// Also answer for `www.<domain>`
    pub include_www: bool,
}

impl SiteRequest {
    pub fn server_names(&self) -> Vec<String> {
        let mut names = vec![self.domain.clone()];
        if self.include_www && !self.domain.starts_with("www.") {
            names.push(format!("www.{}", self.domain));
        }
        names
    }
}

/// What staging a site changed
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitePlan {
    pub config_changed: bool,
    pub index_created: bool,
    pub link_changed: bool,
    /// The rate-limit zones the server block names
    pub zones_changed: bool,
}

impl SitePlan {
    pub fn is_noop(&self) -> bool {
        !(self.config_changed || self.index_created || self.link_changed || self.zones_changed)
    }
}

pub fn server_block(req: &SiteRequest, paths: &NginxPaths, limits: &RateLimitSettings) -> String {
    let domain = &req.domain;
    let root = paths.document_root(domain);
    format!(
        r"# Managed by vpskit
server {{
    listen 80;
    listen [::]:80;
    server_name {names};

    root {root};
    index index.html index.htm;

    access_log /var/log/nginx/{domain}.access.log;
    error_log /var/log/nginx/{domain}.error.log;

    limit_req zone={zone} burst={burst} nodelay;
    limit_conn {conn_zone} {connections};

    location / {{
        try_files $uri $uri/ =404;
    }}

    location ~ /\. {{
        deny all;
    }}
}}
",
        names = req.server_names().join(" "),
        root = root.display(),
        zone = limits.zone,
        burst = limits.burst,
        conn_zone = limits.conn_zone,
        connections = limits.connections,
    )
}

pub fn placeholder_index(domain: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\">\n    <title>{domain}</title>\n</head>\n<body>\n    <h1>{domain}</h1>\n    <p>This site is served by nginx.</p>\n</body>\n</html>\n"
    )
}

/// Stage config, placeholder page, sites-enabled link and the
/// rate-limit snippet defining the zones the config refers to.
///
/// An existing index.html is left alone.
pub fn stage(
    tx: &mut Transaction,
    req: &SiteRequest,
    paths: &NginxPaths,
    limits: &RateLimitSettings,
) -> Result<SitePlan> {
    let site_file = paths.site_file(&req.domain);
    let index = paths.document_root(&req.domain).join("index.html");

    let config_changed = tx.write(&site_file, server_block(req, paths, limits))?;
    let index_created = if index.exists() {
        false
    } else {
        tx.write(&index, placeholder_index(&req.domain))?
    };
    let link_changed = tx.link(&paths.site_link(&req.domain), &site_file)?;
    let zones_changed = tx.write(&snippets::rate_limits_path(paths), snippets::rate_limits(limits))?;

    Ok(SitePlan {
        config_changed,
        index_created,
        link_changed,
        zones_changed,
    })
}

/// A site found in sites-available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteStatus {
    pub name: String,
    pub enabled: bool,
}

/// Sites in sites-available, sorted, with whether each is linked
pub fn list(paths: &NginxPaths) -> Result<Vec<SiteStatus>> {
    if !paths.sites_available.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(&paths.sites_available)
        .with_context(|| format!("Failed to read {}", paths.sites_available.display()))?;

    let mut sites = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path: PathBuf = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.contains(".bak.") {
            continue;
        }
        let enabled = matches!(
            link_state(&paths.site_link(name), &path)?,
            LinkState::Correct
        );
        sites.push(SiteStatus {
            name: name.to_string(),
            enabled,
        });
    }
    sites.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sites)
}
