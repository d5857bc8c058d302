//! Directive sets for the main nginx.conf
//!
//! Both sets are plain data handed to the reconciler, so applying one
//! twice is a no-op.

use anyhow::{Context, Result, bail};
use declarative::{
    Anchor, ConfigDocument, Directive, LineMatcher, ReconcileOptions, ReconciliationResult,
    reconcile_with,
};
use std::fs;
use std::path::Path;

use super::NginxPaths;
use crate::config::Settings;

/// Security baseline for the `http` block
pub fn security_directives(settings: &Settings, paths: &NginxPaths) -> Vec<Directive> {
    vec![
        Directive::setting("server_tokens", "off").in_block("http"),
        Directive::setting("client_max_body_size", &settings.nginx.client_max_body_size)
            .in_block("http"),
        Directive::setting("client_body_timeout", "12s").in_block("http"),
        Directive::setting("client_header_timeout", "12s").in_block("http"),
        Directive::setting("send_timeout", "10s").in_block("http"),
        Directive::setting("ssl_protocols", "TLSv1.2 TLSv1.3").in_block("http"),
        Directive::setting("ssl_prefer_server_ciphers", "off").in_block("http"),
        Directive::setting("autoindex", "on").absent(),
        conf_d_include(paths),
    ]
}

/// `include <conf.d>/*.conf;` inside `http`, so the snippets are read
pub fn conf_d_include(paths: &NginxPaths) -> Directive {
    let include = format!("include {};", paths.conf_d_glob());
    Directive::new(
        "include conf.d",
        LineMatcher::exact(&include),
        include,
        Anchor::block("http"),
    )
}

/// Worker, connection and compression tuning
pub fn performance_directives(settings: &Settings) -> Vec<Directive> {
    let nginx = &settings.nginx;
    vec![
        Directive::setting("worker_processes", "auto").with_anchor(Anchor::Start),
        Directive::setting("worker_rlimit_nofile", "65535")
            .with_anchor(Anchor::After(LineMatcher::setting("worker_processes"))),
        Directive::setting("worker_connections", &nginx.worker_connections.to_string())
            .in_block("events"),
        Directive::setting("multi_accept", "on").in_block("events"),
        Directive::setting("sendfile", "on").in_block("http"),
        Directive::setting("tcp_nopush", "on").in_block("http"),
        Directive::setting("tcp_nodelay", "on").in_block("http"),
        Directive::setting("keepalive_timeout", &nginx.keepalive_timeout.to_string())
            .in_block("http"),
        Directive::setting("keepalive_requests", "1000").in_block("http"),
        Directive::setting("open_file_cache", "max=10000 inactive=30s").in_block("http"),
        Directive::setting("open_file_cache_valid", "60s").in_block("http"),
        Directive::setting("gzip", "on").in_block("http"),
        Directive::setting("gzip_vary", "on").in_block("http"),
        Directive::setting("gzip_proxied", "any").in_block("http"),
        Directive::setting("gzip_comp_level", "5").in_block("http"),
        Directive::setting("gzip_min_length", "256").in_block("http"),
        Directive::setting(
            "gzip_types",
            "text/plain text/css text/xml text/javascript application/javascript \
             application/json application/xml application/rss+xml image/svg+xml",
        )
        .in_block("http"),
    ]
}

/// Reconcile the main configuration file against `directives`.
///
/// Nothing is written; the caller stages the result.
pub fn plan(conf: &Path, directives: &[Directive], indent: usize) -> Result<ReconciliationResult> {
    if !conf.exists() {
        bail!(
            "{} not found; install nginx first (menu option 1)",
            conf.display()
        );
    }
    let text = fs::read_to_string(conf)
        .with_context(|| format!("Failed to read {}", conf.display()))?;
    let opts = ReconcileOptions {
        indent_unit: " ".repeat(indent.max(1)),
    };
    let result = reconcile_with(&ConfigDocument::parse(&text), directives, &opts)
        .with_context(|| format!("Cannot reconcile {}", conf.display()))?;

    for changed in result.changed() {
        log::info!("{}: {:?}", changed.name, changed.outcome);
    }
    Ok(result)
}

#[cfg(test)]
pub(crate) const STOCK_CONF: &str = "user www-data;
worker_processes auto;
pid /run/nginx.pid;
include /etc/nginx/modules-enabled/*.conf;

events {
\tworker_connections 768;
\t# multi_accept on;
}

http {

\t##
\t# Basic Settings
\t##

\tsendfile on;
\ttcp_nopush on;
\ttypes_hash_max_size 2048;
\t# server_tokens off;

\tinclude /etc/nginx/mime.types;
\tdefault_type application/octet-stream;

\t##
\t# SSL Settings
\t##

\tssl_protocols TLSv1 TLSv1.1 TLSv1.2 TLSv1.3; # Dropping SSLv3, ref: POODLE
\tssl_prefer_server_ciphers on;

\taccess_log /var/log/nginx/access.log;

\t##
\t# Gzip Settings
\t##

\tgzip on;

\t# gzip_vary on;
\t# gzip_proxied any;
\t# gzip_comp_level 6;

\tinclude /etc/nginx/conf.d/*.conf;
\tinclude /etc/nginx/sites-enabled/*;
}
";
