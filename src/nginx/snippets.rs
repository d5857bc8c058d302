//! Files under conf.d that vpskit owns outright
//!
//! These are rewritten whole on every run, unlike nginx.conf.

use anyhow::Result;
use std::path::PathBuf;

use super::NginxPaths;
use super::transaction::Transaction;
use crate::config::RateLimitSettings;

pub const SECURITY_HEADERS: &str = "security-headers.conf";
pub const RATE_LIMITS: &str = "rate-limits.conf";

const MANAGED: &str = "# Managed by vpskit; local edits are overwritten.";

pub fn security_headers() -> String {
    let headers = [
        ("X-Frame-Options", "SAMEORIGIN"),
        ("X-Content-Type-Options", "nosniff"),
        ("Referrer-Policy", "strict-origin-when-cross-origin"),
        ("Permissions-Policy", "geolocation=(), microphone=(), camera=()"),
        ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
    ];
    let mut out = format!("{MANAGED}\n");
    for (name, value) in headers {
        out.push_str(&format!("add_header {name} \"{value}\" always;\n"));
    }
    out
}

pub fn rate_limits(limits: &RateLimitSettings) -> String {
    format!(
        "{MANAGED}\n\
         limit_req_zone $binary_remote_addr zone={}:10m rate={};\n\
         limit_conn_zone $binary_remote_addr zone={}:10m;\n\
         limit_req_status 429;\n\
         limit_conn_status 429;\n",
        limits.zone, limits.rate, limits.conn_zone
    )
}

pub fn security_headers_path(paths: &NginxPaths) -> PathBuf {
    paths.conf_d.join(SECURITY_HEADERS)
}

pub fn rate_limits_path(paths: &NginxPaths) -> PathBuf {
    paths.conf_d.join(RATE_LIMITS)
}

/// Stage both snippets; returns how many differ from disk
pub fn stage(tx: &mut Transaction, paths: &NginxPaths, limits: &RateLimitSettings) -> Result<usize> {
    let mut staged = 0;
    if tx.write(&security_headers_path(paths), security_headers())? {
        staged += 1;
    }
    if tx.write(&rate_limits_path(paths), rate_limits(limits))? {
        staged += 1;
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn header_lines() {
        let text = security_headers();
        assert!(text.starts_with("# Managed by vpskit"));
        assert!(text.contains("add_header X-Content-Type-Options \"nosniff\" always;\n"));
        assert_eq!(text.matches("add_header").count(), 5);
    }

    #[test]
    fn rate_limit_zones_follow_settings() {
        let limits = RateLimitSettings {
            zone: "api".into(),
            rate: "5r/s".into(),
            conn_zone: "apiconn".into(),
            ..Default::default()
        };
        let text = rate_limits(&limits);
        assert!(text.contains("limit_req_zone $binary_remote_addr zone=api:10m rate=5r/s;\n"));
        assert!(text.contains("limit_conn_zone $binary_remote_addr zone=apiconn:10m;\n"));
    }

    #[test]
    fn staging_twice_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let paths = NginxPaths::under(dir.path());
        let limits = RateLimitSettings::default();

        let mut tx = Transaction::new(false, 5);
        assert_eq!(stage(&mut tx, &paths, &limits).unwrap(), 2);
        tx.commit(|| Ok(())).unwrap();
        assert_eq!(
            fs::read_to_string(rate_limits_path(&paths)).unwrap(),
            rate_limits(&limits)
        );

        let mut again = Transaction::new(false, 5);
        assert_eq!(stage(&mut again, &paths, &limits).unwrap(), 0);
        assert!(again.is_empty());
    }
}
