//! ufw rules for a web host
//!
//! SSH is always allowed before the firewall is enabled.

use anyhow::{Context, Result};
use std::fmt;

use crate::install_log::InstallLog;
use crate::runner::{CommandRunner, run_checked};
use crate::ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallRule {
    Allow(String),
    Deny(String),
}

impl FirewallRule {
    pub fn allow(target: &str) -> Self {
        Self::Allow(target.to_string())
    }

    pub fn deny(target: &str) -> Self {
        Self::Deny(target.to_string())
    }

    fn args(&self) -> [&str; 2] {
        match self {
            Self::Allow(t) => ["allow", t.as_str()],
            Self::Deny(t) => ["deny", t.as_str()],
        }
    }

    fn target(&self) -> &str {
        match self {
            Self::Allow(t) | Self::Deny(t) => t,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            Self::Allow(_) => "ALLOW",
            Self::Deny(_) => "DENY",
        }
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [verb, target] = self.args();
        write!(f, "{verb} {target}")
    }
}

/// Rules for a public web server
pub fn web_rules() -> Vec<FirewallRule> {
    vec![
        FirewallRule::allow("OpenSSH"),
        FirewallRule::allow("Nginx Full"),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirewallStatus {
    pub active: bool,
    /// (target, action) pairs, IPv6 duplicates folded
    pub rules: Vec<(String, String)>,
}

impl FirewallStatus {
    /// Parse `ufw status` output
    pub fn parse(text: &str) -> Self {
        let mut status = Self::default();
        let mut in_table = false;
        for line in text.lines() {
            let line = line.trim_end();
            if let Some(state) = line.strip_prefix("Status:") {
                status.active = state.trim() == "active";
                continue;
            }
            if line.starts_with("--") {
                in_table = true;
                continue;
            }
            if !in_table || line.trim().is_empty() {
                continue;
            }
            // Columns are separated by runs of two or more spaces
            let cols: Vec<&str> = line
                .split("  ")
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            if cols.len() < 2 {
                continue;
            }
            let target = cols[0].trim_end_matches(" (v6)").to_string();
            let action = cols[1]
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            if !status.rules.iter().any(|(t, a)| *t == target && *a == action) {
                status.rules.push((target, action));
            }
        }
        status
    }

    pub fn has(&self, rule: &FirewallRule) -> bool {
        self.rules
            .iter()
            .any(|(t, a)| t == rule.target() && a == rule.action())
    }
}

pub fn status(runner: &dyn CommandRunner) -> Result<FirewallStatus> {
    let out = runner
        .capture("ufw", &["status"])
        .context("Failed to query ufw")?;
    Ok(FirewallStatus::parse(&out.stdout))
}

/// Add missing `rules` and enable ufw; returns rules added
pub fn configure(
    runner: &dyn CommandRunner,
    rules: &[FirewallRule],
    log: &InstallLog,
) -> Result<usize> {
    let current = status(runner)?;
    let mut added = 0;
    for rule in rules {
        if current.has(rule) {
            ui::dim(&format!("{} {} already present", rule.action(), rule.target()));
            continue;
        }
        run_checked(runner, "ufw", &rule.args())?;
        log.record(&format!("ufw {} {}", rule.args()[0], rule.target()));
        added += 1;
    }
    if current.active {
        ui::info("Firewall already active");
    } else {
        run_checked(runner, "ufw", &["--force", "enable"])?;
        log.record("ufw enabled");
        ui::success("Firewall enabled");
    }
    Ok(added)
}
