//! Host preconditions
//!
//! Checked once before a menu starts. Nothing is retried: a failed
//! precondition ends the run with exit code 1.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::runner::CommandRunner;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("this tool must run as root (try: sudo vpskit {tool})")]
    NotRoot { tool: String },

    #[error("unsupported operating system '{found}' (needs a Debian or Ubuntu host)")]
    UnsupportedOs { found: String },

    #[error("required command '{0}' was not found in PATH")]
    MissingTool(String),
}

/// Facts about the running host
#[derive(Debug, Clone, Default)]
pub struct HostFacts {
    pub euid: u32,
    /// `ID` from os-release
    pub os_id: Option<String>,
    /// `ID_LIKE` from os-release
    pub os_like: Vec<String>,
    pub pretty_name: Option<String>,
}

impl HostFacts {
    pub fn detect() -> Self {
        // SAFETY: geteuid has no preconditions and cannot fail
        let euid = unsafe { libc::geteuid() };
        let release = fs::read_to_string(Path::new("/etc/os-release")).unwrap_or_default();
        Self::from_os_release(euid, &release)
    }

    pub fn from_os_release(euid: u32, release: &str) -> Self {
        let mut facts = Self {
            euid,
            ..Self::default()
        };
        for line in release.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.trim() {
                "ID" => facts.os_id = Some(value.to_ascii_lowercase()),
                "ID_LIKE" => {
                    facts.os_like = value
                        .split_whitespace()
                        .map(str::to_ascii_lowercase)
                        .collect();
                }
                "PRETTY_NAME" => facts.pretty_name = Some(value.to_string()),
                _ => {}
            }
        }
        facts
    }

    pub fn is_root(&self) -> bool {
        self.euid == 0
    }

    /// Debian family (apt-get, systemd, ufw available from the archive)
    pub fn is_debian_family(&self) -> bool {
        let family = ["debian", "ubuntu"];
        self.os_id.as_deref().is_some_and(|id| family.contains(&id))
            || self.os_like.iter().any(|l| family.contains(&l.as_str()))
    }

    pub fn describe(&self) -> String {
        self.pretty_name
            .clone()
            .or_else(|| self.os_id.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// What a tool needs from the host before it starts
#[derive(Debug, Clone)]
pub struct Preconditions {
    pub tool: &'static str,
    pub require_root: bool,
    pub require_debian: bool,
    pub commands: Vec<&'static str>,
}

impl Preconditions {
    /// The nginx tool edits /etc and drives apt, so it needs root on Debian
    pub fn nginx() -> Self {
        Self {
            tool: "nginx",
            require_root: true,
            require_debian: true,
            commands: vec!["apt-get", "systemctl"],
        }
    }

    pub fn github() -> Self {
        Self {
            tool: "github",
            require_root: false,
            require_debian: false,
            commands: vec!["git"],
        }
    }

    /// First unmet requirement, in order: root, OS, commands
    pub fn check(
        &self,
        facts: &HostFacts,
        runner: &dyn CommandRunner,
    ) -> Result<(), PreconditionError> {
        if self.require_root && !facts.is_root() {
            return Err(PreconditionError::NotRoot {
                tool: self.tool.to_string(),
            });
        }
        if self.require_debian && !facts.is_debian_family() {
            return Err(PreconditionError::UnsupportedOs {
                found: facts.describe(),
            });
        }
        if let Some(missing) = self.commands.iter().find(|c| !runner.exists(c)) {
            return Err(PreconditionError::MissingTool((*missing).to_string()));
        }
        log::debug!("preconditions for '{}' satisfied", self.tool);
        Ok(())
    }
}
