use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::ReconcileSummary;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Runs kept in the history
const HISTORY_LIMIT: usize = 20;

// ============================================================================
// State Structures
// ============================================================================

/// What vpskit has done to this host
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VpsState {
    /// Most recent configuration runs, oldest first
    #[serde(default)]
    pub runs: Vec<RunRecord>,

    /// Sites provisioned through the menu
    #[serde(default)]
    pub sites: Vec<String>,

    /// Domains with an issued certificate
    #[serde(default)]
    pub certificates: Vec<String>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// One reconcile pass against a configuration file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RunRecord {
    pub at: DateTime<Utc>,
    pub action: String,
    pub file: String,
    pub inserted: usize,
    pub replaced: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// Backup written before the file was replaced
    #[serde(default)]
    pub backup: Option<String>,
}

impl Default for VpsState {
    fn default() -> Self {
        Self {
            runs: Vec::new(),
            sites: Vec::new(),
            certificates: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// VpsState Implementation
// ============================================================================

impl VpsState {
    /// Get the state file path
    pub fn state_file() -> Result<PathBuf> {
        Ok(paths::state_dir()?.join("state.toml"))
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: VpsState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create state directory: {}", dir.display())
            })?;
        }

        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn record_run(
        &mut self,
        action: &str,
        file: &Path,
        summary: &ReconcileSummary,
        backup: Option<&Path>,
    ) {
        self.runs.push(RunRecord {
            at: Utc::now(),
            action: action.to_string(),
            file: file.display().to_string(),
            inserted: summary.inserted,
            replaced: summary.replaced,
            removed: summary.removed,
            unchanged: summary.unchanged,
            backup: backup.map(|b| b.display().to_string()),
        });
        if self.runs.len() > HISTORY_LIMIT {
            let excess = self.runs.len() - HISTORY_LIMIT;
            self.runs.drain(..excess);
        }
        self.last_updated = Utc::now();
    }

    pub fn mark_site(&mut self, domain: &str) {
        if !self.sites.iter().any(|s| s == domain) {
            self.sites.push(domain.to_string());
            self.sites.sort();
        }
        self.last_updated = Utc::now();
    }

    pub fn mark_certificate(&mut self, domain: &str) {
        if !self.certificates.iter().any(|s| s == domain) {
            self.certificates.push(domain.to_string());
            self.certificates.sort();
        }
        self.last_updated = Utc::now();
    }

    pub fn last_run(&self) -> Option<&RunRecord> {
        self.runs.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn summary(inserted: usize, replaced: usize) -> ReconcileSummary {
        ReconcileSummary {
            inserted,
            replaced,
            removed: 0,
            unchanged: 1,
        }
    }

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let state = VpsState::load_from(&dir.path().join("state.toml")).unwrap();
        assert!(state.runs.is_empty());
        assert!(state.sites.is_empty());
    }

    #[test]
    fn state_survives_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut state = VpsState::default();
        state.record_run(
            "security hardening",
            Path::new("/etc/nginx/nginx.conf"),
            &summary(2, 1),
            Some(Path::new("/etc/nginx/nginx.conf.bak.20260101-000000")),
        );
        state.mark_site("example.com");
        state.save_to(&path).unwrap();

        let loaded = VpsState::load_from(&path).unwrap();
        assert_eq!(loaded, state);
        let run = loaded.last_run().unwrap();
        assert_eq!(run.inserted, 2);
        assert_eq!(run.replaced, 1);
        assert!(run.backup.as_deref().unwrap().contains(".bak."));
    }

    #[test]
    fn history_is_bounded() {
        let mut state = VpsState::default();
        for i in 0..(HISTORY_LIMIT + 5) {
            state.record_run(&format!("run {i}"), Path::new("/x"), &summary(0, 0), None);
        }
        assert_eq!(state.runs.len(), HISTORY_LIMIT);
        assert_eq!(state.runs[0].action, "run 5");
    }

    #[test]
    fn sites_and_certificates_are_deduplicated() {
        let mut state = VpsState::default();
        state.mark_site("b.example.com");
        state.mark_site("a.example.com");
        state.mark_site("b.example.com");
        assert_eq!(state.sites, vec!["a.example.com", "b.example.com"]);

        state.mark_certificate("a.example.com");
        state.mark_certificate("a.example.com");
        assert_eq!(state.certificates.len(), 1);
    }
}
