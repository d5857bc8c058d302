//! Append-only installation log
//!
//! One timestamped line per mutating step. A log that can't be written
//! never stops the operation; the failure is reported once as a warning.

use chrono::Local;
use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::ui;

pub struct InstallLog {
    path: Option<PathBuf>,
    warned: Cell<bool>,
}

impl InstallLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            warned: Cell::new(false),
        }
    }

    /// A log that records nothing (dry runs)
    pub fn disabled() -> Self {
        Self {
            path: None,
            warned: Cell::new(false),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, message: &str) {
        log::info!("{message}");
        let Some(path) = &self.path else {
            return;
        };
        let line = format!("[{}] {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        if let Err(e) = append(path, &line) {
            log::debug!("install log write failed: {e}");
            if !self.warned.replace(true) {
                ui::warn(&format!(
                    "Could not write install log {}: {}",
                    path.display(),
                    e
                ));
            }
        }
    }

    /// Last `n` lines of the log, oldest first
    pub fn tail(&self, n: usize) -> Vec<String> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let Ok(content) = fs::read_to_string(path) else {
            return Vec::new();
        };
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].iter().map(|l| l.to_string()).collect()
    }
}

fn append(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}
