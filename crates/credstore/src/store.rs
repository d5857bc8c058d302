//! The flat credential store file.

use crate::error::{Error, Result};
use crate::types::{CredentialEntry, MaskedEntry, comparable_path};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Mode applied to the store file after every write.
pub const STORE_MODE: u32 = 0o600;

/// Result of [`CredentialStore::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No entry existed for the key
    Added,
    /// A previous entry for the key was dropped
    Replaced,
}

#[derive(Debug, Clone)]
enum StoreLine {
    Entry(CredentialEntry),
    /// Kept verbatim so foreign or damaged lines are never lost
    Raw(String),
}

/// In-memory view of a git credential-store file.
///
/// One line per entry. Lines that do not parse are carried through
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    lines: Vec<StoreLine>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| match CredentialEntry::parse_line(line) {
                Ok(entry) => StoreLine::Entry(entry),
                Err(e) => {
                    if !line.trim().is_empty() {
                        log::warn!("Keeping unparseable credential line as-is: {e}");
                    }
                    StoreLine::Raw(line.to_string())
                }
            })
            .collect();
        Self { lines }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                StoreLine::Entry(entry) => out.push_str(&entry.to_line()),
                StoreLine::Raw(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }

    /// Load a store file; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No credential store at {}", path.display());
                Ok(Self::new())
            }
            Err(e) => Err(Error::store(path, e)),
        }
    }

    /// Write the store atomically and restrict it to the owner.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::store(dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::store(dir, e))?;
        restrict_permissions(tmp.path()).map_err(|e| Error::store(tmp.path(), e))?;
        tmp.write_all(self.render().as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::store(path, e))?;
        tmp.persist(path).map_err(|e| Error::store(path, e.error))?;

        restrict_permissions(path).map_err(|e| Error::store(path, e))?;
        log::debug!("Wrote {} credential(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Add `entry`, dropping any previous entry with the same
    /// (username, host, path) key.
    ///
    /// Repository entries are appended. A host-wide entry goes just before
    /// the first repository entry for the same host.
    pub fn upsert(&mut self, entry: CredentialEntry) -> UpsertOutcome {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, StoreLine::Entry(e) if e.same_key(&entry)));
        let outcome = if self.lines.len() < before {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Added
        };
        // git-credential-store answers with the first line that fits the
        // query, and a query without a path fits every line of its host.
        // The host-wide entry must come first so such queries get it.
        let at = if entry.path.is_none() {
            self.lines
                .iter()
                .position(|line| {
                    matches!(line, StoreLine::Entry(e) if e.host == entry.host && e.path.is_some())
                })
                .unwrap_or(self.lines.len())
        } else {
            self.lines.len()
        };
        self.lines.insert(at, StoreLine::Entry(entry));
        outcome
    }

    /// Remove every entry for `username`, returning how many were dropped.
    pub fn remove_user(&mut self, username: &str) -> usize {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, StoreLine::Entry(e) if e.username == username));
        before - self.lines.len()
    }

    /// Remove the single entry with the given key.
    pub fn remove_scoped(&mut self, username: &str, host: &str, path: Option<&str>) -> bool {
        let host = host.to_ascii_lowercase();
        let path = path.map(comparable_path).filter(|p| !p.is_empty());
        let before = self.lines.len();
        self.lines.retain(|line| {
            !matches!(line, StoreLine::Entry(e)
                if e.username == username
                    && e.host == host
                    && e.path.as_deref().map(comparable_path) == path)
        });
        self.lines.len() < before
    }

    pub fn entries(&self) -> impl Iterator<Item = &CredentialEntry> {
        self.lines.iter().filter_map(|line| match line {
            StoreLine::Entry(e) => Some(e),
            StoreLine::Raw(_) => None,
        })
    }

    /// All entries with tokens masked, in file order.
    pub fn list(&self) -> Vec<MaskedEntry> {
        self.entries().map(CredentialEntry::masked).collect()
    }

    /// Non-blank lines that did not parse.
    pub fn invalid_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                StoreLine::Raw(raw) if !raw.trim().is_empty() => Some(raw.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Pick the credential git would use for `host` and `path`.
    ///
    /// This mirrors the lookup contract consumers rely on: an entry scoped
    /// to the requested repository path wins over a host-wide entry for
    /// the same host. The store itself never enforces precedence; it only
    /// keeps keys unique.
    pub fn lookup(
        &self,
        host: &str,
        path: Option<&str>,
        username: Option<&str>,
    ) -> Option<&CredentialEntry> {
        let host = host.to_ascii_lowercase();
        let candidates = self
            .entries()
            .filter(|e| e.host == host)
            .filter(|e| username.is_none_or(|u| e.username == u));

        let wanted = path.map(comparable_path).filter(|p| !p.is_empty());
        let mut host_wide = None;
        for entry in candidates {
            match (entry.path.as_deref().map(comparable_path), wanted) {
                (Some(have), Some(want)) if have == want => return Some(entry),
                (None, _) if host_wide.is_none() => host_wide = Some(entry),
                _ => {}
            }
        }
        host_wide
    }

    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(STORE_MODE))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
