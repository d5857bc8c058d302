//! Staged configuration changes with backup and rollback
//!
//! Writes are staged first, then committed together. Before a file is
//! replaced its previous content is copied to `<file>.bak.<timestamp>`.
//! If the post-commit check fails (normally `nginx -t`), every file is
//! restored, new files and links are removed, and the error is returned.

use anyhow::{Context, Result, bail};
use chrono::Local;
use declarative::ReconciliationResult;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::ui;

/// Mode for files that didn't exist before
const NEW_FILE_MODE: u32 = 0o644;

enum Op {
    Write {
        path: PathBuf,
        original: Option<String>,
        content: String,
    },
    Link {
        link: PathBuf,
        target: PathBuf,
        previous: Option<PathBuf>,
    },
}

/// State of a symlink on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Missing,
    Correct,
    WrongTarget(PathBuf),
    FileExists,
}

/// Inspect `link` against the expected `target`
pub fn link_state(link: &Path, target: &Path) -> Result<LinkState> {
    if !link.exists() && !link.is_symlink() {
        return Ok(LinkState::Missing);
    }
    if !link.is_symlink() {
        return Ok(LinkState::FileExists);
    }
    let actual = fs::read_link(link)
        .with_context(|| format!("Failed to read symlink: {}", link.display()))?;
    let actual = if actual.is_absolute() {
        actual
    } else {
        link.parent().map(|p| p.join(&actual)).unwrap_or(actual)
    };
    let expected = target.canonicalize().unwrap_or_else(|_| target.to_path_buf());
    let resolved = actual.canonicalize().unwrap_or_else(|_| actual.clone());
    if expected == resolved {
        Ok(LinkState::Correct)
    } else {
        Ok(LinkState::WrongTarget(actual))
    }
}

/// Files and backups touched by a commit
#[derive(Debug, Default)]
pub struct Committed {
    pub written: Vec<PathBuf>,
    pub backups: Vec<PathBuf>,
    pub dry_run: bool,
}

impl Committed {
    /// Backup of `path`, if one was taken
    pub fn backup_of(&self, path: &Path) -> Option<&Path> {
        let prefix = backup_prefix(path)?;
        self.backups
            .iter()
            .find(|b| {
                b.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
                    && b.parent() == path.parent()
            })
            .map(PathBuf::as_path)
    }
}

pub struct Transaction {
    ops: Vec<Op>,
    dry_run: bool,
    backups_kept: usize,
}

impl Transaction {
    pub fn new(dry_run: bool, backups_kept: usize) -> Self {
        Self {
            ops: Vec::new(),
            dry_run,
            backups_kept,
        }
    }

    /// Stage `content` for `path`. Identical content is not staged.
    pub fn write(&mut self, path: &Path, content: impl Into<String>) -> Result<bool> {
        let content = content.into();
        let original = read_optional(path)?;
        if original.as_deref() == Some(content.as_str()) {
            log::debug!("{} already up to date", path.display());
            return Ok(false);
        }
        self.ops.push(Op::Write {
            path: path.to_path_buf(),
            original,
            content,
        });
        Ok(true)
    }

    /// Stage a reconcile result; unchanged results stage nothing
    pub fn reconciled(&mut self, path: &Path, result: &ReconciliationResult) -> Result<bool> {
        if result.is_unchanged() {
            return Ok(false);
        }
        self.write(path, result.text())
    }

    /// Stage a symlink `link -> target`.
    ///
    /// A correct link stages nothing; a regular file in the way is an error.
    pub fn link(&mut self, link: &Path, target: &Path) -> Result<bool> {
        match link_state(link, target)? {
            LinkState::Correct => Ok(false),
            LinkState::FileExists => bail!(
                "{} exists and is not a symlink; remove it first",
                link.display()
            ),
            LinkState::Missing => {
                self.ops.push(Op::Link {
                    link: link.to_path_buf(),
                    target: target.to_path_buf(),
                    previous: None,
                });
                Ok(true)
            }
            LinkState::WrongTarget(_) => {
                let previous = fs::read_link(link).ok();
                self.ops.push(Op::Link {
                    link: link.to_path_buf(),
                    target: target.to_path_buf(),
                    previous,
                });
                Ok(true)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Print the staged changes
    pub fn preview(&self) {
        for op in &self.ops {
            match op {
                Op::Write {
                    path,
                    original,
                    content,
                } => {
                    let verb = if original.is_some() { "modify" } else { "create" };
                    ui::kv(verb, &path.display().to_string());
                    ui::diff(original.as_deref().unwrap_or(""), content);
                }
                Op::Link { link, target, .. } => {
                    ui::kv(
                        "link",
                        &format!("{} -> {}", link.display(), target.display()),
                    );
                }
            }
        }
    }

    /// Apply all staged changes, then run `check`.
    ///
    /// On a failed write or a failed check everything already applied is
    /// rolled back and the error is returned. In dry-run mode the changes
    /// are only previewed.
    pub fn commit<F>(self, check: F) -> Result<Committed>
    where
        F: FnOnce() -> Result<()>,
    {
        if self.dry_run {
            ui::info("Dry run: the following changes would be made");
            self.preview();
            return Ok(Committed {
                dry_run: true,
                ..Default::default()
            });
        }

        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let mut committed = Committed::default();
        let mut applied: Vec<&Op> = Vec::new();

        for op in &self.ops {
            let result = apply(op, &stamp, &mut committed);
            // A partly applied op is rolled back like a finished one
            applied.push(op);
            if let Err(e) = result {
                rollback(&applied);
                discard_backups(&committed.backups);
                return Err(e);
            }
        }

        if let Err(e) = check() {
            rollback(&applied);
            discard_backups(&committed.backups);
            ui::warn("Configuration check failed; previous files restored");
            return Err(e);
        }

        for backup in &committed.backups {
            prune_backups(backup, self.backups_kept);
        }
        Ok(committed)
    }
}

fn apply(op: &Op, stamp: &str, committed: &mut Committed) -> Result<()> {
    match op {
        Op::Write {
            path, original, content,
        } => {
            if original.is_some() {
                let backup = backup_path(path, stamp)?;
                fs::copy(path, &backup).with_context(|| {
                    format!("Failed to back up {} to {}", path.display(), backup.display())
                })?;
                log::debug!("backup {}", backup.display());
                committed.backups.push(backup);
            }
            write_atomic(path, content)?;
            committed.written.push(path.clone());
        }
        Op::Link { link, target, .. } => {
            if link.is_symlink() {
                fs::remove_file(link).with_context(|| {
                    format!("Failed to remove existing symlink: {}", link.display())
                })?;
            }
            if let Some(parent) = link.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::os::unix::fs::symlink(target, link).with_context(|| {
                format!(
                    "Failed to create symlink: {} -> {}",
                    link.display(),
                    target.display()
                )
            })?;
            committed.written.push(link.clone());
        }
    }
    Ok(())
}

fn rollback(applied: &[&Op]) {
    for op in applied.iter().rev() {
        let result = match op {
            Op::Write {
                path,
                original: Some(text),
                ..
            } => write_atomic(path, text),
            Op::Write {
                path,
                original: None,
                ..
            } => remove_if_present(path),
            Op::Link { link, previous, .. } => remove_if_present(link).and_then(|()| {
                match previous {
                    Some(prev) => std::os::unix::fs::symlink(prev, link).with_context(|| {
                        format!("Failed to restore symlink: {}", link.display())
                    }),
                    None => Ok(()),
                }
            }),
        };
        if let Err(e) = result {
            ui::error(&format!("Rollback incomplete: {e:#}"));
        }
    }
}

/// Backups of a rolled-back commit duplicate the restored files
fn discard_backups(backups: &[PathBuf]) {
    for backup in backups {
        if let Err(e) = fs::remove_file(backup) {
            log::debug!("could not remove {}: {e}", backup.display());
        }
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    if path.exists() || path.is_symlink() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Replace `path` with `content` via a temp file in the same directory,
/// keeping the existing file's permissions
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let permissions = match fs::metadata(path) {
        Ok(meta) => meta.permissions(),
        Err(_) => fs::Permissions::from_mode(NEW_FILE_MODE),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    fs::set_permissions(tmp.path(), permissions)
        .with_context(|| format!("Failed to set permissions for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

fn backup_prefix(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| format!("{n}.bak."))
}

fn backup_path(path: &Path, stamp: &str) -> Result<PathBuf> {
    let prefix = backup_prefix(path)
        .with_context(|| format!("Cannot back up {}", path.display()))?;
    let first = path.with_file_name(format!("{prefix}{stamp}"));
    if !first.exists() {
        return Ok(first);
    }
    // Same second as an earlier commit
    (1..)
        .map(|n| path.with_file_name(format!("{prefix}{stamp}-{n}")))
        .find(|candidate| !candidate.exists())
        .with_context(|| format!("No free backup name for {}", path.display()))
}

/// Backups of `path`, oldest first
pub fn backups_of(path: &Path) -> Vec<PathBuf> {
    let Some(prefix) = backup_prefix(path) else {
        return Vec::new();
    };
    let Some(dir) = path.parent() else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix))
        })
        .collect();
    found.sort();
    found
}

/// Delete all but the newest `keep` backups next to `backup`
fn prune_backups(backup: &Path, keep: usize) {
    let Some(name) = backup.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let Some((original, _)) = name.split_once(".bak.") else {
        return;
    };
    let all = backups_of(&backup.with_file_name(original));
    let excess = all.len().saturating_sub(keep.max(1));
    for old in &all[..excess] {
        match fs::remove_file(old) {
            Ok(()) => log::debug!("pruned backup {}", old.display()),
            Err(e) => log::debug!("could not prune {}: {e}", old.display()),
        }
    }
}
