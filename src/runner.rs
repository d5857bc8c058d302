//! External command execution
//!
//! Every system tool (apt-get, ufw, nginx, certbot, systemctl, git) is
//! reached through [`CommandRunner`], so workflows can be exercised with a
//! fake and previewed with [`DryRun`].

use anyhow::{Context, Result, bail};
use std::process::{Command, Stdio};

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout and stderr together, trimmed (nginx -t reports on stderr)
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim().to_string();
        let err = self.stderr.trim();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// Interface to the external collaborators
pub trait CommandRunner {
    /// Run a command and inherit stdio (shows output in real-time)
    fn run(&self, cmd: &str, args: &[&str]) -> Result<bool>;

    /// Run a command and capture output
    fn capture(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Check if a command exists
    fn exists(&self, cmd: &str) -> bool;

    /// Whether side effects are suppressed
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Run a command, failing unless it exits successfully
pub fn run_checked(runner: &dyn CommandRunner, cmd: &str, args: &[&str]) -> Result<()> {
    if !runner.run(cmd, args)? {
        bail!("Command failed: {} {}", cmd, args.join(" "));
    }
    Ok(())
}

/// Capture a command's stdout, failing unless it exits successfully
pub fn capture_checked(runner: &dyn CommandRunner, cmd: &str, args: &[&str]) -> Result<String> {
    let output = runner.capture(cmd, args)?;
    if !output.success {
        bail!("Command failed: {}", output.stderr.trim());
    }
    Ok(output.stdout.trim().to_string())
}

/// Runs commands on the host
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<bool> {
        log::debug!("run: {} {}", cmd, args.join(" "));
        let status = Command::new(cmd)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;
        Ok(status.success())
    }

    fn capture(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("capture: {} {}", cmd, args.join(" "));
        let output = Command::new(cmd)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn exists(&self, cmd: &str) -> bool {
        Command::new("which")
            .arg(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Prints mutating commands instead of running them.
///
/// Read-only queries listed in `passthrough` still hit the host so menus
/// can show real status during a dry run.
pub struct DryRun<'a> {
    inner: &'a dyn CommandRunner,
}

impl<'a> DryRun<'a> {
    pub fn new(inner: &'a dyn CommandRunner) -> Self {
        Self { inner }
    }

    fn passthrough(cmd: &str, args: &[&str]) -> bool {
        match (cmd, args.first().copied()) {
            ("nginx", Some("-t" | "-v" | "-T")) => true,
            ("ufw", Some("status")) => true,
            ("systemctl", Some("status" | "is-active" | "is-enabled")) => true,
            ("certbot", Some("certificates")) => true,
            ("certbot", Some("renew")) => args.contains(&"--dry-run"),
            ("git", Some("config")) => args.contains(&"--get"),
            _ => false,
        }
    }
}

impl CommandRunner for DryRun<'_> {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<bool> {
        if Self::passthrough(cmd, args) {
            return self.inner.run(cmd, args);
        }
        crate::ui::dim(&format!("[dry-run] {} {}", cmd, args.join(" ")));
        Ok(true)
    }

    fn capture(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        if Self::passthrough(cmd, args) {
            return self.inner.capture(cmd, args);
        }
        crate::ui::dim(&format!("[dry-run] {} {}", cmd, args.join(" ")));
        Ok(CommandOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        })
    }

    fn exists(&self, cmd: &str) -> bool {
        self.inner.exists(cmd)
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
