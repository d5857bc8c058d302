use anyhow::{Context, Result, bail};

use crate::install_log::InstallLog;
use crate::progress;
use crate::runner::{CommandRunner, run_checked};
use crate::ui;

/// Packages installed by the install step
pub const PACKAGES: &[&str] = &["nginx", "ufw", "certbot", "python3-certbot-nginx"];

pub fn is_installed(runner: &dyn CommandRunner) -> bool {
    runner.exists("nginx")
}

/// `nginx -v` output, e.g. `nginx/1.24.0 (Ubuntu)`
pub fn version(runner: &dyn CommandRunner) -> Option<String> {
    let out = runner.capture("nginx", &["-v"]).ok()?;
    let text = out.combined();
    let version = text
        .lines()
        .find_map(|l| l.trim().strip_prefix("nginx version:"))
        .map(|v| v.trim().to_string());
    version.filter(|v| !v.is_empty())
}

/// Refresh the package index and install [`PACKAGES`]
pub fn install(runner: &dyn CommandRunner, log: &InstallLog) -> Result<()> {
    let pb = progress::spinner("Updating package index...");
    let update = runner
        .capture("apt-get", &["update", "-q"])
        .context("Failed to run apt-get update")?;
    if !update.success {
        progress::finish_error(&pb, "apt-get update failed");
        bail!("apt-get update failed:\n{}", update.combined());
    }
    progress::finish_success(&pb, "Package index updated");

    let mut args = vec!["install", "-y", "-q"];
    args.extend_from_slice(PACKAGES);
    run_checked(runner, "apt-get", &args).context("Package installation failed")?;
    log.record(&format!("installed packages: {}", PACKAGES.join(" ")));

    if !runner.is_dry_run() && !is_installed(runner) {
        bail!("apt-get finished but the nginx binary is still not on PATH");
    }
    if let Some(v) = version(runner) {
        ui::success(&format!("Installed {v}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use crate::runner::testing::FakeRunner;

    #[test]
    fn parses_version_from_stderr() {
        let runner = FakeRunner::new().on(
            "nginx -v",
            CommandOutput {
                success: true,
                code: Some(0),
                stdout: String::new(),
                stderr: "nginx version: nginx/1.24.0 (Ubuntu)\n".into(),
            },
        );
        assert_eq!(version(&runner).as_deref(), Some("nginx/1.24.0 (Ubuntu)"));
    }

    #[test]
    fn installs_all_packages() {
        let runner = FakeRunner::new();
        install(&runner, &InstallLog::disabled()).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls[0], "apt-get update -q");
        assert_eq!(
            calls[1],
            "apt-get install -y -q nginx ufw certbot python3-certbot-nginx"
        );
    }

    #[test]
    fn update_failure_stops_install() {
        let runner = FakeRunner::new().fail("apt-get update", "Temporary failure resolving");
        let err = install(&runner, &InstallLog::disabled()).unwrap_err();
        assert!(err.to_string().contains("Temporary failure resolving"));
        assert!(!runner.called("apt-get install"));
    }

    #[test]
    fn missing_binary_after_install() {
        let runner = FakeRunner::new().without("nginx");
        assert!(install(&runner, &InstallLog::disabled()).is_err());
    }
}
