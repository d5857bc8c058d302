//! systemd control and config validation

use anyhow::{Result, bail};
use std::fmt;
use std::path::Path;

use crate::install_log::InstallLog;
use crate::runner::{CommandRunner, run_checked};

const UNIT: &str = "nginx";
const DEFAULT_CONF: &str = "/etc/nginx/nginx.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Reload,
    Enable,
    Status,
}

impl ServiceAction {
    pub const ALL: [Self; 6] = [
        Self::Start,
        Self::Stop,
        Self::Restart,
        Self::Reload,
        Self::Enable,
        Self::Status,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reload => "reload",
            Self::Enable => "enable",
            Self::Status => "status",
        }
    }

    /// Actions that load the configuration
    pub fn needs_valid_config(self) -> bool {
        matches!(self, Self::Start | Self::Restart | Self::Reload)
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `nginx -t` against `conf`; the error carries nginx's diagnostics
pub fn test_config(runner: &dyn CommandRunner, conf: &Path) -> Result<String> {
    let conf = conf.to_string_lossy();
    let mut args = vec!["-t"];
    if conf != DEFAULT_CONF {
        args.extend(["-c", conf.as_ref()]);
    }
    let out = runner.capture("nginx", &args)?;
    if !out.success {
        bail!("nginx configuration test failed:\n{}", out.combined());
    }
    Ok(out.combined())
}

pub fn is_active(runner: &dyn CommandRunner) -> bool {
    runner
        .capture("systemctl", &["is-active", "--quiet", UNIT])
        .map(|o| o.success)
        .unwrap_or(false)
}

/// Perform `action` on the nginx unit.
///
/// Start, restart and reload are refused while `nginx -t` fails.
pub fn control(
    runner: &dyn CommandRunner,
    action: ServiceAction,
    conf: &Path,
    log: &InstallLog,
) -> Result<()> {
    if action.needs_valid_config() {
        test_config(runner, conf)?;
    }
    match action {
        ServiceAction::Status => {
            // systemctl status exits 3 for a stopped unit; that's still a report
            runner.run("systemctl", &["status", UNIT, "--no-pager"])?;
        }
        _ => {
            run_checked(runner, "systemctl", &[action.as_str(), UNIT])?;
            log.record(&format!("systemctl {action} {UNIT}"));
        }
    }
    Ok(())
}

/// Apply new configuration: reload when running, start otherwise
pub fn apply_config(runner: &dyn CommandRunner, conf: &Path, log: &InstallLog) -> Result<()> {
    let action = if is_active(runner) {
        ServiceAction::Reload
    } else {
        ServiceAction::Start
    };
    control(runner, action, conf, log)
}
