use anyhow::Result;

use crate::runner::{CommandRunner, run_checked};

/// `user.name` / `user.email` from the global git config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Read a global git setting; unset keys are `None`
pub fn get_global(runner: &dyn CommandRunner, key: &str) -> Result<Option<String>> {
    let out = runner.capture("git", &["config", "--global", "--get", key])?;
    // git exits 1 for an unset key
    if !out.success {
        return Ok(None);
    }
    let value = out.stdout.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

pub fn set_global(runner: &dyn CommandRunner, key: &str, value: &str) -> Result<()> {
    run_checked(runner, "git", &["config", "--global", key, value])
}

pub fn current(runner: &dyn CommandRunner) -> Result<Identity> {
    Ok(Identity {
        name: get_global(runner, "user.name")?,
        email: get_global(runner, "user.email")?,
    })
}

/// Set both fields; returns true when anything changed
pub fn set(runner: &dyn CommandRunner, name: &str, email: &str) -> Result<bool> {
    let before = current(runner)?;
    let mut changed = false;
    if before.name.as_deref() != Some(name) {
        set_global(runner, "user.name", name)?;
        changed = true;
    }
    if before.email.as_deref() != Some(email) {
        set_global(runner, "user.email", email)?;
        changed = true;
    }
    Ok(changed)
}
