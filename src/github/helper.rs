//! git credential-helper wiring
//!
//! Host-wide tokens need only the `store` helper. A repository token also
//! needs `useHttpPath` for that repository's URL, so git sends the path
//! and only the repository entry matches. Other repositories on the host
//! send no path, and the store answers them with the first line for the
//! host, which the store keeps host-wide.

use anyhow::Result;
use std::path::Path;

use super::identity::{get_global, set_global};
use crate::prompt::Prompter;
use crate::runner::CommandRunner;
use crate::ui;

pub fn helper_value(store: &Path) -> String {
    format!("store --file {}", store.display())
}

/// Path written to the credential store for `owner/repo`.
///
/// GitHub clone URLs end in `.git`, and git compares paths literally.
pub fn store_path(repo: &str) -> String {
    let repo = repo.trim_matches('/');
    if repo.ends_with(".git") {
        repo.to_string()
    } else {
        format!("{repo}.git")
    }
}

fn use_http_path_key(host: &str, repo: &str) -> String {
    format!("credential.https://{host}/{}.useHttpPath", store_path(repo))
}

/// Point `credential.helper` at `store`; returns true when it changed.
///
/// A different helper already in place is only replaced after the
/// operator agrees.
pub fn ensure_store_helper(
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
    store: &Path,
) -> Result<bool> {
    let wanted = helper_value(store);
    match get_global(runner, "credential.helper")? {
        Some(current) if current == wanted => return Ok(false),
        Some(current) => {
            ui::warn(&format!("credential.helper is currently '{current}'"));
            if !prompter.confirm(&format!("Replace it with '{wanted}'?"), false)? {
                ui::warn("Kept the existing helper; git will not read the stored tokens");
                return Ok(false);
            }
        }
        None => {}
    }
    set_global(runner, "credential.helper", &wanted)?;
    Ok(true)
}

/// Make git send the path for `repo` on `host`
pub fn enable_path_scoping(runner: &dyn CommandRunner, host: &str, repo: &str) -> Result<bool> {
    let key = use_http_path_key(host, repo);
    if get_global(runner, &key)?.as_deref() == Some("true") {
        return Ok(false);
    }
    set_global(runner, &key, "true")?;
    Ok(true)
}

/// Undo [`enable_path_scoping`]; a missing key is fine
pub fn disable_path_scoping(runner: &dyn CommandRunner, host: &str, repo: &str) -> Result<()> {
    let key = use_http_path_key(host, repo);
    runner.capture("git", &["config", "--global", "--unset", &key])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::testing::ScriptedPrompter;
    use crate::runner::testing::FakeRunner;

    #[test]
    fn store_paths_end_in_git() {
        assert_eq!(store_path("acme/api"), "acme/api.git");
        assert_eq!(store_path("/acme/api.git"), "acme/api.git");
    }

    #[test]
    fn helper_is_set_once() {
        let store = Path::new("/root/.git-credentials");
        let mut prompter = ScriptedPrompter::default();
        let fresh = FakeRunner::new().fail("git config --global --get credential.helper", "");
        assert!(ensure_store_helper(&fresh, &mut prompter, store).unwrap());
        assert!(fresh.called(
            "git config --global credential.helper store --file /root/.git-credentials"
        ));

        let done = FakeRunner::new().ok(
            "git config --global --get credential.helper",
            "store --file /root/.git-credentials\n",
        );
        assert!(!ensure_store_helper(&done, &mut prompter, store).unwrap());
        assert_eq!(done.count("git config --global credential.helper"), 0);
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn foreign_helper_is_kept_unless_confirmed() {
        let store = Path::new("/root/.git-credentials");
        let runner = FakeRunner::new().ok("git config --global --get credential.helper", "manager\n");

        let mut decline = ScriptedPrompter::new(["n"]);
        assert!(!ensure_store_helper(&runner, &mut decline, store).unwrap());
        assert_eq!(decline.asked.len(), 1);
        assert_eq!(runner.count("git config --global credential.helper"), 0);

        let mut accept = ScriptedPrompter::new(["y"]);
        assert!(ensure_store_helper(&runner, &mut accept, store).unwrap());
        assert!(runner.called(
            "git config --global credential.helper store --file /root/.git-credentials"
        ));
    }

    #[test]
    fn path_scoping_targets_one_repository() {
        let runner = FakeRunner::new().fail("git config --global --get", "");
        assert!(enable_path_scoping(&runner, "github.com", "acme/api").unwrap());
        assert!(runner.called(
            "git config --global credential.https://github.com/acme/api.git.useHttpPath true"
        ));
    }

    #[test]
    fn path_scoping_is_idempotent() {
        let runner = FakeRunner::new().ok(
            "git config --global --get credential.https://github.com/acme/api.git.useHttpPath",
            "true\n",
        );
        assert!(!enable_path_scoping(&runner, "github.com", "acme/api").unwrap());
    }

    #[test]
    fn disabling_tolerates_missing_key() {
        let runner = FakeRunner::new().fail("git config --global --unset", "");
        disable_path_scoping(&runner, "github.com", "acme/api").unwrap();
        assert!(runner.called("git config --global --unset credential.https://github.com/acme/api.git.useHttpPath"));
    }
}
