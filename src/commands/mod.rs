pub mod github;
pub mod nginx;

use std::path::PathBuf;

use crate::config::Settings;
use crate::install_log::InstallLog;
use crate::menu::Interactive;
use crate::prompt::Prompter;
use crate::runner::CommandRunner;
use crate::state::VpsState;
use crate::ui;

/// Everything a menu handler works with
pub struct Session<'a> {
    pub settings: Settings,
    pub runner: &'a dyn CommandRunner,
    pub prompter: &'a mut dyn Prompter,
    pub log: InstallLog,
    pub state: VpsState,
    /// Where `state` is saved; `None` keeps it in memory
    pub state_file: Option<PathBuf>,
}

impl<'a> Session<'a> {
    pub fn new(
        settings: Settings,
        runner: &'a dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            settings,
            runner,
            prompter,
            log: InstallLog::disabled(),
            state: VpsState::default(),
            state_file: None,
        }
    }

    pub fn with_log(mut self, log: InstallLog) -> Self {
        self.log = log;
        self
    }

    /// Load state from `path` and save back to it after changes
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        match VpsState::load_from(&path) {
            Ok(state) => self.state = state,
            Err(e) => ui::warn(&format!("Ignoring unreadable state: {e:#}")),
        }
        self.state_file = Some(path);
        self
    }

    pub fn dry_run(&self) -> bool {
        self.runner.is_dry_run()
    }

    /// Persist state; failures only warn
    pub fn save_state(&self) {
        if self.dry_run() {
            return;
        }
        if let Some(path) = &self.state_file
            && let Err(e) = self.state.save_to(path)
        {
            ui::warn(&format!("Could not save state: {e:#}"));
        }
    }
}

impl Interactive for Session<'_> {
    fn prompter(&mut self) -> &mut dyn Prompter {
        &mut *self.prompter
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::Settings;
    use crate::nginx::NginxPaths;
    use std::path::Path;

    /// Settings with every nginx and credential path under `root`
    pub fn settings_under(root: &Path) -> Settings {
        let mut settings = Settings::default();
        let paths = NginxPaths::under(root);
        settings.nginx.conf = paths.conf;
        settings.nginx.conf_d = paths.conf_d;
        settings.nginx.sites_available = paths.sites_available;
        settings.nginx.sites_enabled = paths.sites_enabled;
        settings.nginx.web_root = paths.web_root;
        settings.github.credential_file = root.join("git-credentials").display().to_string();
        settings.log.install_log = root.join("install.log");
        settings
    }
}
