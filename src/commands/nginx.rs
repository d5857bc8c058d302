//! nginx menu

use anyhow::{Result, bail};
use declarative::{Directive, Outcome, ReconcileSummary};
use std::fs;

use super::Session;
use crate::Context as AppContext;
use crate::cli::NginxArgs;
use crate::config::Settings;
use crate::install_log::InstallLog;
use crate::menu::{Flow, Menu};
use crate::nginx::service::{self, ServiceAction};
use crate::nginx::site::{self, SiteRequest};
use crate::nginx::tls::{self, CertOutcome, CertRequest};
use crate::nginx::transaction::{Committed, Transaction};
use crate::nginx::{NginxPaths, firewall, hardening, install, snippets};
use crate::privilege::{HostFacts, Preconditions};
use crate::prompt::{TermPrompter, ask_validated};
use crate::runner::{CommandRunner, DryRun, SystemRunner};
use crate::state::VpsState;
use crate::ui;
use crate::validate;

pub fn run(ctx: &AppContext, args: NginxArgs) -> Result<()> {
    let system = SystemRunner;
    let dry = DryRun::new(&system);
    let runner: &dyn CommandRunner = if args.dry_run { &dry } else { &system };

    Preconditions::nginx().check(&HostFacts::detect(), runner)?;

    let settings = Settings::discover(ctx.config.as_deref())?;
    let log = if args.dry_run {
        InstallLog::disabled()
    } else {
        InstallLog::new(&settings.log.install_log)
    };

    if !ctx.quiet {
        ui::banner();
    }
    if args.dry_run {
        ui::warn("Dry run: no files are written and no services are touched");
    }

    let mut prompter = TermPrompter;
    let mut session = Session::new(settings, runner, &mut prompter)
        .with_log(log)
        .with_state_file(VpsState::state_file()?);
    menu().run(&mut session)
}

pub fn menu<'a>() -> Menu<Session<'a>> {
    Menu::new("vpskit · nginx")
        .item("1", "Install nginx", install_nginx)
        .item("2", "Configure firewall", configure_firewall)
        .item("3", "Apply security hardening", security_hardening)
        .item("4", "Optimize performance", optimize_performance)
        .item("5", "Add site", add_site)
        .item("6", "Obtain TLS certificate", obtain_certificate)
        .item("7", "Renew certificates (dry run)", renew_certificates)
        .item("8", "Test configuration", test_configuration)
        .item("9", "Service control", service_control)
        .item("10", "Show status", show_status)
}

fn paths(s: &Session<'_>) -> NginxPaths {
    NginxPaths::from_settings(&s.settings.nginx)
}

fn install_nginx(s: &mut Session<'_>) -> Result<Flow> {
    if install::is_installed(s.runner) {
        let version = install::version(s.runner).unwrap_or_else(|| "nginx".to_string());
        ui::success(&format!("{version} is already installed"));
        return Ok(Flow::Continue);
    }

    ui::info(&format!("Packages: {}", install::PACKAGES.join(", ")));
    if !s.prompter.confirm("Install these packages now?", true)? {
        ui::info("Cancelled");
        return Ok(Flow::Continue);
    }

    ui::step(1, 3, "Installing packages");
    install::install(s.runner, &s.log)?;
    let conf = s.settings.nginx.conf.clone();
    ui::step(2, 3, "Enabling nginx at boot");
    service::control(s.runner, ServiceAction::Enable, &conf, &s.log)?;
    ui::step(3, 3, "Starting nginx");
    service::apply_config(s.runner, &conf, &s.log)?;
    ui::success("nginx installed and running");
    Ok(Flow::Continue)
}

fn configure_firewall(s: &mut Session<'_>) -> Result<Flow> {
    if !s.runner.exists("ufw") {
        bail!("ufw is not installed; run option 1 first");
    }
    let rules = firewall::web_rules();
    for rule in &rules {
        ui::dim(&format!("ufw {rule}"));
    }
    if !s.prompter.confirm("Apply these rules and enable ufw?", true)? {
        ui::info("Cancelled");
        return Ok(Flow::Continue);
    }
    let added = firewall::configure(s.runner, &rules, &s.log)?;
    ui::success(&format!("Firewall configured ({added} rule(s) added)"));
    Ok(Flow::Continue)
}

fn security_hardening(s: &mut Session<'_>) -> Result<Flow> {
    let directives = hardening::security_directives(&s.settings, &paths(s));
    reconcile_main_conf(s, "security hardening", &directives, true)
}

fn optimize_performance(s: &mut Session<'_>) -> Result<Flow> {
    let directives = hardening::performance_directives(&s.settings);
    reconcile_main_conf(s, "performance tuning", &directives, false)
}

fn reconcile_main_conf(
    s: &mut Session<'_>,
    action: &str,
    directives: &[Directive],
    with_snippets: bool,
) -> Result<Flow> {
    let paths = paths(s);
    let result = hardening::plan(&paths.conf, directives, s.settings.nginx.indent)?;
    let summary = result.summary();

    let mut tx = Transaction::new(s.dry_run(), s.settings.nginx.backups_kept);
    tx.reconciled(&paths.conf, &result)?;
    if with_snippets {
        snippets::stage(&mut tx, &paths, &s.settings.rate_limit)?;
    }

    if tx.is_empty() {
        ui::success(&format!(
            "{action}: already applied ({} directive(s) unchanged)",
            summary.unchanged
        ));
        return Ok(Flow::Continue);
    }

    ui::section(&format!("Planned {action}"));
    for o in result.outcomes.iter().filter(|o| o.outcome != Outcome::Unchanged) {
        ui::kv(&o.name, outcome_label(o.outcome));
    }

    if !s.dry_run() {
        tx.preview();
        if !s.prompter.confirm("Apply these changes?", true)? {
            ui::info("Cancelled; nothing was written");
            return Ok(Flow::Continue);
        }
    }

    let committed = commit_and_reload(s, tx)?;
    if committed.dry_run {
        return Ok(Flow::Continue);
    }

    s.state
        .record_run(action, &paths.conf, &summary, committed.backup_of(&paths.conf));
    s.log.record(&format!("{action}: {}", describe(&summary)));
    s.save_state();
    ui::success(&format!("{action} applied: {}", describe(&summary)));
    if let Some(backup) = committed.backup_of(&paths.conf) {
        ui::dim(&format!("backup: {}", backup.display()));
    }
    Ok(Flow::Continue)
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Inserted => "insert",
        Outcome::Replaced => "replace",
        Outcome::Removed => "remove",
        Outcome::Unchanged => "unchanged",
    }
}

fn describe(summary: &ReconcileSummary) -> String {
    format!(
        "{} inserted, {} replaced, {} removed, {} unchanged",
        summary.inserted, summary.replaced, summary.removed, summary.unchanged
    )
}

/// Commit, validate with `nginx -t`, then reload or start nginx
fn commit_and_reload(s: &Session<'_>, tx: Transaction) -> Result<Committed> {
    let runner = s.runner;
    let conf = s.settings.nginx.conf.clone();
    let committed = tx.commit(|| service::test_config(runner, &conf).map(|_| ()))?;
    if !committed.dry_run {
        service::apply_config(runner, &conf, &s.log)?;
    }
    Ok(committed)
}

fn add_site(s: &mut Session<'_>) -> Result<Flow> {
    let domain = ask_validated(&mut *s.prompter, "Domain (e.g. example.com)", None, validate::domain)?;
    let include_www = s
        .prompter
        .confirm(&format!("Also serve www.{domain}?"), true)?;
    let req = SiteRequest {
        domain: domain.clone(),
        include_www,
    };
    let paths = paths(s);

    let wanted = site::server_block(&req, &paths, &s.settings.rate_limit);
    if let Ok(existing) = fs::read_to_string(paths.site_file(&domain))
        && existing != wanted
        && !s
            .prompter
            .confirm(&format!("{domain} already has a different config. Overwrite it?"), false)?
    {
        ui::info("Cancelled");
        return Ok(Flow::Continue);
    }

    // The server block uses zones from conf.d, which nginx.conf must include
    let include = hardening::plan(
        &paths.conf,
        &[hardening::conf_d_include(&paths)],
        s.settings.nginx.indent,
    )?;
    let mut tx = Transaction::new(s.dry_run(), s.settings.nginx.backups_kept);
    let include_changed = tx.reconciled(&paths.conf, &include)?;
    let plan = site::stage(&mut tx, &req, &paths, &s.settings.rate_limit)?;
    if plan.is_noop() && !include_changed {
        ui::success(&format!("{domain} is already configured"));
        return Ok(Flow::Continue);
    }

    let committed = commit_and_reload(s, tx)?;
    if committed.dry_run {
        return Ok(Flow::Continue);
    }

    s.state.mark_site(&domain);
    s.log.record(&format!("site added: {domain}"));
    s.save_state();
    ui::success(&format!("Site {domain} is live on port 80"));
    ui::kv("config", &paths.site_file(&domain).display().to_string());
    ui::kv("document root", &paths.document_root(&domain).display().to_string());

    if s
        .prompter
        .confirm(&format!("Obtain a TLS certificate for {domain} now?"), false)?
    {
        request_certificate(s, &domain, include_www)?;
    }
    Ok(Flow::Continue)
}

fn obtain_certificate(s: &mut Session<'_>) -> Result<Flow> {
    let default = s.state.sites.last().cloned();
    let domain = ask_validated(&mut *s.prompter, "Domain", default.as_deref(), validate::domain)?;
    if !paths(s).site_file(&domain).exists() {
        bail!("No site is configured for {domain}; add it first (option 5)");
    }
    let include_www = s
        .prompter
        .confirm(&format!("Include www.{domain}?"), true)?;
    request_certificate(s, &domain, include_www)?;
    Ok(Flow::Continue)
}

fn request_certificate(s: &mut Session<'_>, domain: &str, include_www: bool) -> Result<()> {
    let email = ask_validated(
        &mut *s.prompter,
        "Email for expiry notices",
        None,
        validate::email,
    )?;
    let req = CertRequest {
        domain: domain.to_string(),
        include_www,
        email,
    };
    match tls::obtain(s.runner, &req, &s.log)? {
        CertOutcome::Issued => {
            s.state.mark_certificate(domain);
            s.save_state();
            ui::success(&format!("HTTPS enabled for {}", req.domains().join(", ")));
        }
        CertOutcome::Failed(_) => {}
    }
    Ok(())
}

fn renew_certificates(s: &mut Session<'_>) -> Result<Flow> {
    if !s.runner.exists("certbot") {
        bail!("certbot is not installed; run option 1 first");
    }
    if tls::renew_dry_run(s.runner)? {
        ui::success("Renewal simulation succeeded");
    } else {
        ui::warn("Renewal simulation failed; see certbot output above");
    }
    Ok(Flow::Continue)
}

fn test_configuration(s: &mut Session<'_>) -> Result<Flow> {
    let output = service::test_config(s.runner, &s.settings.nginx.conf)?;
    for line in output.lines() {
        ui::dim(line);
    }
    ui::success("Configuration is valid");
    Ok(Flow::Continue)
}

fn service_control(s: &mut Session<'_>) -> Result<Flow> {
    let items: Vec<String> = ServiceAction::ALL.iter().map(ToString::to_string).collect();
    let idx = s.prompter.select("Action", &items)?;
    let action = ServiceAction::ALL[idx];
    service::control(s.runner, action, &s.settings.nginx.conf, &s.log)?;
    if action != ServiceAction::Status {
        ui::success(&format!("nginx {action} done"));
    }
    Ok(Flow::Continue)
}

fn show_status(s: &mut Session<'_>) -> Result<Flow> {
    let paths = paths(s);

    ui::section("nginx");
    let installed = install::is_installed(s.runner);
    match install::version(s.runner) {
        Some(v) if installed => ui::kv("version", &v),
        _ => ui::kv("version", if installed { "unknown" } else { "not installed" }),
    }
    if installed {
        let active = service::is_active(s.runner);
        ui::kv("service", if active { "active" } else { "inactive" });
        let config = match service::test_config(s.runner, &paths.conf) {
            Ok(_) => "valid",
            Err(_) => "INVALID (option 8 shows details)",
        };
        ui::kv("config", config);
    }

    ui::section("Firewall");
    if s.runner.exists("ufw") {
        let fw = firewall::status(s.runner)?;
        ui::kv("ufw", if fw.active { "active" } else { "inactive" });
        for (target, action) in &fw.rules {
            ui::kv(target, action);
        }
    } else {
        ui::kv("ufw", "not installed");
    }

    ui::section("Sites");
    let sites = site::list(&paths)?;
    if sites.is_empty() {
        ui::dim("none");
    }
    for site in &sites {
        ui::kv(&site.name, if site.enabled { "enabled" } else { "disabled" });
    }

    ui::section("Certificates");
    let certs = tls::certificates(s.runner)?;
    if certs.is_empty() {
        ui::dim("none");
    }
    for cert in &certs {
        ui::kv(&cert.name, &cert.expiry);
    }

    if let Some(run) = s.state.last_run() {
        ui::section("Last change");
        ui::kv(
            &run.action,
            &format!(
                "{} ({} inserted, {} replaced, {} removed)",
                run.at.format("%Y-%m-%d %H:%M UTC"),
                run.inserted,
                run.replaced,
                run.removed
            ),
        );
    }

    let tail = s.log.tail(5);
    if let Some(path) = s.log.path()
        && !tail.is_empty()
    {
        ui::section(&format!("Install log ({})", path.display()));
        for line in &tail {
            ui::dim(line);
        }
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::settings_under;
    use crate::nginx::hardening::STOCK_CONF;
    use crate::nginx::transaction::backups_of;
    use crate::prompt::testing::ScriptedPrompter;
    use crate::runner::testing::FakeRunner;
    use regex::Regex;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Settings) {
        let dir = TempDir::new().unwrap();
        let settings = settings_under(dir.path());
        fs::write(&settings.nginx.conf, STOCK_CONF).unwrap();
        (dir, settings)
    }

    #[test]
    fn menu_has_every_operation() {
        let m = menu();
        let keys: Vec<_> = m.items().iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);
        assert_eq!(m.find("3").unwrap().label, "Apply security hardening");
    }

    #[test]
    fn hardening_writes_backs_up_and_reloads() {
        let (_dir, settings) = setup();
        let conf = settings.nginx.conf.clone();
        let conf_d = settings.nginx.conf_d.clone();
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::new(["y"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        assert_eq!(security_hardening(&mut s).unwrap(), Flow::Continue);

        let text = fs::read_to_string(&conf).unwrap();
        assert!(text.contains("\tserver_tokens off;\n"));
        assert!(conf_d.join("security-headers.conf").exists());
        assert!(conf_d.join("rate-limits.conf").exists());
        assert_eq!(backups_of(&conf).len(), 1);
        assert!(runner.called("nginx -t -c"));
        assert!(runner.called("systemctl reload nginx"));

        let run = s.state.last_run().unwrap();
        assert_eq!(run.action, "security hardening");
        assert!(run.backup.is_some());
    }

    #[test]
    fn second_hardening_run_changes_nothing() {
        let (_dir, settings) = setup();
        let conf = settings.nginx.conf.clone();
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::new(["y"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        security_hardening(&mut s).unwrap();
        let after_first = fs::read_to_string(&conf).unwrap();
        let reloads = runner.count("systemctl reload");

        // No confirmation is asked for when nothing would change
        security_hardening(&mut s).unwrap();
        assert_eq!(fs::read_to_string(&conf).unwrap(), after_first);
        assert_eq!(runner.count("systemctl reload"), reloads);
        assert_eq!(backups_of(&conf).len(), 1);
    }

    #[test]
    fn failed_config_test_restores_files() {
        let (_dir, settings) = setup();
        let conf = settings.nginx.conf.clone();
        let conf_d = settings.nginx.conf_d.clone();
        let runner = FakeRunner::new().fail("nginx -t", "nginx: [emerg] invalid number of arguments");
        let mut prompter = ScriptedPrompter::new(["y"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        let err = security_hardening(&mut s).unwrap_err();
        assert!(err.to_string().contains("configuration test failed"));
        assert_eq!(fs::read_to_string(&conf).unwrap(), STOCK_CONF);
        assert!(!conf_d.join("rate-limits.conf").exists());
        assert!(!runner.called("systemctl reload"));
        assert!(s.state.runs.is_empty());
    }

    #[test]
    fn declining_writes_nothing() {
        let (_dir, settings) = setup();
        let conf = settings.nginx.conf.clone();
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::new(["n"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        optimize_performance(&mut s).unwrap();
        assert_eq!(fs::read_to_string(&conf).unwrap(), STOCK_CONF);
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn dry_run_previews_only() {
        let (_dir, settings) = setup();
        let conf = settings.nginx.conf.clone();
        let fake = FakeRunner::new();
        let dry = DryRun::new(&fake);
        let mut prompter = ScriptedPrompter::default();
        let mut s = Session::new(settings, &dry, &mut prompter);

        security_hardening(&mut s).unwrap();
        assert_eq!(fs::read_to_string(&conf).unwrap(), STOCK_CONF);
        assert!(backups_of(&conf).is_empty());
        assert!(fake.calls.borrow().is_empty());
    }

    #[test]
    fn add_site_provisions_and_records() {
        let (_dir, settings) = setup();
        let paths = NginxPaths::from_settings(&settings.nginx);
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::new(["not a domain", "Example.com", "y", "n"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        add_site(&mut s).unwrap();

        let config = fs::read_to_string(paths.site_file("example.com")).unwrap();
        assert!(config.contains("server_name example.com www.example.com;"));
        assert!(paths.site_link("example.com").is_symlink());
        assert!(paths.document_root("example.com").join("index.html").exists());
        assert_eq!(s.state.sites, vec!["example.com"]);
        assert!(runner.called("systemctl reload nginx"));
        assert!(!runner.called("certbot"));
    }

    #[test]
    fn new_site_on_fresh_host_has_its_zones_defined() {
        let (_dir, settings) = setup();
        let paths = NginxPaths::from_settings(&settings.nginx);
        let stripped: String = STOCK_CONF
            .lines()
            .filter(|l| !l.contains("conf.d"))
            .map(|l| format!("{l}\n"))
            .collect();
        fs::write(&paths.conf, stripped).unwrap();
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::new(["example.com", "n", "n"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        add_site(&mut s).unwrap();

        let site = fs::read_to_string(paths.site_file("example.com")).unwrap();
        let defined = fs::read_to_string(snippets::rate_limits_path(&paths)).unwrap();
        let zone = Regex::new(r"zone=(\w+)").unwrap();
        let conn = Regex::new(r"limit_conn (\w+)").unwrap();
        let used: Vec<String> = zone
            .captures_iter(&site)
            .chain(conn.captures_iter(&site))
            .map(|c| c[1].to_string())
            .collect();
        assert_eq!(used.len(), 2);
        for name in used {
            assert!(defined.contains(&format!("zone={name}:")), "{name} is not defined");
        }
        let conf = fs::read_to_string(&paths.conf).unwrap();
        assert!(conf.contains(&format!("include {};", paths.conf_d_glob())));
    }

    #[test]
    fn add_site_can_chain_certificate() {
        let (_dir, settings) = setup();
        let runner = FakeRunner::new();
        let mut prompter =
            ScriptedPrompter::new(["example.com", "n", "y", "ops@example.com"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        add_site(&mut s).unwrap();
        assert!(runner.called(
            "certbot --nginx -d example.com --non-interactive --agree-tos -m ops@example.com --redirect"
        ));
        assert_eq!(s.state.certificates, vec!["example.com"]);
    }

    #[test]
    fn certificate_failure_returns_to_menu() {
        let (_dir, settings) = setup();
        let paths = NginxPaths::from_settings(&settings.nginx);
        fs::create_dir_all(&paths.sites_available).unwrap();
        fs::write(paths.site_file("example.com"), "server {}\n").unwrap();

        let runner = FakeRunner::new().fail("certbot --nginx", "DNS problem: NXDOMAIN");
        let mut prompter = ScriptedPrompter::new(["example.com", "y", "ops@example.com"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        assert_eq!(obtain_certificate(&mut s).unwrap(), Flow::Continue);
        assert!(s.state.certificates.is_empty());
    }

    #[test]
    fn certificate_needs_a_site() {
        let (_dir, settings) = setup();
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::new(["example.com"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        let err = obtain_certificate(&mut s).unwrap_err();
        assert!(err.to_string().contains("add it first"));
        assert!(!runner.called("certbot"));
    }

    #[test]
    fn service_menu_reload_checks_config() {
        let (_dir, settings) = setup();
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::new(["3"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        service_control(&mut s).unwrap();
        let calls = runner.calls.borrow();
        assert!(calls[0].starts_with("nginx -t"));
        assert_eq!(calls[1], "systemctl reload nginx");
    }

    #[test]
    fn install_skips_when_present() {
        let (_dir, settings) = setup();
        let runner = FakeRunner::new();
        let mut prompter = ScriptedPrompter::default();
        let mut s = Session::new(settings, &runner, &mut prompter);

        install_nginx(&mut s).unwrap();
        assert!(!runner.called("apt-get"));
    }

    #[test]
    fn install_when_missing() {
        let (_dir, settings) = setup();
        let runner = FakeRunner::new().without("nginx");
        let mut prompter = ScriptedPrompter::new(["y"]);
        let mut s = Session::new(settings, &runner, &mut prompter);

        // The fake never makes nginx appear, so the post-install check fails
        assert!(install_nginx(&mut s).is_err());
        assert!(runner.called("apt-get install -y -q nginx"));
    }

    #[test]
    fn status_runs_without_error() {
        let (_dir, settings) = setup();
        let runner = FakeRunner::new().ok("ufw status", "Status: inactive\n");
        let mut prompter = ScriptedPrompter::default();
        let mut s = Session::new(settings, &runner, &mut prompter);
        assert_eq!(show_status(&mut s).unwrap(), Flow::Continue);
    }
}
