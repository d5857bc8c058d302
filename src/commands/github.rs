//! GitHub credentials menu

use anyhow::Result;
use credstore::{CredentialEntry, CredentialStore, MaskedEntry, UpsertOutcome};

use super::Session;
use crate::Context as AppContext;
use crate::config::Settings;
use crate::github::{helper, identity};
use crate::menu::{Flow, Menu};
use crate::privilege::{HostFacts, Preconditions};
use crate::prompt::{TermPrompter, ask_secret_validated, ask_validated};
use crate::runner::SystemRunner;
use crate::ui;
use crate::validate;

pub fn run(ctx: &AppContext) -> Result<()> {
    let runner = SystemRunner;
    Preconditions::github().check(&HostFacts::detect(), &runner)?;

    let settings = Settings::discover(ctx.config.as_deref())?;
    if !ctx.quiet {
        ui::banner();
    }

    let mut prompter = TermPrompter;
    let mut session = Session::new(settings, &runner, &mut prompter);
    menu().run(&mut session)
}

pub fn menu<'a>() -> Menu<Session<'a>> {
    Menu::new("vpskit · github")
        .item("1", "Configure git identity", configure_identity)
        .item("2", "Add host-wide token", add_host_token)
        .item("3", "Add repository token", add_repository_token)
        .item("4", "Update token", update_token)
        .item("5", "List credentials", list_credentials)
        .item("6", "Remove credentials", remove_credentials)
        .item("7", "Show current configuration", show_configuration)
}

fn load_store(s: &Session<'_>) -> Result<CredentialStore> {
    Ok(CredentialStore::load(&s.settings.github.credential_path())?)
}

fn save_store(s: &mut Session<'_>, store: &CredentialStore) -> Result<()> {
    let path = s.settings.github.credential_path();
    store.save(&path)?;
    helper::ensure_store_helper(s.runner, &mut *s.prompter, &path)?;
    Ok(())
}

fn configure_identity(s: &mut Session<'_>) -> Result<Flow> {
    let current = identity::current(s.runner)?;
    let name = ask_validated(
        &mut *s.prompter,
        "Full name",
        current.name.as_deref(),
        validate::person_name,
    )?;
    let email = ask_validated(
        &mut *s.prompter,
        "Email",
        current.email.as_deref(),
        validate::email,
    )?;

    if identity::set(s.runner, &name, &email)? {
        ui::success(&format!("git identity set to {name} <{email}>"));
    } else {
        ui::info("git identity unchanged");
    }
    Ok(Flow::Continue)
}

fn ask_host(s: &mut Session<'_>) -> Result<String> {
    let default = s.settings.github.host.clone();
    ask_validated(&mut *s.prompter, "Host", Some(&default), validate::host)
}

fn ask_username(s: &mut Session<'_>) -> Result<String> {
    ask_validated(&mut *s.prompter, "Username", None, validate::github_username)
}

/// Hidden token input; `None` when an unrecognised token is declined
fn ask_token(s: &mut Session<'_>) -> Result<Option<String>> {
    let token = ask_secret_validated(&mut *s.prompter, "Access token", validate::token)?;
    match validate::token_kind(&token) {
        Some(kind) => {
            ui::dim(&format!("looks like a {kind}"));
            Ok(Some(token))
        }
        None => {
            ui::warn("This does not look like a GitHub token");
            let keep = s.prompter.confirm("Store it anyway?", false)?;
            Ok(keep.then_some(token))
        }
    }
}

fn store_entry(s: &mut Session<'_>, entry: CredentialEntry) -> Result<()> {
    let mut store = load_store(s)?;
    let shown = entry.masked();
    let outcome = store.upsert(entry);
    save_store(s, &store)?;
    match outcome {
        UpsertOutcome::Added => ui::success(&format!("Stored {shown}")),
        UpsertOutcome::Replaced => ui::success(&format!("Replaced {shown}")),
    }
    Ok(())
}

fn add_host_token(s: &mut Session<'_>) -> Result<Flow> {
    let host = ask_host(s)?;
    let username = ask_username(s)?;
    let Some(token) = ask_token(s)? else {
        ui::info("Cancelled");
        return Ok(Flow::Continue);
    };

    store_entry(s, CredentialEntry::host_wide(&username, &token, &host)?)?;
    ui::dim(&format!("used for every repository on {host} without its own token"));
    Ok(Flow::Continue)
}

fn add_repository_token(s: &mut Session<'_>) -> Result<Flow> {
    let host = ask_host(s)?;
    let username = ask_username(s)?;
    let repo = ask_validated(
        &mut *s.prompter,
        "Repository (owner/repo or URL)",
        None,
        |input: &str| validate::repo_path(input, &host),
    )?;
    let Some(token) = ask_token(s)? else {
        ui::info("Cancelled");
        return Ok(Flow::Continue);
    };

    let path = helper::store_path(&repo);
    store_entry(s, CredentialEntry::for_repository(&username, &token, &host, &path)?)?;
    helper::enable_path_scoping(s.runner, &host, &repo)?;
    ui::dim(&format!("clone with https://{host}/{path} so git picks this token"));
    Ok(Flow::Continue)
}

fn pick_entry(s: &mut Session<'_>, prompt: &str, entries: &[MaskedEntry]) -> Result<usize> {
    let items: Vec<String> = entries.iter().map(ToString::to_string).collect();
    s.prompter.select(prompt, &items)
}

fn update_token(s: &mut Session<'_>) -> Result<Flow> {
    let entries = load_store(s)?.list();
    if entries.is_empty() {
        ui::info("No credentials stored yet (options 2 and 3 add one)");
        return Ok(Flow::Continue);
    }
    let chosen = entries[pick_entry(s, "Credential to update", &entries)?].clone();
    let Some(token) = ask_token(s)? else {
        ui::info("Cancelled");
        return Ok(Flow::Continue);
    };

    let entry = CredentialEntry::new(
        &chosen.scheme,
        &chosen.username,
        &token,
        &chosen.host,
        chosen.path.as_deref(),
    )?;
    store_entry(s, entry)?;
    Ok(Flow::Continue)
}

fn list_credentials(s: &mut Session<'_>) -> Result<Flow> {
    let store = load_store(s)?;
    ui::section(&format!(
        "Credentials in {}",
        s.settings.github.credential_path().display()
    ));
    if store.is_empty() {
        ui::dim("none");
    }
    for entry in store.list() {
        ui::kv(&entry.scope().to_string(), &entry.to_string());
    }
    let invalid = store.invalid_lines().len();
    if invalid > 0 {
        ui::warn(&format!("{invalid} line(s) could not be parsed and are kept as-is"));
    }
    Ok(Flow::Continue)
}

fn remove_credentials(s: &mut Session<'_>) -> Result<Flow> {
    let mut store = load_store(s)?;
    let entries = store.list();
    if entries.is_empty() {
        ui::info("No credentials stored");
        return Ok(Flow::Continue);
    }

    let mut items: Vec<String> = entries.iter().map(ToString::to_string).collect();
    items.push("All credentials for a user".to_string());
    let idx = s.prompter.select("Remove", &items)?;

    let removed: Vec<MaskedEntry> = if idx == entries.len() {
        let username = ask_username(s)?;
        let doomed: Vec<MaskedEntry> = entries
            .iter()
            .filter(|e| e.username == username)
            .cloned()
            .collect();
        if doomed.is_empty() {
            ui::info(&format!("No credentials stored for {username}"));
            return Ok(Flow::Continue);
        }
        if !s.prompter.confirm(
            &format!("Remove {} credential(s) for {username}?", doomed.len()),
            false,
        )? {
            ui::info("Cancelled");
            return Ok(Flow::Continue);
        }
        store.remove_user(&username);
        doomed
    } else {
        let entry = entries[idx].clone();
        if !s.prompter.confirm(&format!("Remove {entry}?"), false)? {
            ui::info("Cancelled");
            return Ok(Flow::Continue);
        }
        store.remove_scoped(&entry.username, &entry.host, entry.path.as_deref());
        vec![entry]
    };

    save_store(s, &store)?;

    // Drop path scoping once no one holds a token for that repository
    for entry in &removed {
        if let Some(path) = &entry.path {
            let still_used = store
                .entries()
                .any(|e| e.host == entry.host && e.path.as_ref() == Some(path));
            if !still_used {
                helper::disable_path_scoping(s.runner, &entry.host, path)?;
            }
        }
    }
    ui::success(&format!("Removed {} credential(s)", removed.len()));
    Ok(Flow::Continue)
}

fn show_configuration(s: &mut Session<'_>) -> Result<Flow> {
    let id = identity::current(s.runner)?;
    ui::section("Identity");
    ui::kv("user.name", id.name.as_deref().unwrap_or("(not set)"));
    ui::kv("user.email", id.email.as_deref().unwrap_or("(not set)"));

    ui::section("Credential helper");
    let helper_value = identity::get_global(s.runner, "credential.helper")?;
    ui::kv(
        "credential.helper",
        helper_value.as_deref().unwrap_or("(not set)"),
    );

    let store = load_store(s)?;
    let path = s.settings.github.credential_path();
    ui::kv(
        "store",
        &format!("{} ({} credential(s))", path.display(), store.len()),
    );
    let expected = helper::helper_value(&path);
    if helper_value.as_deref() != Some(expected.as_str()) && !store.is_empty() {
        ui::warn("git is not reading this store; adding a token fixes the helper");
    }
    Ok(Flow::Continue)
}
