//! Operator input checks
//!
//! Each validator returns the normalized value or a message suitable for
//! re-prompting.

use regex::Regex;
use std::sync::LazyLock;

pub type Validation = std::result::Result<String, String>;

static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$")
        .expect("valid regex")
});

static GITHUB_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9]|-[A-Za-z0-9]){0,38}$").expect("valid regex")
});

static REPO_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("valid regex"));

/// Fully-qualified domain name, lowercased
pub fn domain(input: &str) -> Validation {
    let name = input.trim().trim_end_matches('.').to_ascii_lowercase();
    if name.is_empty() {
        return Err("Domain is required".to_string());
    }
    if name.len() > 253 {
        return Err("Domain is longer than 253 characters".to_string());
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(format!("'{name}' is not a fully-qualified domain (e.g. example.com)"));
    }
    if let Some(bad) = labels.iter().find(|l| !LABEL.is_match(l)) {
        return Err(format!("Invalid domain label '{bad}' in '{name}'"));
    }
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("Invalid top-level domain '{tld}'"));
    }
    Ok(name)
}

pub fn email(input: &str) -> Validation {
    let value = input.trim();
    if EMAIL.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(format!("'{value}' is not a valid email address"))
    }
}

/// Display name for `user.name`
pub fn person_name(input: &str) -> Validation {
    let value = input.trim();
    if value.is_empty() {
        return Err("Name is required".to_string());
    }
    if value.chars().any(char::is_control) {
        return Err("Name contains control characters".to_string());
    }
    Ok(value.to_string())
}

/// GitHub account name: alphanumerics and single hyphens, at most 39
pub fn github_username(input: &str) -> Validation {
    let value = input.trim();
    if GITHUB_USER.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(format!(
            "'{value}' is not a valid GitHub username (letters, digits and single hyphens)"
        ))
    }
}

/// Access token: any non-empty run of printable, non-space characters
pub fn token(input: &str) -> Validation {
    let value = input.trim();
    if value.is_empty() {
        return Err("Token is required".to_string());
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("Token must not contain whitespace".to_string());
    }
    if token_kind(value).is_none() {
        log::debug!("token has no known GitHub prefix");
    }
    Ok(value.to_string())
}

/// Recognized GitHub token families
pub fn token_kind(token: &str) -> Option<&'static str> {
    [
        ("github_pat_", "fine-grained personal access token"),
        ("ghp_", "personal access token"),
        ("gho_", "OAuth token"),
        ("ghu_", "user-to-server token"),
        ("ghs_", "server-to-server token"),
    ]
    .iter()
    .find(|(prefix, _)| token.starts_with(prefix))
    .map(|(_, kind)| *kind)
}

/// `owner/repo`, optionally given as a URL or with `.git`
pub fn repo_path(input: &str, host: &str) -> Validation {
    let mut value = input.trim();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = value.strip_prefix(prefix) {
            value = rest;
        }
    }
    if let Some(rest) = value.strip_prefix(host) {
        value = rest;
    }
    let value = value.trim_matches('/');
    let value = value.strip_suffix(".git").unwrap_or(value);

    let parts: Vec<&str> = value.split('/').collect();
    match parts.as_slice() {
        [owner, repo]
            if GITHUB_USER.is_match(owner)
                && REPO_PART.is_match(repo)
                && *repo != "."
                && *repo != ".." =>
        {
            Ok(format!("{owner}/{repo}"))
        }
        _ => Err(format!("'{}' is not a repository path (owner/repo)", input.trim())),
    }
}

/// Host name for credentials (no scheme, no path)
pub fn host(input: &str) -> Validation {
    let value = input.trim().to_ascii_lowercase();
    if value.contains("://") || value.contains('/') {
        return Err("Give the host name only (e.g. github.com)".to_string());
    }
    let (name, port) = match value.rsplit_once(':') {
        Some((name, port)) => (name.to_string(), Some(port)),
        None => (value.clone(), None),
    };
    if let Some(port) = port
        && port.parse::<u16>().is_err()
    {
        return Err(format!("Invalid port '{port}'"));
    }
    domain(&name).map(|_| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains() {
        assert_eq!(domain("Example.COM").unwrap(), "example.com");
        assert_eq!(domain("www.example.co.uk.").unwrap(), "www.example.co.uk");
        assert_eq!(domain("a-b.example.io").unwrap(), "a-b.example.io");

        assert!(domain("").is_err());
        assert!(domain("localhost").is_err());
        assert!(domain("-bad.example.com").is_err());
        assert!(domain("bad-.example.com").is_err());
        assert!(domain("exa_mple.com").is_err());
        assert!(domain("example.c0m").is_err());
        assert!(domain("example..com").is_err());
        assert!(domain(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn emails() {
        assert_eq!(email(" alice@example.com ").unwrap(), "alice@example.com");
        assert!(email("alice+git@mail.example.org").is_ok());
        assert!(email("alice").is_err());
        assert!(email("alice@localhost").is_err());
        assert!(email("a b@example.com").is_err());
    }

    #[test]
    fn usernames() {
        assert!(github_username("alice").is_ok());
        assert!(github_username("alice-dev42").is_ok());
        assert!(github_username("-alice").is_err());
        assert!(github_username("alice-").is_err());
        assert!(github_username("al--ice").is_err());
        assert!(github_username("al_ice").is_err());
        assert!(github_username(&"a".repeat(40)).is_err());
        assert!(github_username(&"a".repeat(39)).is_ok());
    }

    #[test]
    fn tokens() {
        assert_eq!(token("  ghp_abc123  ").unwrap(), "ghp_abc123");
        assert!(token("").is_err());
        assert!(token("ghp abc").is_err());
        assert_eq!(token_kind("github_pat_11AA"), Some("fine-grained personal access token"));
        assert_eq!(token_kind("ghp_x"), Some("personal access token"));
        assert_eq!(token_kind("plain"), None);
    }

    #[test]
    fn repo_paths() {
        assert_eq!(repo_path("acme/api", "github.com").unwrap(), "acme/api");
        assert_eq!(repo_path("acme/api.git", "github.com").unwrap(), "acme/api");
        assert_eq!(
            repo_path("https://github.com/acme/api.git", "github.com").unwrap(),
            "acme/api"
        );
        assert_eq!(repo_path("/acme/api/", "github.com").unwrap(), "acme/api");

        assert!(repo_path("acme", "github.com").is_err());
        assert!(repo_path("acme/api/tree", "github.com").is_err());
        assert!(repo_path("acme/..", "github.com").is_err());
        assert!(repo_path("", "github.com").is_err());
    }

    #[test]
    fn hosts() {
        assert_eq!(host("GitHub.com").unwrap(), "github.com");
        assert_eq!(host("git.example.com:8443").unwrap(), "git.example.com:8443");
        assert!(host("https://github.com").is_err());
        assert!(host("github.com/acme").is_err());
        assert!(host("git.example.com:http").is_err());
    }

    #[test]
    fn names() {
        assert_eq!(person_name("  Alice Doe ").unwrap(), "Alice Doe");
        assert!(person_name("").is_err());
    }
}
