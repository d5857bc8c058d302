//! Line match rules

use crate::error::{ReconcileError, Result};
use regex::Regex;
use std::fmt;

/// Predicate identifying the line(s) that represent a directive.
#[derive(Debug, Clone)]
pub enum LineMatcher {
    /// Line equals the text, ignoring surrounding whitespace
    Exact(String),
    /// Line matches the regular expression
    Regex(Regex),
    /// Line sets `key`, live (`key value;`) or commented out (`# key value;`)
    Setting(String),
}

impl LineMatcher {
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    /// Compile a regex matcher.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|source| ReconcileError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn setting(key: impl Into<String>) -> Self {
        Self::Setting(key.into())
    }

    /// Check whether `line` satisfies this matcher.
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Exact(text) => line.trim() == text.trim(),
            Self::Regex(re) => re.is_match(line),
            Self::Setting(key) => setting_key(line) == Some(key.as_str()),
        }
    }
}

impl fmt::Display for LineMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => write!(f, "\"{}\"", text.trim()),
            Self::Regex(re) => write!(f, "/{}/", re.as_str()),
            Self::Setting(key) => write!(f, "setting '{key}'"),
        }
    }
}

/// Extract the directive name a config line sets, if any.
///
/// Leading comment markers are skipped so `#gzip on;` and `# gzip on;`
/// both report `gzip`. A commented line only counts when it ends in `;`,
/// which keeps prose comments like `# gzip settings` out.
pub(crate) fn setting_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let body = trimmed.trim_start_matches('#').trim_start();
    if body.len() < trimmed.len() && !body.trim_end().ends_with(';') {
        return None;
    }
    let end = body
        .find(|c: char| c.is_whitespace() || c == ';')
        .unwrap_or(body.len());
    let key = &body[..end];
    if key.is_empty() { None } else { Some(key) }
}

/// Leading whitespace of a line.
pub(crate) fn indentation(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Line content before any `#` comment, trimmed.
pub(crate) fn code_part(line: &str) -> &str {
    line.split_once('#').map_or(line, |(code, _)| code).trim()
}

/// Whether `line` opens the block `name { ... }` on the same line.
pub(crate) fn opens_block(line: &str, name: &str) -> bool {
    let code = code_part(line);
    let Some(rest) = code.strip_prefix(name) else {
        return false;
    };
    (rest.starts_with('{') || rest.starts_with(char::is_whitespace)) && rest.ends_with('{')
}
