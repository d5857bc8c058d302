//! Directives: single desired configuration facts

use crate::matcher::LineMatcher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target state of a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// The desired line must exist exactly once
    #[default]
    Present,
    /// No matching line may exist
    Absent,
}

/// Where to insert a directive that has no existing line.
///
/// Anchors are resolved against the document as it stands at insertion
/// time, including lines inserted earlier in the same pass.
#[derive(Debug, Clone)]
pub enum Anchor {
    /// Top of the document
    Start,
    /// Bottom of the document
    End,
    /// Right after the first line satisfying the matcher
    After(LineMatcher),
    /// Right after the line opening the named block (`http {`).
    ///
    /// On a document with no content the block is created.
    Block(String),
}

impl Anchor {
    pub fn after(text: impl Into<String>) -> Self {
        Self::After(LineMatcher::exact(text))
    }

    pub fn block(name: impl Into<String>) -> Self {
        Self::Block(name.into())
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start of document"),
            Self::End => write!(f, "end of document"),
            Self::After(m) => write!(f, "after {m}"),
            Self::Block(name) => write!(f, "'{name} {{' block"),
        }
    }
}

/// A single desired configuration fact.
#[derive(Debug, Clone)]
pub struct Directive {
    /// Label used in outcome reports
    pub name: String,
    /// Identifies existing lines representing this directive
    pub matcher: LineMatcher,
    /// Line content (without indentation) that should exist
    pub desired: String,
    /// Insertion point when nothing matches
    pub anchor: Anchor,
    /// Target state
    pub presence: Presence,
}

impl Directive {
    pub fn new(
        name: impl Into<String>,
        matcher: LineMatcher,
        desired: impl Into<String>,
        anchor: Anchor,
    ) -> Self {
        Self {
            name: name.into(),
            matcher,
            desired: desired.into(),
            anchor,
            presence: Presence::Present,
        }
    }

    /// An nginx-style `key value;` setting.
    ///
    /// Matches the key whether it is live or commented out, so a shipped
    /// `# server_tokens off;` is uncommented in place rather than duplicated.
    /// The anchor defaults to the end of the document.
    pub fn setting(key: &str, value: &str) -> Self {
        let desired = if value.is_empty() {
            format!("{key};")
        } else {
            format!("{key} {value};")
        };
        Self::new(key, LineMatcher::setting(key), desired, Anchor::End)
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Shorthand for `with_anchor(Anchor::Block(name))`.
    pub fn in_block(self, name: &str) -> Self {
        self.with_anchor(Anchor::block(name))
    }

    /// Mark the directive as one that must not exist.
    pub fn absent(mut self) -> Self {
        self.presence = Presence::Absent;
        self
    }

    pub fn is_present(&self) -> bool {
        self.presence == Presence::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_builds_desired_line() {
        let d = Directive::setting("server_tokens", "off");
        assert_eq!(d.name, "server_tokens");
        assert_eq!(d.desired, "server_tokens off;");
        assert!(d.is_present());
        assert!(matches!(d.anchor, Anchor::End));
    }

    #[test]
    fn setting_without_value() {
        let d = Directive::setting("tcp_nopush", "");
        assert_eq!(d.desired, "tcp_nopush;");
    }

    #[test]
    fn absent_and_anchor_builders() {
        let d = Directive::setting("autoindex", "on").in_block("http").absent();
        assert_eq!(d.presence, Presence::Absent);
        assert!(matches!(d.anchor, Anchor::Block(ref b) if b == "http"));
    }

    #[test]
    fn anchor_display() {
        assert_eq!(Anchor::block("http").to_string(), "'http {' block");
        assert_eq!(Anchor::after("events {").to_string(), "after \"events {\"");
        assert_eq!(Anchor::End.to_string(), "end of document");
    }
}
