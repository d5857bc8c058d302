//! The reconciliation pass

use crate::directive::{Anchor, Directive, Presence};
use crate::document::ConfigDocument;
use crate::error::{ReconcileError, Result};
use crate::matcher::{code_part, indentation, opens_block};
use serde::{Deserialize, Serialize};

/// What happened to one directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Desired line added at the anchor
    Inserted,
    /// Existing line rewritten in place (duplicates dropped)
    Replaced,
    /// Matching line(s) deleted
    Removed,
    /// Already in the desired state
    Unchanged,
}

impl Outcome {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Outcome for a named directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveOutcome {
    pub name: String,
    pub outcome: Outcome,
}

/// Counts per outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ReconcileSummary {
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Replaced => self.replaced += 1,
            Outcome::Removed => self.removed += 1,
            Outcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Number of directives that changed the document
    pub fn total_changes(&self) -> usize {
        self.inserted + self.replaced + self.removed
    }

    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged
    }
}

/// New document plus per-directive outcomes
#[derive(Debug, Clone)]
pub struct ReconciliationResult {
    pub document: ConfigDocument,
    pub outcomes: Vec<DirectiveOutcome>,
}

impl ReconciliationResult {
    pub fn summary(&self) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for o in &self.outcomes {
            summary.add(o.outcome);
        }
        summary
    }

    /// True when every directive was already satisfied
    pub fn is_unchanged(&self) -> bool {
        self.outcomes.iter().all(|o| !o.outcome.is_change())
    }

    /// Outcomes that modified the document
    pub fn changed(&self) -> impl Iterator<Item = &DirectiveOutcome> {
        self.outcomes.iter().filter(|o| o.outcome.is_change())
    }

    pub fn text(&self) -> String {
        self.document.render()
    }
}

/// Tuning for how inserted lines are laid out
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// One level of indentation inside a block
    pub indent_unit: String,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            indent_unit: "    ".to_string(),
        }
    }
}

/// Reconcile `document` against `directives` with default options.
///
/// See [`reconcile_with`].
pub fn reconcile(
    document: &ConfigDocument,
    directives: &[Directive],
) -> Result<ReconciliationResult> {
    reconcile_with(document, directives, &ReconcileOptions::default())
}

/// Produce a document in which every directive holds.
///
/// Directives are applied in order against the evolving document.
/// Insertions sharing an anchor land directly below it in directive
/// order. The input is never modified; on error nothing is returned but
/// the error.
pub fn reconcile_with(
    document: &ConfigDocument,
    directives: &[Directive],
    opts: &ReconcileOptions,
) -> Result<ReconciliationResult> {
    let mut pass = Pass::new(document, opts);
    let mut outcomes = Vec::with_capacity(directives.len());

    for directive in directives {
        let outcome = pass.apply(directive)?;
        log::debug!("{}: {:?}", directive.name, outcome);
        outcomes.push(DirectiveOutcome {
            name: directive.name.clone(),
            outcome,
        });
    }

    pass.verify(directives)?;

    Ok(ReconciliationResult {
        document: document.with_lines(pass.lines),
        outcomes,
    })
}

/// Working state of one reconciliation pass
struct Pass<'a> {
    lines: Vec<String>,
    /// Parallel to `lines`: inserted during this pass
    fresh: Vec<bool>,
    blank: bool,
    opts: &'a ReconcileOptions,
}

impl<'a> Pass<'a> {
    fn new(document: &ConfigDocument, opts: &'a ReconcileOptions) -> Self {
        let lines = document.lines().to_vec();
        Self {
            fresh: vec![false; lines.len()],
            blank: document.is_blank(),
            lines,
            opts,
        }
    }

    fn apply(&mut self, directive: &Directive) -> Result<Outcome> {
        let matches: Vec<usize> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| directive.matcher.matches(line))
            .map(|(i, _)| i)
            .collect();

        match directive.presence {
            Presence::Present => {
                if !directive.matcher.matches(directive.desired.trim_start()) {
                    return Err(ReconcileError::NonConvergent {
                        directive: directive.name.clone(),
                        desired: directive.desired.clone(),
                    });
                }

                let Some((&first, duplicates)) = matches.split_first() else {
                    self.insert(directive)?;
                    return Ok(Outcome::Inserted);
                };

                let rendered = format!(
                    "{}{}",
                    indentation(&self.lines[first]),
                    directive.desired.trim_start()
                );
                let mut changed = false;
                if self.lines[first] != rendered {
                    self.lines[first] = rendered;
                    changed = true;
                }
                for &idx in duplicates.iter().rev() {
                    self.remove(idx);
                    changed = true;
                }

                Ok(if changed {
                    Outcome::Replaced
                } else {
                    Outcome::Unchanged
                })
            }
            Presence::Absent => {
                if matches.is_empty() {
                    return Ok(Outcome::Unchanged);
                }
                for &idx in matches.iter().rev() {
                    self.remove(idx);
                }
                Ok(Outcome::Removed)
            }
        }
    }

    fn insert(&mut self, directive: &Directive) -> Result<()> {
        let anchor_idx = match &directive.anchor {
            Anchor::Start => None,
            Anchor::End => {
                let at = self.lines.len();
                self.push_line(at, directive.desired.trim_start().to_string(), true);
                return Ok(());
            }
            Anchor::After(matcher) => Some(
                self.lines
                    .iter()
                    .position(|l| matcher.matches(l))
                    .ok_or_else(|| anchor_missing(directive))?,
            ),
            Anchor::Block(name) => Some(match self.find_block(name) {
                Some(idx) => idx,
                None if self.blank => self.open_block(name),
                None => return Err(anchor_missing(directive)),
            }),
        };

        let (at, indent) = match anchor_idx {
            None => (self.skip_fresh(0), String::new()),
            Some(idx) => (self.skip_fresh(idx + 1), self.child_indent(idx)),
        };
        let line = format!("{indent}{}", directive.desired.trim_start());
        self.push_line(at, line, true);
        Ok(())
    }

    /// Index of the first line at or after `idx` not inserted this pass.
    fn skip_fresh(&self, mut idx: usize) -> usize {
        while idx < self.lines.len() && self.fresh[idx] {
            idx += 1;
        }
        idx
    }

    /// Indentation for a line placed directly below `idx`.
    fn child_indent(&self, idx: usize) -> String {
        let line = &self.lines[idx];
        let base = indentation(line);
        if code_part(line).ends_with('{') {
            format!("{base}{}", self.opts.indent_unit)
        } else {
            base.to_string()
        }
    }

    fn find_block(&self, name: &str) -> Option<usize> {
        self.lines.iter().position(|l| opens_block(l, name))
    }

    /// Append an empty `name { }` block, returning the opener's index.
    fn open_block(&mut self, name: &str) -> usize {
        let at = self.lines.len();
        self.push_line(at, format!("{name} {{"), false);
        self.push_line(at + 1, "}".to_string(), false);
        self.blank = false;
        at
    }

    fn push_line(&mut self, at: usize, line: String, fresh: bool) {
        self.lines.insert(at, line);
        self.fresh.insert(at, fresh);
    }

    fn remove(&mut self, idx: usize) {
        self.lines.remove(idx);
        self.fresh.remove(idx);
    }

    /// Every directive must hold at the end of the pass, otherwise a
    /// re-run would keep editing the file.
    fn verify(&self, directives: &[Directive]) -> Result<()> {
        for directive in directives {
            let mut hits = self.lines.iter().filter(|l| directive.matcher.matches(l));
            let reason = match directive.presence {
                Presence::Present => {
                    let first = hits.next();
                    let extra = hits.count();
                    match first {
                        None => Some("desired line was removed by a later directive".to_string()),
                        Some(_) if extra > 0 => {
                            Some(format!("{} lines match, expected one", extra + 1))
                        }
                        Some(line) if line.trim_start() != directive.desired.trim_start() => {
                            Some(format!("line rewritten by a later directive: {}", line.trim()))
                        }
                        Some(_) => None,
                    }
                }
                Presence::Absent => {
                    let count = hits.count();
                    (count > 0).then(|| format!("{count} matching line(s) remain"))
                }
            };
            if let Some(reason) = reason {
                return Err(ReconcileError::Conflict {
                    directive: directive.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

fn anchor_missing(directive: &Directive) -> ReconcileError {
    ReconcileError::AnchorNotFound {
        directive: directive.name.clone(),
        anchor: directive.anchor.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::LineMatcher;

    const NGINX_CONF: &str = "\
user www-data;
worker_processes auto;

events {
\tworker_connections 768;
}

http {
\tsendfile on;
\t# server_tokens off;

\tinclude /etc/nginx/conf.d/*.conf;
\tinclude /etc/nginx/sites-enabled/*;
}
";

    fn run(text: &str, directives: &[Directive]) -> ReconciliationResult {
        reconcile(&ConfigDocument::parse(text), directives).unwrap()
    }

    fn hardening() -> Vec<Directive> {
        vec![
            Directive::setting("server_tokens", "off").in_block("http"),
            Directive::setting("client_max_body_size", "10m").in_block("http"),
            Directive::setting("autoindex", "on").in_block("http").absent(),
            Directive::setting("worker_connections", "1024").in_block("events"),
        ]
    }

    #[test]
    fn empty_document_gets_block_and_line() {
        let d = Directive::setting("server_tokens", "off").in_block("http");
        let result = run("", &[d]);

        assert_eq!(result.outcomes[0].outcome, Outcome::Inserted);
        let lines = result.document.lines();
        let anchor = lines.iter().position(|l| l == "http {").unwrap();
        assert_eq!(lines[anchor + 1], "    server_tokens off;");
        assert_eq!(result.text(), "http {\n    server_tokens off;\n}\n");
    }

    #[test]
    fn existing_value_is_replaced_in_place() {
        let text = "http {\n    sendfile on;\n    server_tokens on;\n    keepalive_timeout 65;\n}\n";
        let d = Directive::setting("server_tokens", "off").in_block("http");
        let result = run(text, &[d]);

        assert_eq!(result.outcomes[0].outcome, Outcome::Replaced);
        assert_eq!(
            result.text(),
            "http {\n    sendfile on;\n    server_tokens off;\n    keepalive_timeout 65;\n}\n"
        );
    }

    #[test]
    fn commented_default_is_uncommented_with_its_indentation() {
        let result = run(NGINX_CONF, &hardening());
        assert!(result.text().contains("\tserver_tokens off;\n"));
        assert!(!result.text().contains("# server_tokens"));
        assert!(result.text().contains("\tworker_connections 1024;\n"));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let first = run(NGINX_CONF, &hardening());
        assert!(!first.is_unchanged());

        let second = reconcile(&first.document, &hardening()).unwrap();
        assert!(second.is_unchanged());
        assert_eq!(second.text(), first.text());
        assert_eq!(second.summary().unchanged, 4);
    }

    #[test]
    fn idempotent_from_empty_document() {
        let first = run("", &hardening()[..3]);
        let second = reconcile(&first.document, &hardening()[..3]).unwrap();
        assert!(second.is_unchanged());
        assert_eq!(first.text(), second.text());
    }

    #[test]
    fn unrelated_lines_survive_in_order() {
        let result = run(NGINX_CONF, &hardening());
        let directives = hardening();
        let kept: Vec<&str> = NGINX_CONF
            .lines()
            .filter(|l| !directives.iter().any(|d| d.matcher.matches(l)))
            .collect();
        let out: Vec<&str> = result
            .document
            .lines()
            .iter()
            .map(String::as_str)
            .filter(|l| kept.contains(l))
            .collect();
        assert_eq!(out, kept);
    }

    #[test]
    fn shared_anchor_keeps_directive_order() {
        let text = "http {\n}\n";
        let directives = vec![
            Directive::setting("a", "1").in_block("http"),
            Directive::setting("b", "2").in_block("http"),
            Directive::setting("c", "3").in_block("http"),
        ];
        let result = run(text, &directives);
        assert_eq!(result.text(), "http {\n    a 1;\n    b 2;\n    c 3;\n}\n");
    }

    #[test]
    fn start_anchor_keeps_directive_order() {
        let directives = vec![
            Directive::new("one", LineMatcher::exact("# one"), "# one", Anchor::Start),
            Directive::new("two", LineMatcher::exact("# two"), "# two", Anchor::Start),
        ];
        let result = run("body\n", &directives);
        assert_eq!(result.text(), "# one\n# two\nbody\n");
    }

    #[test]
    fn after_anchor_uses_anchor_indentation() {
        let text = "http {\n    include mime.types;\n}\n";
        let d = Directive::new(
            "default_type",
            LineMatcher::setting("default_type"),
            "default_type application/octet-stream;",
            Anchor::after("include mime.types;"),
        );
        let result = run(text, &[d]);
        assert_eq!(
            result.text(),
            "http {\n    include mime.types;\n    default_type application/octet-stream;\n}\n"
        );
    }

    #[test]
    fn missing_anchor_is_an_error() {
        let d = Directive::setting("server_tokens", "off").in_block("http");
        let err = reconcile(&ConfigDocument::parse("events {\n}\n"), &[d]).unwrap_err();
        match err {
            ReconcileError::AnchorNotFound { directive, anchor } => {
                assert_eq!(directive, "server_tokens");
                assert_eq!(anchor, "'http {' block");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_anchor_not_needed_when_line_exists() {
        let d = Directive::setting("server_tokens", "off").in_block("http");
        let result = run("server_tokens on;\n", &[d]);
        assert_eq!(result.text(), "server_tokens off;\n");
    }

    #[test]
    fn absent_removes_every_match() {
        let text = "http {\n    autoindex on;\n    root /srv;\n    # autoindex off;\n}\n";
        let d = Directive::setting("autoindex", "on").absent();
        let result = run(text, &[d]);
        assert_eq!(result.outcomes[0].outcome, Outcome::Removed);
        assert_eq!(result.text(), "http {\n    root /srv;\n}\n");
    }

    #[test]
    fn absent_without_match_is_unchanged() {
        let d = Directive::setting("autoindex", "on").absent();
        let result = run("http {\n}\n", &[d]);
        assert!(result.is_unchanged());
    }

    #[test]
    fn duplicates_collapse_to_one_line() {
        let text = "http {\n    gzip on;\n    gzip off;\n}\n";
        let result = run(text, &[Directive::setting("gzip", "on")]);
        assert_eq!(result.outcomes[0].outcome, Outcome::Replaced);
        assert_eq!(result.text(), "http {\n    gzip on;\n}\n");
    }

    #[test]
    fn non_convergent_directive_is_rejected() {
        let d = Directive::new(
            "bad",
            LineMatcher::exact("gzip on;"),
            "gzip off;",
            Anchor::End,
        );
        let err = reconcile(&ConfigDocument::parse(""), &[d]).unwrap_err();
        assert!(matches!(err, ReconcileError::NonConvergent { .. }));
    }

    #[test]
    fn conflicting_directives_are_reported() {
        let directives = vec![
            Directive::setting("gzip", "on"),
            Directive::setting("gzip", "off").absent(),
        ];
        let err = reconcile(&ConfigDocument::parse("x\n"), &directives).unwrap_err();
        assert!(matches!(err, ReconcileError::Conflict { ref directive, .. } if directive == "gzip"));
    }

    #[test]
    fn input_document_is_untouched() {
        let doc = ConfigDocument::parse(NGINX_CONF);
        let before = doc.clone();
        let _ = reconcile(&doc, &hardening()).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn crlf_documents_keep_their_endings() {
        let text = "http {\r\n    server_tokens on;\r\n}\r\n";
        let result = run(text, &[Directive::setting("server_tokens", "off")]);
        assert_eq!(result.text(), "http {\r\n    server_tokens off;\r\n}\r\n");
    }

    #[test]
    fn custom_indent_unit() {
        let opts = ReconcileOptions {
            indent_unit: "\t".to_string(),
        };
        let d = Directive::setting("server_tokens", "off").in_block("http");
        let result = reconcile_with(&ConfigDocument::parse("http {\n}\n"), &[d], &opts).unwrap();
        assert_eq!(result.text(), "http {\n\tserver_tokens off;\n}\n");
    }

    #[test]
    fn summary_counts() {
        let result = run(NGINX_CONF, &hardening());
        let summary = result.summary();
        // server_tokens uncommented, worker_connections rewritten,
        // client_max_body_size inserted, autoindex untouched
        assert_eq!(summary.replaced, 2);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.total_changes(), 3);
        assert_eq!(result.changed().count(), 3);
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&Outcome::Inserted).unwrap();
        assert_eq!(json, "\"inserted\"");
    }
}
