//! # Declarative
//!
//! Idempotent, line-oriented reconciliation of text configuration files.
//!
//! Instead of scripting edits ("replace this, append that"), callers
//! describe the lines a file must (or must not) contain, and the
//! reconciler converges the file to that description. Re-running with the
//! same description is a no-op.
//!
//! ## Core Concepts
//!
//! - **ConfigDocument**: a parsed file; renders back byte for byte
//! - **Directive**: one desired fact (match rule, desired line, anchor, presence)
//! - **Anchor**: where a missing line goes (`Block("http")`, `After(..)`, `Start`, `End`)
//! - **ReconciliationResult**: the new document plus an [`Outcome`] per directive
//!
//! ## Example
//!
//! ```
//! use declarative::{ConfigDocument, Directive, Outcome, reconcile};
//!
//! let doc = ConfigDocument::parse("http {\n    server_tokens on;\n}\n");
//! let directives = [
//!     Directive::setting("server_tokens", "off").in_block("http"),
//!     Directive::setting("client_max_body_size", "10m").in_block("http"),
//! ];
//!
//! let result = reconcile(&doc, &directives).unwrap();
//! assert_eq!(result.outcomes[0].outcome, Outcome::Replaced);
//! assert_eq!(result.outcomes[1].outcome, Outcome::Inserted);
//!
//! // A second pass changes nothing
//! let again = reconcile(&result.document, &directives).unwrap();
//! assert!(again.is_unchanged());
//! ```
//!
//! ## Guarantees
//!
//! - Idempotence: reconciling the output again yields all `Unchanged`
//!   and identical text. A directive set that cannot converge is
//!   rejected with [`ReconcileError::NonConvergent`] or
//!   [`ReconcileError::Conflict`].
//! - Non-destructive: lines no directive matches keep their text and
//!   relative order.
//! - Anchors are resolved against the evolving document. Insertions that
//!   share an anchor appear below it in directive order.
//!
//! The crate does no I/O. Backing up, validating and writing files is the
//! caller's job. Two passes racing on the same file are not coordinated.

pub mod directive;
pub mod document;
pub mod error;
pub mod matcher;
pub mod reconciler;

// Re-export main types at crate root
pub use directive::{Anchor, Directive, Presence};
pub use document::{ConfigDocument, LineEnding};
pub use error::{ReconcileError, Result};
pub use matcher::LineMatcher;
pub use reconciler::{
    DirectiveOutcome, Outcome, ReconcileOptions, ReconcileSummary, ReconciliationResult,
    reconcile, reconcile_with,
};
