//! Error types for reconciliation.

use thiserror::Error;

/// Errors surfaced by [`reconcile`](crate::reconcile).
///
/// A reconciliation that fails never hands back a partially edited
/// document: the caller's input is left untouched.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The directive had to be inserted but its anchor is missing.
    #[error("cannot insert '{directive}': anchor {anchor} not found in document")]
    AnchorNotFound {
        /// Name of the directive that needed the anchor
        directive: String,
        /// Human-readable form of the anchor
        anchor: String,
    },

    /// A match pattern failed to compile.
    #[error("invalid match pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern as given
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// The desired line would not be recognised by the directive's own
    /// matcher, so a second pass would insert it again.
    #[error("desired line for '{directive}' does not satisfy its match rule: {desired}")]
    NonConvergent {
        /// Name of the offending directive
        directive: String,
        /// The desired line
        desired: String,
    },

    /// Directives in the same set fight over the same lines.
    #[error("directive '{directive}' is not settled after the pass: {reason}")]
    Conflict {
        /// Name of the directive whose target state was not reached
        directive: String,
        /// What was observed
        reason: String,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReconcileError>;
