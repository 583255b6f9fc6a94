//! Error taxonomy.
//!
//! [`NetError`] is fatal and stops a run before any analysis starts. Every
//! analysis phase reports its own failures through [`AnalysisError`] so that
//! one phase failing never prevents the others from running.

use std::time::Duration;

use thiserror::Error;

/// The net handed over by the loader cannot be analyzed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("malformed net: {0}")]
    Malformed(String),
}

/// Failure to read back a serialized diagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DotError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("unknown variable label `{0}`")]
    UnknownLabel(String),
    #[error("node {0} is referenced but never declared")]
    Dangling(String),
    #[error("expected {expected} root(s), found {found}")]
    RootCount { expected: usize, found: usize },
    /// A node does not test its variable strictly above its children.
    #[error("node {0} is out of variable order")]
    Unordered(String),
    #[error("node {0} lies on a cycle")]
    Cycle(String),
    /// A reloaded state set mentions a next-state variable.
    #[error("state set depends on next-state variable `{0}`")]
    NextState(String),
}

/// The exact check got no definite answer from Z3.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("solver returned unknown")]
    Unknown,
    #[error("solver reported sat without a model")]
    MissingModel,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Firing `transition` would put a second token into `place`.
    #[error("net is not 1-safe: firing `{transition}` puts a second token into `{place}`")]
    NotSafe { place: String, transition: String },

    /// The symbolic fixpoint hit one of its configured bounds.
    #[error("reachability interrupted after {iterations} iteration(s) ({elapsed:?}): {reason}")]
    Interrupted {
        iterations: usize,
        elapsed: Duration,
        reason: &'static str,
    },

    /// A predicate was used with a manager other than the one that built it.
    #[error("predicate belongs to a different decision-diagram manager")]
    ForeignPredicate,

    /// The structural dead-marking predicate and the exact check disagree.
    #[error("structural deadlock candidate {marking} is live according to the exact check")]
    EncodingMismatch { marking: String },

    #[error("constraint refers to unknown place `{0}`")]
    UnknownPlace(String),

    #[error(transparent)]
    Dot(#[from] DotError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}
