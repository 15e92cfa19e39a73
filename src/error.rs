//! Error taxonomy for the core.
//!
//! `Illegal` is deliberately not a variant here: an oracle rejection is
//! a normal, expected outcome of `commit` and is reported as
//! `Ok(CommitOutcome::RolledBack { .. })`, not an `Err`. Only failures
//! that prevent the session from reasoning about its own state at all
//! are `CoreError`.

use thiserror::Error;

/// Failures the core can report to its driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No SCoP could be loaded from the given path, or the path does
    /// not exist / is not readable.
    #[error("failed to load SCoPs from {path}: {reason}")]
    InputError { path: String, reason: String },

    /// The output path for code generation could not be written.
    #[error("failed to write generated code to {path}: {reason}")]
    OutputError { path: String, reason: String },

    /// A SCoP index used by a driver-facing operation does not exist.
    #[error("SCoP index {index} out of range (session holds {count} SCoPs)")]
    NoSuchScop { index: usize, count: usize },

    /// A primitive's precondition was not met (wrong node kind at
    /// focus, out-of-range child/filter index, shape mismatch between
    /// the two bands being fused, etc).
    #[error("precondition violated for `{primitive}`: {reason}")]
    PreconditionViolation { primitive: &'static str, reason: String },

    /// Navigation moved the cursor out of the tree (`goto_parent` at
    /// the root, `goto_child` past the last child).
    #[error("cannot navigate {direction}: {reason}")]
    NavigationError { direction: &'static str, reason: String },

    /// A structural invariant of the schedule tree was violated by a
    /// transformation. Reaching this means a primitive has a bug: it
    /// must never be possible to commit a tree that fails these
    /// checks.
    #[error("structural invariant violated: {0}")]
    InvariantViolation(String),

    /// The underlying polyhedral context could not honor a request
    /// (here: the simplified in-crate kernel, not a real isl binding).
    /// Fatal for the session; the session must be torn down.
    #[error("internal polyhedral kernel error: {0}")]
    KernelError(String),

    /// `commit` or `rollback` called with no scratch cursor in flight.
    #[error("no scratch cursor: call `begin` before `{operation}`")]
    NoScratch { operation: &'static str },
}

pub type CoreResult<T> = Result<T, CoreError>;
