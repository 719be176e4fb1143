//! Errors raised by the graph core

use thiserror::Error;

/// Build-aborting failures of derivation, integration or hashing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two option sets disagree on a key that cannot be merged
    #[error("conflicting chunk group option '{key}': '{existing}' vs '{incoming}'")]
    ConflictingGroupOption {
        key: String,
        existing: String,
        incoming: String,
    },

    #[error("entrypoint '{entry}' has both 'dependOn' and 'runtime' specified")]
    DependOnWithRuntime { entry: String },

    #[error("entrypoints {} use 'dependOn' to depend on each other in a circular way", .entries.join(" -> "))]
    CircularDependOn { entries: Vec<String> },

    #[error("entrypoint '{entry}' depends on unknown entrypoint '{target}'")]
    UnknownDependOn { entry: String, target: String },

    #[error("entrypoint '{entry}' has a 'runtime' option which points to another entrypoint named '{runtime}'")]
    RuntimeNameConflict { entry: String, runtime: String },

    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error("entrypoint '{0}' imports no modules")]
    EmptyEntry(String),

    /// An internal mirror invariant was broken; always a programming error
    #[error("chunk graph inconsistency: {0}")]
    Inconsistent(String),
}

/// Result alias for the graph core
pub type GraphResult<T> = Result<T, GraphError>;
