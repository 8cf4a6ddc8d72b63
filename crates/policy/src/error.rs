use std::path::PathBuf;

use thiserror::Error;

/// Model text that could not be loaded. Always a load-time failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("failed to read model file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("invalid model: {0}")]
    Invalid(String),

    #[error("missing section [{0}]")]
    MissingSection(&'static str),
}

/// Rule source failures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read policy rules from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("policy rules line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Evaluation failures. Callers must treat these as deny.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnforceError {
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),

    #[error("policy evaluation panicked: {0}")]
    Panicked(String),
}

/// Failures while building or reloading a rule set.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("rule {index} ({ptype}): {reason}")]
    InvalidRule {
        index: usize,
        ptype: String,
        reason: String,
    },

    #[error("building enforcer: {0}")]
    Enforcer(String),
}
