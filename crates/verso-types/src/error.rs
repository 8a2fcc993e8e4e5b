use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid commit id: {0}")]
    InvalidCommitId(String),

    #[error("invalid document path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
}
