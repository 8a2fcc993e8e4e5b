//! Error types for reference operations.

use thiserror::Error;
use verso_types::ObjectId;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    #[error("perspective not found: {name}")]
    NotFound { name: String },

    #[error("ref already exists: {name}")]
    AlreadyExists { name: String },

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A tag cannot be rewritten once created.
    #[error("tag is immutable: {name}")]
    TagImmutable { name: String },

    /// A conditional update found a different head than expected.
    #[error("perspective {name} moved: expected {expected}, found {actual}")]
    HeadMoved {
        name: String,
        expected: ObjectId,
        actual: ObjectId,
    },

    #[error("ref store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
