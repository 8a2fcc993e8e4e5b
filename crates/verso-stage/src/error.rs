//! Error types for the stage crate.

/// Errors that can occur while staging or committing.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// An object store lookup or write failed. Missing nodes surface here
    /// as [`StoreError::NotFound`](verso_store::StoreError::NotFound).
    #[error("store error: {0}")]
    Store(#[from] verso_store::StoreError),

    /// A staging call was given no path segments.
    #[error("empty document path")]
    EmptyPath,
}

/// Convenience alias for stage results.
pub type StageResult<T> = Result<T, StageError>;
