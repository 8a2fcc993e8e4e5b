use thiserror::Error;

/// Errors from lock managers.
///
/// Failing to obtain a lock within the wait time is not an error: acquire
/// returns `Ok(None)` and the caller decides.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock table poisoned: {0}")]
    Poisoned(String),

    #[error("invalid lock timeout for {resource}: {reason}")]
    InvalidTimeout { resource: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LockError>;
