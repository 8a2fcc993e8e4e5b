use std::time::Duration;

use uuid::Uuid;

use crate::error::Result;

/// Proof of holding a named lock. Pass it back to release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LockHandle(Uuid);

impl LockHandle {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for LockHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A provider of named exclusive locks.
pub trait LockManager: Send + Sync {
    /// Try to take the lock on `resource`, waiting up to `wait`.
    ///
    /// On success the lease lasts `hold`; after that another caller may
    /// reclaim it. Returns `Ok(None)` if the lock stayed taken for the
    /// whole wait. A duration too long to represent (such as
    /// `Duration::MAX`) means no limit.
    fn acquire(&self, resource: &str, wait: Duration, hold: Duration)
        -> Result<Option<LockHandle>>;

    /// Release a lock. Returns `false` if `handle` no longer holds it
    /// (never held, already released, or reclaimed after expiry).
    fn release(&self, resource: &str, handle: &LockHandle) -> Result<bool>;
}
