//! Process-local lock manager.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{LockError, Result};
use crate::traits::{LockHandle, LockManager};

#[derive(Debug, Clone, Copy)]
struct Lease {
    handle: LockHandle,
    /// `None` when the hold time is too long to represent.
    expires_at: Option<Instant>,
}

impl Lease {
    fn live_at(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |t| t > now)
    }
}

/// The earlier of two optional instants, `None` meaning never.
fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// [`LockManager`] for a single process, built on a mutex-guarded lease
/// table and a condition variable that wakes waiters on release.
#[derive(Default)]
pub struct InMemoryLockManager {
    leases: Mutex<HashMap<String, Lease>>,
    released: Condvar,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `resource` currently has an unexpired lease.
    pub fn is_locked(&self, resource: &str) -> Result<bool> {
        let leases = self
            .leases
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        Ok(leases
            .get(resource)
            .is_some_and(|lease| lease.live_at(Instant::now())))
    }
}

impl LockManager for InMemoryLockManager {
    fn acquire(
        &self,
        resource: &str,
        wait: Duration,
        hold: Duration,
    ) -> Result<Option<LockHandle>> {
        if hold.is_zero() {
            return Err(LockError::InvalidTimeout {
                resource: resource.to_string(),
                reason: "hold time must be positive".into(),
            });
        }

        // A wait too long to represent never times out.
        let deadline = Instant::now().checked_add(wait);
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;

        loop {
            let now = Instant::now();
            match leases.get(resource).copied() {
                Some(lease) if lease.live_at(now) => {
                    if deadline.is_some_and(|d| now >= d) {
                        debug!(resource, "lock wait timed out");
                        return Ok(None);
                    }
                    leases = match earliest(deadline, lease.expires_at) {
                        Some(wake_at) => {
                            self.released
                                .wait_timeout(leases, wake_at - now)
                                .map_err(|e| LockError::Poisoned(e.to_string()))?
                                .0
                        }
                        None => self
                            .released
                            .wait(leases)
                            .map_err(|e| LockError::Poisoned(e.to_string()))?,
                    };
                }
                stale => {
                    if let Some(lease) = stale {
                        warn!(resource, handle = %lease.handle, "reclaiming expired lock");
                    }
                    let handle = LockHandle::new();
                    leases.insert(
                        resource.to_string(),
                        Lease {
                            handle,
                            expires_at: now.checked_add(hold),
                        },
                    );
                    debug!(resource, %handle, "lock acquired");
                    return Ok(Some(handle));
                }
            }
        }
    }

    fn release(&self, resource: &str, handle: &LockHandle) -> Result<bool> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        let held = leases
            .get(resource)
            .is_some_and(|lease| lease.handle == *handle);
        if held {
            leases.remove(resource);
            self.released.notify_all();
            debug!(resource, %handle, "lock released");
        }
        Ok(held)
    }
}

impl std::fmt::Debug for InMemoryLockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLockManager").finish_non_exhaustive()
    }
}
