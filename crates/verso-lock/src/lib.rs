//! Named, time-bounded exclusive locks.
//!
//! A commit on a perspective reads the perspective, writes new nodes and
//! moves the perspective. That sequence runs under a lock named after the
//! perspective, obtained from a [`LockManager`].
//!
//! A lock is acquired with two durations: how long to wait for a competing
//! holder, and how long the lease lasts. A lease that outlives its hold time
//! may be reclaimed by the next acquirer, so a crashed holder cannot wedge a
//! perspective forever.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{LockError, Result};
pub use memory::InMemoryLockManager;
pub use traits::{LockHandle, LockManager};
