use verso_types::ObjectId;

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Raw content-addressed object store.
///
/// Backends must satisfy:
/// - Objects are immutable once written; the same bytes always get the same id.
/// - A read for a given id returns byte-identical data every time.
/// - Concurrent reads are safe.
/// - Contents are never interpreted: this is a pure key-value store.
/// - I/O errors are propagated, never swallowed. Retrying is the caller's
///   (or a wrapping adapter's) business.
pub trait ObjectStore: Send + Sync {
    /// Read an object by id. `Ok(None)` if it does not exist.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its id. Writing existing content is a no-op.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object. Returns `true` if it existed.
    ///
    /// Only for archiving unreachable history; deleting a referenced object
    /// corrupts every tree that points at it.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read several objects. Backends may override to batch I/O.
    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<StoredObject>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }
}
