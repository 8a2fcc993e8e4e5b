//! The [`PerspectiveStore`] trait defining the reference storage interface.

use verso_types::ObjectId;

use crate::error::Result;
use crate::types::{Perspective, Tag};

/// Storage backend for perspectives and tags.
///
/// Implementations must be thread-safe and apply each call atomically.
/// Callers serialize commits on one perspective with a lock and publish
/// the result through [`update_perspective`](Self::update_perspective), so a
/// writer whose lease ran out cannot overwrite a newer head.
pub trait PerspectiveStore: Send + Sync {
    /// Read a perspective. `Ok(None)` if it does not exist.
    fn read_perspective(&self, name: &str) -> Result<Option<Perspective>>;

    /// Create or replace a perspective.
    fn write_perspective(&self, perspective: &Perspective) -> Result<()>;

    /// Replace a perspective only if its stored head is still
    /// `expected_head`.
    ///
    /// Fails with `HeadMoved` if another writer advanced it, and with
    /// `NotFound` if it no longer exists.
    fn update_perspective(&self, perspective: &Perspective, expected_head: &ObjectId) -> Result<()>;

    /// Returns `Ok(true)` if the perspective existed.
    fn delete_perspective(&self, name: &str) -> Result<bool>;

    /// All perspectives, sorted by name.
    fn list_perspectives(&self) -> Result<Vec<Perspective>>;

    fn read_tag(&self, name: &str) -> Result<Option<Tag>>;

    /// Create a tag. Fails with `TagImmutable` if the name is taken.
    fn write_tag(&self, tag: &Tag) -> Result<()>;

    fn delete_tag(&self, name: &str) -> Result<bool>;

    /// All tags, sorted by name.
    fn list_tags(&self) -> Result<Vec<Tag>>;
}
