//! Named pointers into a verso repository.
//!
//! - **Perspectives** are mutable pointers (branches) to the latest commit
//!   and its root tree. They only move when a commit succeeds, and callers
//!   serialize those moves with a lock scoped to the perspective name.
//! - **Tags** are immutable pointers to one commit. Delete and recreate to
//!   move a tag.
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- [`Perspective`] and [`Tag`]
//! - [`traits`] -- The [`PerspectiveStore`] storage interface
//! - [`names`] -- Perspective/tag name validation
//! - [`memory`] -- In-memory [`InMemoryPerspectiveStore`]

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use memory::InMemoryPerspectiveStore;
pub use names::{validate_perspective_name, validate_tag_name};
pub use traits::PerspectiveStore;
pub use types::{Perspective, Tag};
