//! Staging and commit of versioned trees.
//!
//! A [`Stage`] is an editing overlay on one perspective's root tree. Edits
//! are queued on a recursive [`StageTree`] that materializes only the folder
//! levels actually touched. Committing walks the overlay bottom-up, packs
//! leaf documents into bags of bounded size, persists every changed node
//! through an [`ObjectDatabase`](verso_store::ObjectDatabase) and returns
//! the new root reference. Everything not touched is shared with the
//! previous tree.
//!
//! # Key Types
//!
//! - [`Stage`] -- Root handle: a [`StageTree`] bound to a perspective
//! - [`StageTree`] -- One staged folder level
//! - [`CommitCollector`] -- Record of what one commit changed
//! - [`DocumentCache`] -- Per-commit document write dedup table

pub mod cache;
pub mod collector;
pub mod error;
pub mod stage;
pub mod tree;

pub use cache::DocumentCache;
pub use collector::CommitCollector;
pub use error::{StageError, StageResult};
pub use stage::Stage;
pub use tree::StageTree;
