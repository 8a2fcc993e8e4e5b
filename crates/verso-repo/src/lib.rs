//! Versioned document repository.
//!
//! [`VersionedRepo`] ties the pieces together: documents live in trees in an
//! object store, perspectives name the current root of each line of work,
//! and every change goes through a [`Stage`] committed under the
//! perspective's lock. This is the main entry point for applications
//! embedding verso.

pub mod commit;
pub mod config;
pub mod error;
pub mod listener;
pub mod repository;

pub use commit::{CommitResult, CommitSummary, EntryKind, FolderEntry};
pub use config::RepoConfig;
pub use error::{RepoError, RepoResult};
pub use listener::{ChangeListener, CommitEvent};
pub use repository::VersionedRepo;

// Re-export key types
pub use verso_refs::{Perspective, Tag};
pub use verso_stage::{CommitCollector, Stage};
pub use verso_store::{Content, Document};
pub use verso_types::{CommitId, DocPath, ObjectId};
