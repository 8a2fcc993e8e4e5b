//! Content-addressed node storage for verso.
//!
//! A versioned namespace is persisted as immutable nodes, each identified by
//! the BLAKE3 hash of its encoding (domain-separated by node kind):
//!
//! - [`Tree`] -- one folder level: sub-folder refs plus document bag refs
//! - [`DocumentBag`] -- a packing unit mapping several leaf names to documents
//! - [`Document`] -- a leaf payload plus the commit that last wrote it
//! - [`CommitObject`] -- a commit record pointing at a root tree
//!
//! # Storage Backends
//!
//! Raw backends implement [`ObjectStore`] and never interpret what they store:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileObjectStore`] -- loose objects on disk, written atomically
//!
//! [`ObjectDatabase`] layers typed access on top of any backend. A lookup of
//! an unknown id is always an error ([`StoreError::NotFound`]), never `None`:
//! a dangling reference means the store is inconsistent.

pub mod database;
pub mod error;
pub mod file;
pub mod memory;
pub mod object;
pub mod traits;

pub use database::ObjectDatabase;
pub use error::{StoreError, StoreResult};
pub use file::FileObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{
    BagRef, CommitObject, Content, Document, DocumentBag, ObjectKind, StoredNode, StoredObject,
    Tree,
};
pub use traits::ObjectStore;
