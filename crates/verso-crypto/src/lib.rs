//! Content hashing for verso.
//!
//! Every persisted node is addressed by a domain-separated BLAKE3 hash, so a
//! tree and a document bag with identical bytes never share an id.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError};
