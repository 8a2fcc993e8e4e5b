//! Foundation types for verso, a versioned document repository.
//!
//! Every other verso crate depends on `verso-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 hash) of a stored node
//! - [`CommitId`] -- UUID v7 commit reference stamped on documents at write time
//! - [`DocPath`] -- A validated, slash-separated document or folder path

pub mod commit;
pub mod error;
pub mod object;
pub mod path;

pub use commit::CommitId;
pub use error::TypeError;
pub use object::ObjectId;
pub use path::DocPath;
