//! Core reference types.
//!
//! A [`Perspective`] is a mutable branch: it names the latest commit record
//! and that commit's root tree. A [`Tag`] pins one commit record forever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use verso_types::ObjectId;

/// A named, mutable view of a repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspective {
    /// Perspective name (e.g. "main", "team/reporting").
    pub name: String,
    /// Latest commit record on this perspective.
    pub head: ObjectId,
    /// Root tree of `head`.
    pub root: ObjectId,
    /// Commit this perspective was forked from (or last merged at). Equal
    /// to the first head for the default perspective.
    pub base_commit: ObjectId,
    pub description: String,
    pub owner: String,
    pub updated_at: DateTime<Utc>,
}

impl Perspective {
    pub fn new(
        name: impl Into<String>,
        head: ObjectId,
        root: ObjectId,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            head,
            root,
            base_commit: head,
            description: String::new(),
            owner: owner.into(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Move this perspective to a new commit record and root tree.
    pub fn advance(&mut self, head: ObjectId, root: ObjectId) {
        self.head = head;
        self.root = root;
        self.updated_at = Utc::now();
    }
}

/// An immutable, named pointer to one commit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name (e.g. "v1.0.0").
    pub name: String,
    /// Tagged commit record.
    pub commit: ObjectId,
    /// Perspective the tag was taken on.
    pub perspective: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(
        name: impl Into<String>,
        commit: ObjectId,
        perspective: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            commit,
            perspective: perspective.into(),
            owner: owner.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_perspective_is_based_on_its_head() {
        let head = ObjectId::from_bytes(b"commit");
        let root = ObjectId::from_bytes(b"tree");
        let p = Perspective::new("main", head, root, "admin").with_description("default");
        assert_eq!(p.base_commit, head);
        assert_eq!(p.description, "default");
    }

    #[test]
    fn advance_keeps_base() {
        let head = ObjectId::from_bytes(b"c1");
        let mut p = Perspective::new("main", head, ObjectId::from_bytes(b"t1"), "admin");
        let next = ObjectId::from_bytes(b"c2");
        p.advance(next, ObjectId::from_bytes(b"t2"));
        assert_eq!(p.head, next);
        assert_eq!(p.base_commit, head);
    }

    #[test]
    fn tag_serde_roundtrip() {
        let tag = Tag::new("v1", ObjectId::from_bytes(b"c"), "main", "admin");
        let json = serde_json::to_string(&tag).unwrap();
        let back: Tag = serde_json::from_str(&json).unwrap();
        assert_eq!(tag, back);
    }
}
