use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use verso_crypto::ContentHasher;
use verso_types::{CommitId, ObjectId};

use crate::error::{StoreError, StoreResult};

/// The kind of node stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// One folder level of a versioned namespace.
    Tree,
    /// A bin-packed set of leaf-name to document mappings.
    DocumentBag,
    /// A leaf payload with provenance.
    Document,
    /// A commit record.
    Commit,
}

impl ObjectKind {
    /// Stable tag used in on-disk encodings.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::DocumentBag => "bag",
            Self::Document => "document",
            Self::Commit => "commit",
        }
    }

    /// Parse a tag produced by [`ObjectKind::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "tree" => Some(Self::Tree),
            "bag" => Some(Self::DocumentBag),
            "document" => Some(Self::Document),
            "commit" => Some(Self::Commit),
            _ => None,
        }
    }

    fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Tree => &ContentHasher::TREE,
            Self::DocumentBag => &ContentHasher::BAG,
            Self::Document => &ContentHasher::DOCUMENT,
            Self::Commit => &ContentHasher::COMMIT,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A stored object: kind tag + encoded node + cached size.
///
/// This is the unit raw backends deal in. They key it by
/// [`StoredObject::compute_id`] and never look inside `data`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
    pub size: u64,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Content-addressed id, hashed in the domain of this object's kind.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }
}

/// A node type that can be encoded into a [`StoredObject`].
///
/// Nodes are encoded as JSON. Maps are `BTreeMap`s so the encoding, and hence
/// the id, is deterministic.
pub trait StoredNode: Serialize + DeserializeOwned {
    const KIND: ObjectKind;

    fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(Self::KIND, data))
    }

    fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        if obj.kind != Self::KIND {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("expected {}, got {}", Self::KIND, obj.kind),
            });
        }
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::CorruptObject {
            id: obj.compute_id(),
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Reference from a tree to one of its document bags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BagRef {
    pub bag: ObjectId,
    /// Number of entries in the bag when it was written.
    pub size: usize,
}

impl BagRef {
    pub fn new(bag: ObjectId, size: usize) -> Self {
        Self { bag, size }
    }
}

/// One directory level of a versioned namespace.
///
/// Immutable once persisted: an edit produces a new tree that references
/// every unchanged sub-tree and bag of the old one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Sub-folder name to sub-tree.
    pub children: BTreeMap<String, ObjectId>,
    /// The bags holding this level's leaf documents.
    pub document_bags: Vec<BagRef>,
}

impl Tree {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sub-tree reference for a folder name.
    pub fn child(&self, name: &str) -> Option<&ObjectId> {
        self.children.get(name)
    }

    /// Total leaf count recorded in the bag refs.
    pub fn document_count(&self) -> usize {
        self.document_bags.iter().map(|b| b.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.document_bags.is_empty()
    }
}

impl StoredNode for Tree {
    const KIND: ObjectKind = ObjectKind::Tree;
}

// ---------------------------------------------------------------------------
// DocumentBag
// ---------------------------------------------------------------------------

/// A packing unit holding several leaf-name to document mappings.
///
/// The repository-wide capacity bounds `entries.len()` when bags are written;
/// it is not re-checked on read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBag {
    pub entries: BTreeMap<String, ObjectId>,
}

impl DocumentBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, leaf: &str) -> Option<&ObjectId> {
        self.entries.get(leaf)
    }

    pub fn contains(&self, leaf: &str) -> bool {
        self.entries.contains_key(leaf)
    }

    pub fn insert(&mut self, leaf: impl Into<String>, document: ObjectId) {
        self.entries.insert(leaf.into(), document);
    }

    pub fn remove(&mut self, leaf: &str) -> Option<ObjectId> {
        self.entries.remove(leaf)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StoredNode for DocumentBag {
    const KIND: ObjectKind = ObjectKind::DocumentBag;
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Document payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Content {
    /// Bytes stored inside the document node.
    Inline(Vec<u8>),
    /// A reference to a payload held elsewhere (e.g. a blob store URI).
    External(String),
}

impl Content {
    /// Inline UTF-8 text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Inline(text.into().into_bytes())
    }

    /// Inline bytes, if this is inline content.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Inline(bytes) => Some(bytes),
            Self::External(_) => None,
        }
    }

    /// Inline content as UTF-8, if it is inline and valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// A leaf document: payload plus the commit that last wrote it.
///
/// `commit_ref` is only consulted when merging concurrent writers; readers
/// ignore it. It is `None` until the document is first committed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    pub content: Content,
    pub commit_ref: Option<CommitId>,
}

impl Document {
    /// A new, not yet committed document.
    pub fn new(content: Content) -> Self {
        Self {
            content,
            commit_ref: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Content::text(text))
    }

    /// A copy of this document attributed to `commit`.
    pub fn stamped(&self, commit: CommitId) -> Self {
        Self {
            content: self.content.clone(),
            commit_ref: Some(commit),
        }
    }
}

impl StoredNode for Document {
    const KIND: ObjectKind = ObjectKind::Document;
}

// ---------------------------------------------------------------------------
// CommitObject
// ---------------------------------------------------------------------------

/// A commit record: the root tree produced by one commit pass and what it
/// touched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObject {
    /// The reference stamped on every document this commit wrote.
    pub id: CommitId,
    /// Root tree after the commit.
    pub tree: ObjectId,
    /// Previous commit record on the same perspective.
    pub parent: Option<ObjectId>,
    pub user: String,
    pub comment: String,
    pub when: DateTime<Utc>,
    /// Human-readable change summary.
    pub changes: String,
    pub doc_references: Vec<ObjectId>,
    pub tree_references: Vec<ObjectId>,
}

impl StoredNode for CommitObject {
    const KIND: ObjectKind = ObjectKind::Commit;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Tree {
        let mut tree = Tree::empty();
        tree.children
            .insert("orders".into(), ObjectId::from_bytes(b"orders"));
        tree.document_bags
            .push(BagRef::new(ObjectId::from_bytes(b"bag"), 3));
        tree
    }

    #[test]
    fn tree_encoding_roundtrip() {
        let tree = sample_tree();
        let stored = tree.to_stored_object().unwrap();
        assert_eq!(stored.kind, ObjectKind::Tree);
        assert_eq!(Tree::from_stored_object(&stored).unwrap(), tree);
        assert_eq!(tree.document_count(), 3);
        assert!(tree.child("orders").is_some());
        assert!(!tree.is_empty());
        assert!(Tree::empty().is_empty());
    }

    #[test]
    fn tree_id_independent_of_insert_order() {
        let mut a = Tree::empty();
        a.children.insert("x".into(), ObjectId::from_bytes(b"1"));
        a.children.insert("y".into(), ObjectId::from_bytes(b"2"));
        let mut b = Tree::empty();
        b.children.insert("y".into(), ObjectId::from_bytes(b"2"));
        b.children.insert("x".into(), ObjectId::from_bytes(b"1"));
        assert_eq!(
            a.to_stored_object().unwrap().compute_id(),
            b.to_stored_object().unwrap().compute_id()
        );
    }

    #[test]
    fn decode_rejects_wrong_kind() {
        let stored = sample_tree().to_stored_object().unwrap();
        let err = DocumentBag::from_stored_object(&stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn decode_rejects_garbage() {
        let stored = StoredObject::new(ObjectKind::Document, b"not json".to_vec());
        assert!(matches!(
            Document::from_stored_object(&stored),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn bag_operations() {
        let mut bag = DocumentBag::new();
        bag.insert("x", ObjectId::from_bytes(b"x"));
        assert!(bag.contains("x"));
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.remove("x"), Some(ObjectId::from_bytes(b"x")));
        assert!(bag.is_empty());
    }

    #[test]
    fn stamping_changes_document_id() {
        let doc = Document::text("hello");
        let stamped = doc.stamped(CommitId::new());
        assert_eq!(stamped.content, doc.content);
        assert_ne!(
            doc.to_stored_object().unwrap().compute_id(),
            stamped.to_stored_object().unwrap().compute_id()
        );
    }

    #[test]
    fn content_accessors() {
        let text = Content::text("abc");
        assert_eq!(text.as_str(), Some("abc"));
        assert_eq!(text.as_bytes(), Some(&b"abc"[..]));
        let external = Content::External("blob://store/1".into());
        assert!(external.as_bytes().is_none());
        assert!(external.as_str().is_none());
    }

    #[test]
    fn same_bytes_different_kind_different_id() {
        let data = b"{}".to_vec();
        let tree = StoredObject::new(ObjectKind::Tree, data.clone());
        let bag = StoredObject::new(ObjectKind::DocumentBag, data);
        assert_ne!(tree.compute_id(), bag.compute_id());
    }

    #[test]
    fn kind_tags_roundtrip() {
        for kind in [
            ObjectKind::Tree,
            ObjectKind::DocumentBag,
            ObjectKind::Document,
            ObjectKind::Commit,
        ] {
            assert_eq!(ObjectKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ObjectKind::from_tag("blob"), None);
        assert_eq!(ObjectKind::DocumentBag.to_string(), "bag");
    }

    #[test]
    fn commit_object_roundtrip() {
        let commit = CommitObject {
            id: CommitId::new(),
            tree: ObjectId::from_bytes(b"root"),
            parent: None,
            user: "admin".into(),
            comment: "Repo creation".into(),
            when: Utc::now(),
            changes: String::new(),
            doc_references: vec![],
            tree_references: vec![ObjectId::from_bytes(b"root")],
        };
        let stored = commit.to_stored_object().unwrap();
        assert_eq!(CommitObject::from_stored_object(&stored).unwrap(), commit);
    }
}
