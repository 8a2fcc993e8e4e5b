use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use verso_stage::CommitCollector;
use verso_store::CommitObject;
use verso_types::{CommitId, ObjectId};

/// Result of a commit operation.
#[derive(Clone, Debug)]
pub struct CommitResult {
    pub perspective: String,
    /// Reference stamped on every document the commit wrote.
    pub commit_id: CommitId,
    /// The commit record, now the perspective's head.
    pub head: ObjectId,
    /// The new root tree.
    pub root: ObjectId,
    pub collector: CommitCollector,
}

/// Summary of a commit record for history display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub head: ObjectId,
    pub commit_id: CommitId,
    pub root: ObjectId,
    pub parent: Option<ObjectId>,
    pub user: String,
    pub comment: String,
    pub when: DateTime<Utc>,
    pub changes: String,
    pub document_count: usize,
}

impl CommitSummary {
    pub fn from_record(head: ObjectId, record: &CommitObject) -> Self {
        Self {
            head,
            commit_id: record.id,
            root: record.tree,
            parent: record.parent,
            user: record.user.clone(),
            comment: record.comment.clone(),
            when: record.when,
            changes: record.changes.clone(),
            document_count: record.doc_references.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Document,
    Folder,
}

/// One entry of a folder listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    /// Path from the repository root, without a leading slash.
    pub path: String,
    pub kind: EntryKind,
}

impl FolderEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_from_record() {
        let record = CommitObject {
            id: CommitId::new(),
            tree: ObjectId::from_bytes(b"tree"),
            parent: Some(ObjectId::from_bytes(b"parent")),
            user: "alice".into(),
            comment: "first".into(),
            when: Utc::now(),
            changes: "+ a\n".into(),
            doc_references: vec![ObjectId::from_bytes(b"doc")],
            tree_references: vec![ObjectId::from_bytes(b"tree")],
        };
        let head = ObjectId::from_bytes(b"head");
        let summary = CommitSummary::from_record(head, &record);
        assert_eq!(summary.head, head);
        assert_eq!(summary.commit_id, record.id);
        assert_eq!(summary.root, record.tree);
        assert_eq!(summary.user, "alice");
        assert_eq!(summary.document_count, 1);
    }

    #[test]
    fn folder_entry_kind() {
        let entry = FolderEntry {
            name: "orders".into(),
            path: "data/orders".into(),
            kind: EntryKind::Folder,
        };
        assert!(entry.is_folder());
    }
}
