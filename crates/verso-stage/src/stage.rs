use verso_refs::Perspective;
use verso_store::{Document, ObjectDatabase, Tree};
use verso_types::{CommitId, DocPath, ObjectId};

use crate::cache::DocumentCache;
use crate::collector::CommitCollector;
use crate::error::StageResult;
use crate::tree::StageTree;

/// A [`StageTree`] over a perspective's root, bound to that perspective.
///
/// A successful [`commit_stage`](Self::commit_stage) must be followed by
/// advancing the perspective to the returned root (under the perspective's
/// lock), otherwise the edits are lost. After that, [`rebind`](Self::rebind)
/// the stage to the moved perspective to keep editing.
#[derive(Clone, Debug)]
pub struct Stage {
    perspective: Perspective,
    tree: StageTree,
}

impl Stage {
    /// Stage over `root`, which must be the tree at `perspective.root`.
    pub fn new(perspective: Perspective, root: Tree, capacity: usize) -> Self {
        Self {
            perspective,
            tree: StageTree::new(root, capacity),
        }
    }

    /// Stage over the perspective's current root, loaded from `db`.
    pub fn open(db: &ObjectDatabase, perspective: Perspective, capacity: usize) -> StageResult<Self> {
        let root = db.get_tree(&perspective.root)?;
        Ok(Self::new(perspective, root, capacity))
    }

    pub fn perspective(&self) -> &Perspective {
        &self.perspective
    }

    pub fn perspective_name(&self) -> &str {
        &self.perspective.name
    }

    pub fn tree(&self) -> &StageTree {
        &self.tree
    }

    pub fn has_changes(&self) -> bool {
        self.tree.has_changes()
    }

    pub fn add_document_to_stage(
        &mut self,
        db: &ObjectDatabase,
        path: &DocPath,
        document: Document,
        must_be_new: bool,
    ) -> StageResult<()> {
        self.tree
            .add_document_to_stage(db, path.segments(), document, must_be_new)
    }

    pub fn remove_from_stage(&mut self, db: &ObjectDatabase, path: &DocPath) -> StageResult<bool> {
        self.tree.remove_from_stage(db, path.segments())
    }

    pub fn apply(&mut self, db: &ObjectDatabase, incoming: &Tree, commit_ref: CommitId) -> StageResult<()> {
        self.tree.apply(db, incoming, commit_ref)
    }

    /// Persist the staged edits and return the new root with a record of
    /// what changed.
    pub fn commit_stage(
        &mut self,
        db: &ObjectDatabase,
        commit_ref: CommitId,
    ) -> StageResult<(ObjectId, CommitCollector)> {
        let mut collector = CommitCollector::new();
        let mut cache = DocumentCache::new();
        let root = self
            .tree
            .commit_stage(db, commit_ref, &mut collector, &mut cache)?;
        Ok((root, collector))
    }

    /// Point the stage at the perspective after it moved to this stage's
    /// committed root.
    pub fn rebind(&mut self, perspective: Perspective) {
        self.perspective = perspective;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use verso_store::InMemoryObjectStore;

    fn setup() -> (ObjectDatabase, Perspective) {
        let db = ObjectDatabase::new(Arc::new(InMemoryObjectStore::new()));
        let root = db.write_tree(&Tree::empty()).unwrap();
        let perspective = Perspective::new("main", ObjectId::from_bytes(b"c0"), root, "admin");
        (db, perspective)
    }

    fn path(p: &str) -> DocPath {
        DocPath::parse(p).unwrap()
    }

    #[test]
    fn open_loads_perspective_root() {
        let (db, perspective) = setup();
        let stage = Stage::open(&db, perspective, 10).unwrap();
        assert_eq!(stage.perspective_name(), "main");
        assert_eq!(stage.tree().shadow(), &Tree::empty());
        assert!(!stage.has_changes());
    }

    #[test]
    fn commit_returns_root_and_collector() {
        let (db, perspective) = setup();
        let mut stage = Stage::open(&db, perspective, 10).unwrap();
        stage
            .add_document_to_stage(&db, &path("orders/o1"), Document::text("{}"), true)
            .unwrap();
        let (root, collector) = stage.commit_stage(&db, CommitId::new()).unwrap();

        assert_eq!(collector.doc_names(), ["orders/o1"]);
        assert_eq!(collector.folder_names(), ["orders"]);
        assert_eq!(stage.tree().shadow(), &db.get_tree(&root).unwrap());
        assert!(!stage.has_changes());
    }

    #[test]
    fn stage_is_reusable_after_rebind() {
        let (db, perspective) = setup();
        let mut stage = Stage::open(&db, perspective.clone(), 10).unwrap();
        stage
            .add_document_to_stage(&db, &path("x"), Document::text("1"), false)
            .unwrap();
        let (root, _) = stage.commit_stage(&db, CommitId::new()).unwrap();

        let mut moved = perspective;
        moved.advance(ObjectId::from_bytes(b"c1"), root);
        stage.rebind(moved);
        assert_eq!(stage.perspective().root, root);

        assert!(stage.remove_from_stage(&db, &path("x")).unwrap());
        let (root2, collector) = stage.commit_stage(&db, CommitId::new()).unwrap();
        assert_ne!(root, root2);
        assert_eq!(collector.removed_doc_names(), ["x"]);
    }

    #[test]
    fn missing_root_is_not_found() {
        let (db, mut perspective) = setup();
        perspective.root = ObjectId::from_bytes(b"gone");
        assert!(matches!(
            Stage::open(&db, perspective, 10),
            Err(crate::StageError::Store(verso_store::StoreError::NotFound(_)))
        ));
    }
}
