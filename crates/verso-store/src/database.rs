use std::sync::Arc;

use tracing::debug;
use verso_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{CommitObject, Document, DocumentBag, StoredNode, Tree};
use crate::traits::ObjectStore;

/// Typed node access over a raw [`ObjectStore`].
///
/// Every `get_*` fails with [`StoreError::NotFound`] for an unknown id and
/// with [`StoreError::CorruptObject`] when the id names a node of another
/// kind. Every `write_*` returns the node's content address, so writing the
/// same node twice yields the same id.
#[derive(Clone)]
pub struct ObjectDatabase {
    store: Arc<dyn ObjectStore>,
}

impl ObjectDatabase {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// The underlying raw store.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn read_node<T: StoredNode>(&self, id: &ObjectId) -> StoreResult<T> {
        let stored = self.store.read(id)?.ok_or(StoreError::NotFound(*id))?;
        T::from_stored_object(&stored)
    }

    fn write_node<T: StoredNode>(&self, node: &T) -> StoreResult<ObjectId> {
        let stored = node.to_stored_object()?;
        self.store.write(&stored)
    }

    pub fn get_tree(&self, id: &ObjectId) -> StoreResult<Tree> {
        self.read_node(id)
    }

    pub fn get_document_bag(&self, id: &ObjectId) -> StoreResult<DocumentBag> {
        self.read_node(id)
    }

    pub fn get_document(&self, id: &ObjectId) -> StoreResult<Document> {
        self.read_node(id)
    }

    pub fn get_commit(&self, id: &ObjectId) -> StoreResult<CommitObject> {
        self.read_node(id)
    }

    pub fn write_tree(&self, tree: &Tree) -> StoreResult<ObjectId> {
        let id = self.write_node(tree)?;
        debug!(
            tree = %id.short_hex(),
            children = tree.children.len(),
            bags = tree.document_bags.len(),
            "tree written"
        );
        Ok(id)
    }

    pub fn write_document_bag(&self, bag: &DocumentBag) -> StoreResult<ObjectId> {
        let id = self.write_node(bag)?;
        debug!(bag = %id.short_hex(), entries = bag.len(), "document bag written");
        Ok(id)
    }

    pub fn write_document(&self, document: &Document) -> StoreResult<ObjectId> {
        self.write_node(document)
    }

    pub fn write_commit(&self, commit: &CommitObject) -> StoreResult<ObjectId> {
        self.write_node(commit)
    }

    pub fn contains(&self, id: &ObjectId) -> StoreResult<bool> {
        self.store.exists(id)
    }

    /// Remove nodes, returning how many existed.
    pub fn delete_all(&self, ids: &[ObjectId]) -> StoreResult<usize> {
        let mut removed = 0;
        for id in ids {
            if self.store.delete(id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for ObjectDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDatabase").finish_non_exhaustive()
    }
}
