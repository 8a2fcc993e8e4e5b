use std::collections::HashMap;

use verso_store::Document;
use verso_types::ObjectId;

/// Documents already written during one commit pass.
///
/// Keyed by the staged document value, before it is stamped with the
/// commit reference, so the same content staged under several names (or in
/// sibling folders) is written once. Scoped to a single commit; never
/// share one between concurrent commits.
#[derive(Debug, Default)]
pub struct DocumentCache {
    written: HashMap<Document, ObjectId>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, document: &Document) -> Option<ObjectId> {
        self.written.get(document).copied()
    }

    pub fn insert(&mut self, document: Document, id: ObjectId) {
        self.written.insert(document, id);
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}
