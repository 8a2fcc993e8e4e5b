//! The recursive staging node.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use tracing::debug;
use verso_store::{BagRef, Document, DocumentBag, ObjectDatabase, Tree};
use verso_types::{CommitId, ObjectId};

use crate::cache::DocumentCache;
use crate::collector::CommitCollector;
use crate::error::{StageError, StageResult};

/// Uncommitted edits to one folder level, layered over the tree it was
/// built from (the *shadow*).
///
/// Child levels are materialized on demand, so an edit deep in a large tree
/// only loads the folders on its path. Not thread-safe: one writer drives a
/// `StageTree` through edits and a commit.
#[derive(Clone, Debug)]
pub struct StageTree {
    shadow: Tree,
    staged_trees: BTreeMap<String, StageTree>,
    staged_documents: BTreeMap<String, Document>,
    new_staged_documents: BTreeMap<String, Document>,
    removed_documents: BTreeSet<String>,
    /// Staged children taken whole from a merged tree.
    adopted_trees: BTreeSet<String>,
    capacity: usize,
}

impl StageTree {
    /// Stage over `shadow`. Bags written by this level and its descendants
    /// hold at most `capacity` entries (at least one).
    pub fn new(shadow: Tree, capacity: usize) -> Self {
        Self {
            shadow,
            staged_trees: BTreeMap::new(),
            staged_documents: BTreeMap::new(),
            new_staged_documents: BTreeMap::new(),
            removed_documents: BTreeSet::new(),
            adopted_trees: BTreeSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// The tree this level was last built from or committed to.
    pub fn shadow(&self) -> &Tree {
        &self.shadow
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True if this level or any materialized descendant holds edits.
    pub fn has_changes(&self) -> bool {
        !self.staged_documents.is_empty()
            || !self.new_staged_documents.is_empty()
            || !self.removed_documents.is_empty()
            || !self.adopted_trees.is_empty()
            || self.staged_trees.values().any(StageTree::has_changes)
    }

    /// Staged child for `name`, materializing it from the shadow (or an
    /// empty tree) on first use.
    fn child_mut(&mut self, db: &ObjectDatabase, name: &str) -> StageResult<&mut StageTree> {
        match self.staged_trees.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let shadow = match self.shadow.children.get(name) {
                    Some(id) => {
                        debug!(folder = name, tree = %id.short_hex(), "materializing staged folder");
                        db.get_tree(id)?
                    }
                    None => Tree::empty(),
                };
                Ok(entry.insert(StageTree::new(shadow, self.capacity)))
            }
        }
    }

    fn stage_leaf(&mut self, leaf: &str, document: Document, must_be_new: bool) {
        self.removed_documents.remove(leaf);
        if must_be_new {
            self.staged_documents.remove(leaf);
            self.new_staged_documents.insert(leaf.to_string(), document);
        } else {
            self.new_staged_documents.remove(leaf);
            self.staged_documents.insert(leaf.to_string(), document);
        }
    }

    /// Queue `document` at `path` (folder segments then leaf name).
    ///
    /// `must_be_new` only selects which pending set the value lands in; it
    /// does not check for an existing leaf. The last edit to a leaf wins.
    pub fn add_document_to_stage<S: AsRef<str>>(
        &mut self,
        db: &ObjectDatabase,
        path: &[S],
        document: Document,
        must_be_new: bool,
    ) -> StageResult<()> {
        match path {
            [] => Err(StageError::EmptyPath),
            [leaf] => {
                self.stage_leaf(leaf.as_ref(), document, must_be_new);
                Ok(())
            }
            [folder, rest @ ..] => self
                .child_mut(db, folder.as_ref())?
                .add_document_to_stage(db, rest, document, must_be_new),
        }
    }

    /// Queue removal of the leaf at `path`.
    ///
    /// Returns `false` without staging anything when a folder on the path
    /// exists neither in the stage nor in the shadow.
    pub fn remove_from_stage<S: AsRef<str>>(
        &mut self,
        db: &ObjectDatabase,
        path: &[S],
    ) -> StageResult<bool> {
        match path {
            [] => Err(StageError::EmptyPath),
            [leaf] => {
                let leaf = leaf.as_ref();
                self.staged_documents.remove(leaf);
                self.new_staged_documents.remove(leaf);
                self.removed_documents.insert(leaf.to_string());
                Ok(true)
            }
            [folder, rest @ ..] => {
                let folder = folder.as_ref();
                if !self.staged_trees.contains_key(folder)
                    && !self.shadow.children.contains_key(folder)
                {
                    return Ok(false);
                }
                self.child_mut(db, folder)?.remove_from_stage(db, rest)
            }
        }
    }

    /// Merge another writer's committed tree into this stage.
    ///
    /// Folders and leaves missing from the shadow are taken as they are.
    /// Folders that differ are merged recursively. A leaf that differs from
    /// the shadow is taken only if the incoming document was written by
    /// `commit_ref`; otherwise the shadow's value stays.
    pub fn apply(
        &mut self,
        db: &ObjectDatabase,
        incoming: &Tree,
        commit_ref: CommitId,
    ) -> StageResult<()> {
        for (name, incoming_ref) in &incoming.children {
            match self.shadow.children.get(name).copied() {
                Some(existing) if existing == *incoming_ref => {}
                Some(_) => {
                    let incoming_child = db.get_tree(incoming_ref)?;
                    self.child_mut(db, name)?
                        .apply(db, &incoming_child, commit_ref)?;
                }
                None => {
                    let incoming_child = db.get_tree(incoming_ref)?;
                    match self.staged_trees.entry(name.clone()) {
                        Entry::Occupied(entry) => {
                            entry.into_mut().apply(db, &incoming_child, commit_ref)?
                        }
                        Entry::Vacant(entry) => {
                            debug!(folder = %name, tree = %incoming_ref.short_hex(), "adopting folder");
                            entry.insert(StageTree::new(incoming_child, self.capacity));
                            self.adopted_trees.insert(name.clone());
                        }
                    }
                }
            }
        }

        if incoming.document_bags.is_empty() {
            return Ok(());
        }
        let shadow_leaves = self.shadow_leaves(db)?;
        for bag_ref in &incoming.document_bags {
            let bag = db.get_document_bag(&bag_ref.bag)?;
            for (leaf, doc_ref) in &bag.entries {
                match shadow_leaves.get(leaf) {
                    None => {
                        let document = db.get_document(doc_ref)?;
                        self.stage_leaf(leaf, document, true);
                    }
                    Some(existing) if existing == doc_ref => {}
                    Some(_) => {
                        let document = db.get_document(doc_ref)?;
                        if document.commit_ref == Some(commit_ref) {
                            debug!(leaf = %leaf, commit = %commit_ref, "merge conflict: incoming value accepted");
                            self.stage_leaf(leaf, document, false);
                        } else {
                            debug!(leaf = %leaf, commit = %commit_ref, "merge conflict: shadow value kept");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Every leaf of the shadow with its document reference.
    fn shadow_leaves(&self, db: &ObjectDatabase) -> StageResult<BTreeMap<String, ObjectId>> {
        let mut leaves = BTreeMap::new();
        for bag_ref in &self.shadow.document_bags {
            leaves.extend(db.get_document_bag(&bag_ref.bag)?.entries);
        }
        Ok(leaves)
    }

    fn is_pending(&self, leaf: &str) -> bool {
        self.staged_documents.contains_key(leaf)
            || self.new_staged_documents.contains_key(leaf)
            || self.removed_documents.contains(leaf)
    }

    /// Persist this level and every staged descendant, bottom-up.
    ///
    /// Returns the new tree reference and makes it the shadow. Pending
    /// edits are cleared only once the new tree is written, so a failed
    /// commit can be retried as is.
    pub fn commit_stage(
        &mut self,
        db: &ObjectDatabase,
        commit_ref: CommitId,
        collector: &mut CommitCollector,
        cache: &mut DocumentCache,
    ) -> StageResult<ObjectId> {
        let capacity = self.capacity;

        // Shadow bags either lose entries (rewrite), have room (may absorb
        // new entries) or are carried forward as they are.
        let mut need_to_save: Vec<DocumentBag> = Vec::new();
        let mut maybe_reuse: VecDeque<(ObjectId, DocumentBag)> = VecDeque::new();
        let mut untouched: Vec<(BagRef, bool)> = Vec::new();
        let mut evicted: BTreeSet<String> = BTreeSet::new();
        for bag_ref in &self.shadow.document_bags {
            let mut bag = db.get_document_bag(&bag_ref.bag)?;
            let before = bag.len();
            bag.entries.retain(|leaf, _| {
                if self.removed_documents.contains(leaf) {
                    evicted.insert(leaf.clone());
                }
                !self.is_pending(leaf)
            });
            if bag.len() != before {
                need_to_save.push(bag);
            } else if bag.len() < capacity {
                maybe_reuse.push_back((bag_ref.bag, bag));
                untouched.push((*bag_ref, true));
            } else {
                untouched.push((*bag_ref, false));
            }
        }
        for leaf in &evicted {
            collector.add_removed_doc_name(leaf);
        }

        let mut pending: BTreeMap<&String, &Document> = self.staged_documents.iter().collect();
        pending.extend(self.new_staged_documents.iter());
        for (leaf, document) in pending {
            let doc_ref = match cache.get(document) {
                Some(id) => id,
                None => {
                    let id = db.write_document(&document.stamped(commit_ref))?;
                    cache.insert(document.clone(), id);
                    id
                }
            };
            collector.add_doc_reference(doc_ref);
            collector.add_doc_name(leaf);

            let slot = match need_to_save.iter().position(|bag| bag.len() < capacity) {
                Some(slot) => slot,
                None => {
                    let bag = maybe_reuse
                        .pop_front()
                        .map(|(_, bag)| bag)
                        .unwrap_or_default();
                    need_to_save.push(bag);
                    need_to_save.len() - 1
                }
            };
            need_to_save[slot].insert(leaf.as_str(), doc_ref);
        }

        // Candidates that absorbed nothing keep their old reference.
        let unconsumed: HashSet<ObjectId> = maybe_reuse.iter().map(|(id, _)| *id).collect();
        let mut document_bags: Vec<BagRef> = untouched
            .into_iter()
            .filter(|(bag_ref, candidate)| {
                !candidate
                    || (unconsumed.contains(&bag_ref.bag)
                        && !self.removed_documents.contains(&bag_ref.bag.to_hex()))
            })
            .map(|(bag_ref, _)| bag_ref)
            .collect();

        for bag in need_to_save.iter().filter(|bag| !bag.is_empty()) {
            let id = db.write_document_bag(bag)?;
            document_bags.push(BagRef::new(id, bag.len()));
        }

        let mut children = self.shadow.children.clone();
        for (name, child) in self.staged_trees.iter_mut() {
            collector.enter_folder(name);
            let committed = child.commit_stage(db, commit_ref, collector, cache);
            collector.leave_folder();
            let child_ref = committed?;
            if self.shadow.children.get(name) != Some(&child_ref) {
                collector.add_tree_reference(child_ref);
                collector.add_folder_name(name);
            }
            children.insert(name.clone(), child_ref);
        }

        let tree = Tree {
            children,
            document_bags,
        };
        let id = db.write_tree(&tree)?;
        self.shadow = tree;
        self.staged_trees.clear();
        self.staged_documents.clear();
        self.new_staged_documents.clear();
        self.removed_documents.clear();
        self.adopted_trees.clear();
        Ok(id)
    }
}
