//! Bookkeeping for one commit pass.

use std::fmt;

use verso_types::ObjectId;

/// Accumulates what one commit changed.
///
/// The commit walk calls [`enter_folder`](Self::enter_folder) and
/// [`leave_folder`](Self::leave_folder) around each staged sub-tree, so
/// names recorded in between are qualified with the current folder path.
/// Callers feed the result to indexers and audit logs once the perspective
/// has moved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitCollector {
    path_parts: Vec<String>,
    doc_names: Vec<String>,
    removed_doc_names: Vec<String>,
    folder_names: Vec<String>,
    doc_references: Vec<ObjectId>,
    tree_references: Vec<ObjectId>,
}

impl CommitCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_folder(&mut self, name: &str) {
        self.path_parts.push(name.to_string());
    }

    pub fn leave_folder(&mut self) {
        self.path_parts.pop();
    }

    /// The folder currently being committed, `/`-joined. Empty at the root.
    pub fn current_path(&self) -> String {
        self.path_parts.join("/")
    }

    fn qualify(&self, name: &str) -> String {
        if self.path_parts.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.current_path(), name)
        }
    }

    /// Record an added or changed document in the current folder.
    pub fn add_doc_name(&mut self, name: &str) {
        let qualified = self.qualify(name);
        self.doc_names.push(qualified);
    }

    /// Record a removed document in the current folder.
    pub fn add_removed_doc_name(&mut self, name: &str) {
        let qualified = self.qualify(name);
        self.removed_doc_names.push(qualified);
    }

    /// Record a rewritten sub-folder of the current folder.
    pub fn add_folder_name(&mut self, name: &str) {
        let qualified = self.qualify(name);
        self.folder_names.push(qualified);
    }

    pub fn add_doc_reference(&mut self, id: ObjectId) {
        self.doc_references.push(id);
    }

    pub fn add_tree_reference(&mut self, id: ObjectId) {
        self.tree_references.push(id);
    }

    pub fn doc_names(&self) -> &[String] {
        &self.doc_names
    }

    pub fn removed_doc_names(&self) -> &[String] {
        &self.removed_doc_names
    }

    pub fn folder_names(&self) -> &[String] {
        &self.folder_names
    }

    pub fn doc_references(&self) -> &[ObjectId] {
        &self.doc_references
    }

    pub fn tree_references(&self) -> &[ObjectId] {
        &self.tree_references
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.doc_names.is_empty()
            && self.removed_doc_names.is_empty()
            && self.folder_names.is_empty()
            && self.doc_references.is_empty()
            && self.tree_references.is_empty()
    }
}

/// One line per change: `+ path` for written documents, `- path` for
/// removed ones, `~ path/` for rewritten folders.
impl fmt::Display for CommitCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.doc_names {
            writeln!(f, "+ {name}")?;
        }
        for name in &self.removed_doc_names {
            writeln!(f, "- {name}")?;
        }
        for name in &self.folder_names {
            writeln!(f, "~ {name}/")?;
        }
        Ok(())
    }
}
