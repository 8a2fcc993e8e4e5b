use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, info, warn};
use verso_lock::{InMemoryLockManager, LockManager};
use verso_refs::{
    validate_perspective_name, InMemoryPerspectiveStore, Perspective, PerspectiveStore, RefError,
    Tag,
};
use verso_stage::Stage;
use verso_store::{
    CommitObject, Content, Document, InMemoryObjectStore, ObjectDatabase, ObjectStore, Tree,
};
use verso_types::{CommitId, DocPath, ObjectId};

use crate::commit::{CommitResult, CommitSummary, EntryKind, FolderEntry};
use crate::config::RepoConfig;
use crate::error::{RepoError, RepoResult};
use crate::listener::{ChangeListener, CommitEvent};

const SYSTEM_USER: &str = "admin";

/// A versioned document repository.
///
/// Every change is staged on a [`Stage`] and committed under a lock named
/// after the target perspective. Reads go straight to the perspective's
/// current root and never take the lock.
pub struct VersionedRepo {
    config: RepoConfig,
    db: ObjectDatabase,
    refs: Arc<dyn PerspectiveStore>,
    locks: Arc<dyn LockManager>,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl VersionedRepo {
    /// Open a repository over the given backends, creating the default
    /// perspective (an empty root and a "Repo creation" commit) if it does
    /// not exist yet.
    pub fn open(
        config: RepoConfig,
        store: Arc<dyn ObjectStore>,
        refs: Arc<dyn PerspectiveStore>,
        locks: Arc<dyn LockManager>,
    ) -> RepoResult<Self> {
        config.validate()?;
        let repo = Self {
            config,
            db: ObjectDatabase::new(store),
            refs,
            locks,
            listeners: RwLock::new(Vec::new()),
        };
        if repo
            .refs
            .read_perspective(&repo.config.default_perspective)?
            .is_none()
        {
            repo.init_default_perspective()?;
        }
        Ok(repo)
    }

    /// A repository backed entirely by in-memory stores.
    pub fn in_memory(config: RepoConfig) -> RepoResult<Self> {
        Self::open(
            config,
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryPerspectiveStore::new()),
            Arc::new(InMemoryLockManager::new()),
        )
    }

    fn init_default_perspective(&self) -> RepoResult<()> {
        let name = &self.config.default_perspective;
        let root = self.db.write_tree(&Tree::empty())?;
        let record = CommitObject {
            id: CommitId::new(),
            tree: root,
            parent: None,
            user: SYSTEM_USER.into(),
            comment: "Repo creation".into(),
            when: Utc::now(),
            changes: String::new(),
            doc_references: Vec::new(),
            tree_references: vec![root],
        };
        let head = self.db.write_commit(&record)?;
        let perspective = Perspective::new(name.as_str(), head, root, SYSTEM_USER)
            .with_description("Default perspective");
        self.refs.write_perspective(&perspective)?;
        info!(perspective = %name, head = %head.short_hex(), "perspective initialized");
        Ok(())
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn database(&self) -> &ObjectDatabase {
        &self.db
    }

    /// Register a listener for every future successful commit.
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    // ---- Perspectives ----

    pub fn perspective(&self, name: &str) -> RepoResult<Perspective> {
        self.refs
            .read_perspective(name)?
            .ok_or_else(|| RepoError::PerspectiveNotFound(name.to_string()))
    }

    pub fn perspectives(&self) -> RepoResult<Vec<Perspective>> {
        Ok(self.refs.list_perspectives()?)
    }

    /// Fork a new perspective at the current head of `base`.
    pub fn create_perspective(&self, base: &str, name: &str, owner: &str) -> RepoResult<Perspective> {
        validate_perspective_name(name)?;
        if self.refs.read_perspective(name)?.is_some() {
            return Err(RefError::AlreadyExists { name: name.into() }.into());
        }
        let base = self.perspective(base)?;
        let perspective = Perspective::new(name, base.head, base.root, owner)
            .with_description(format!("Forked from {}", base.name));
        self.refs.write_perspective(&perspective)?;
        info!(perspective = name, base = %base.name, head = %base.head.short_hex(), "perspective created");
        Ok(perspective)
    }

    /// Merge every commit made on `source` since it forked (or last merged)
    /// into `target`.
    ///
    /// Fails with [`RepoError::PerspectiveMoved`] if `source` gained
    /// commits while the merge ran; the target keeps the merge commit and a
    /// later merge picks up the rest.
    ///
    /// Source commits are applied oldest-first, each with its own commit
    /// id, so a document is taken from the source only if a source commit
    /// wrote it. Afterwards both perspectives point at the merge commit.
    /// Returns `None` when the source has nothing new.
    pub fn merge_perspective(
        &self,
        target: &str,
        source: &str,
        user: &str,
    ) -> RepoResult<Option<CommitResult>> {
        let source_perspective = self.perspective(source)?;
        let mut pending = Vec::new();
        let mut cursor = Some(source_perspective.head);
        while let Some(head) = cursor {
            if head == source_perspective.base_commit {
                break;
            }
            let record = self.db.get_commit(&head)?;
            cursor = record.parent;
            pending.push(record);
        }
        if pending.is_empty() {
            debug!(into = target, from = source, "nothing to merge");
            return Ok(None);
        }

        let mut stage = self.create_stage(target)?;
        for record in pending.iter().rev() {
            let tree = self.db.get_tree(&record.tree)?;
            stage.apply(&self.db, &tree, record.id)?;
        }
        let result = self.commit_stage(&mut stage, user, &format!("Merge from {source}"))?;

        self.with_lock(source, || {
            let mut moved = self.perspective(source)?;
            moved.advance(result.head, result.root);
            moved.base_commit = result.head;
            self.publish(&moved, source_perspective.head)
        })?;
        info!(
            into = target,
            from = source,
            commits = pending.len(),
            head = %result.head.short_hex(),
            "perspective merged"
        );
        Ok(Some(result))
    }

    // ---- Staging and commits ----

    /// A stage over the perspective's current root.
    pub fn create_stage(&self, perspective: &str) -> RepoResult<Stage> {
        let perspective = self.perspective(perspective)?;
        Ok(Stage::open(&self.db, perspective, self.config.capacity)?)
    }

    pub fn add_to_stage(
        &self,
        stage: &mut Stage,
        path: &str,
        document: Document,
        must_be_new: bool,
    ) -> RepoResult<()> {
        let path = DocPath::parse(path)?;
        stage.add_document_to_stage(&self.db, &path, document, must_be_new)?;
        Ok(())
    }

    pub fn remove_from_stage(&self, stage: &mut Stage, path: &str) -> RepoResult<bool> {
        let path = DocPath::parse(path)?;
        Ok(stage.remove_from_stage(&self.db, &path)?)
    }

    /// Commit a stage and move its perspective to the result.
    ///
    /// Fails with [`RepoError::PerspectiveMoved`] if another commit landed
    /// on the perspective after the stage was created, including one made
    /// while this commit outlived its lock lease. The stage is left as it
    /// was. Listeners are notified after the perspective has moved.
    pub fn commit_stage(
        &self,
        stage: &mut Stage,
        user: &str,
        comment: &str,
    ) -> RepoResult<CommitResult> {
        let name = stage.perspective_name().to_string();
        let result = self.with_lock(&name, || self.commit_locked(stage, user, comment))?;

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let event = CommitEvent {
            perspective: &result.perspective,
            commit_id: result.commit_id,
            head: result.head,
            root: result.root,
            collector: &result.collector,
        };
        for listener in &listeners {
            listener.on_commit(&event);
        }
        Ok(result)
    }

    fn commit_locked(&self, stage: &mut Stage, user: &str, comment: &str) -> RepoResult<CommitResult> {
        let current = self.perspective(stage.perspective_name())?;
        if current.head != stage.perspective().head {
            return Err(RepoError::PerspectiveMoved {
                perspective: current.name,
                expected: stage.perspective().head,
                actual: current.head,
            });
        }

        let commit_id = CommitId::new();
        let mut next = stage.clone();
        let (root, collector) = next.commit_stage(&self.db, commit_id)?;
        let mut tree_references = collector.tree_references().to_vec();
        tree_references.push(root);
        let record = CommitObject {
            id: commit_id,
            tree: root,
            parent: Some(current.head),
            user: user.into(),
            comment: comment.into(),
            when: Utc::now(),
            changes: collector.to_string(),
            doc_references: collector.doc_references().to_vec(),
            tree_references,
        };
        let head = self.db.write_commit(&record)?;

        let expected = current.head;
        let mut moved = current;
        moved.advance(head, root);
        self.publish(&moved, expected)?;
        info!(
            perspective = %moved.name,
            commit = %commit_id,
            head = %head.short_hex(),
            root = %root.short_hex(),
            documents = collector.doc_names().len(),
            "commit applied"
        );
        let perspective = moved.name.clone();
        next.rebind(moved);
        *stage = next;

        Ok(CommitResult {
            perspective,
            commit_id,
            head,
            root,
            collector,
        })
    }

    /// Store `moved` only if the perspective is still at `expected`.
    fn publish(&self, moved: &Perspective, expected: ObjectId) -> RepoResult<()> {
        match self.refs.update_perspective(moved, &expected) {
            Ok(()) => Ok(()),
            Err(RefError::HeadMoved {
                name,
                expected,
                actual,
            }) => {
                warn!(
                    perspective = %name,
                    expected = %expected.short_hex(),
                    actual = %actual.short_hex(),
                    "perspective moved under a running commit"
                );
                Err(RepoError::PerspectiveMoved {
                    perspective: name,
                    expected,
                    actual,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run `f` while holding the lock on `resource`. The lock is released
    /// whether `f` succeeds or fails.
    fn with_lock<T>(&self, resource: &str, f: impl FnOnce() -> RepoResult<T>) -> RepoResult<T> {
        let handle = self
            .locks
            .acquire(resource, self.config.lock_wait, self.config.lock_hold)?
            .ok_or_else(|| {
                warn!(resource, wait = ?self.config.lock_wait, "lock acquire timed out");
                RepoError::LockTimeout(resource.to_string())
            })?;
        let outcome = f();
        match self.locks.release(resource, &handle) {
            Ok(true) => {}
            Ok(false) => warn!(resource, %handle, "lock lease expired before release"),
            Err(e) => warn!(resource, %handle, error = %e, "lock release failed"),
        }
        outcome
    }

    // ---- One-shot writes ----

    /// Write one document and commit.
    ///
    /// With `must_be_new`, fails with [`RepoError::AlreadyExists`] if the
    /// path already holds a document.
    pub fn put_document(
        &self,
        perspective: &str,
        path: &str,
        content: Content,
        user: &str,
        comment: &str,
        must_be_new: bool,
    ) -> RepoResult<CommitResult> {
        self.put_documents(perspective, &[path], content, user, comment, must_be_new)
    }

    /// Write the same document under several paths in one commit. The
    /// document is stored once.
    pub fn put_documents(
        &self,
        perspective: &str,
        paths: &[&str],
        content: Content,
        user: &str,
        comment: &str,
        must_be_new: bool,
    ) -> RepoResult<CommitResult> {
        let mut stage = self.create_stage(perspective)?;
        let document = Document::new(content);
        for path in paths {
            let parsed = DocPath::parse(path)?;
            if must_be_new && self.find_document(&stage.perspective().root, &parsed)?.is_some() {
                return Err(RepoError::AlreadyExists(parsed.to_string()));
            }
            stage.add_document_to_stage(&self.db, &parsed, document.clone(), must_be_new)?;
        }
        self.commit_stage(&mut stage, user, comment)
    }

    /// Remove a document and commit. Returns `false` (and commits nothing)
    /// if there is no document at `path`.
    pub fn remove_document(
        &self,
        perspective: &str,
        path: &str,
        user: &str,
        comment: &str,
    ) -> RepoResult<bool> {
        let mut stage = self.create_stage(perspective)?;
        let parsed = DocPath::parse(path)?;
        if self.find_document(&stage.perspective().root, &parsed)?.is_none() {
            return Ok(false);
        }
        stage.remove_from_stage(&self.db, &parsed)?;
        self.commit_stage(&mut stage, user, comment)?;
        Ok(true)
    }

    // ---- Reads ----

    pub fn get_document(&self, perspective: &str, path: &str) -> RepoResult<Option<Document>> {
        let root = self.perspective(perspective)?.root;
        self.read_document(&root, path)
    }

    /// Read a document as of a commit record.
    pub fn get_document_at(&self, commit: &ObjectId, path: &str) -> RepoResult<Option<Document>> {
        let record = self.db.get_commit(commit)?;
        self.read_document(&record.tree, path)
    }

    /// Whether each path holds a document.
    pub fn exists(&self, perspective: &str, paths: &[&str]) -> RepoResult<Vec<bool>> {
        let root = self.perspective(perspective)?.root;
        paths
            .iter()
            .map(|path| {
                let parsed = DocPath::parse(path)?;
                Ok(self.find_document(&root, &parsed)?.is_some())
            })
            .collect()
    }

    fn read_document(&self, root: &ObjectId, path: &str) -> RepoResult<Option<Document>> {
        let parsed = DocPath::parse(path)?;
        match self.find_document(root, &parsed)? {
            Some(id) => Ok(Some(self.db.get_document(&id)?)),
            None => Ok(None),
        }
    }

    /// Walk folders from `root`; `None` if a folder is missing.
    fn find_tree(&self, root: &ObjectId, folders: &[String]) -> RepoResult<Option<Tree>> {
        let mut tree = self.db.get_tree(root)?;
        for folder in folders {
            let Some(child) = tree.child(folder).copied() else {
                return Ok(None);
            };
            tree = self.db.get_tree(&child)?;
        }
        Ok(Some(tree))
    }

    fn find_document(&self, root: &ObjectId, path: &DocPath) -> RepoResult<Option<ObjectId>> {
        let Some(tree) = self.find_tree(root, path.folders())? else {
            return Ok(None);
        };
        for bag_ref in &tree.document_bags {
            let bag = self.db.get_document_bag(&bag_ref.bag)?;
            if let Some(id) = bag.get(path.leaf()) {
                return Ok(Some(*id));
            }
        }
        Ok(None)
    }

    /// Immediate contents of a folder: documents first, then sub-folders,
    /// each sorted by name. `""` or `"/"` lists the root.
    pub fn list_folder(&self, perspective: &str, folder: &str) -> RepoResult<Vec<FolderEntry>> {
        let root = self.perspective(perspective)?.root;
        let trimmed = folder.trim_matches('/');
        let folders: Vec<String> = if trimmed.is_empty() {
            Vec::new()
        } else {
            DocPath::parse(trimmed)?.into_segments()
        };
        let tree = self
            .find_tree(&root, &folders)?
            .ok_or_else(|| RepoError::FolderNotFound(folder.to_string()))?;

        let qualify = |name: &str| {
            if trimmed.is_empty() {
                name.to_string()
            } else {
                format!("{trimmed}/{name}")
            }
        };
        let mut documents = Vec::new();
        for bag_ref in &tree.document_bags {
            let bag = self.db.get_document_bag(&bag_ref.bag)?;
            documents.extend(bag.entries.into_keys());
        }
        documents.sort();

        let mut entries: Vec<FolderEntry> = documents
            .into_iter()
            .map(|name| FolderEntry {
                path: qualify(&name),
                name,
                kind: EntryKind::Document,
            })
            .collect();
        entries.extend(tree.children.keys().map(|name| FolderEntry {
            path: qualify(name),
            name: name.clone(),
            kind: EntryKind::Folder,
        }));
        Ok(entries)
    }

    /// Visit every document whose full path starts with `prefix`, depth
    /// first, documents of a folder before its sub-folders. The visitor
    /// returns `false` to stop early.
    pub fn visit_all<F>(&self, perspective: &str, prefix: &str, mut visitor: F) -> RepoResult<()>
    where
        F: FnMut(&str, &Document) -> bool,
    {
        let root = self.perspective(perspective)?.root;
        let prefix = prefix.trim_start_matches('/');
        self.visit_tree(&root, "", prefix, &mut visitor)?;
        Ok(())
    }

    fn visit_tree<F>(&self, id: &ObjectId, folder: &str, prefix: &str, visitor: &mut F) -> RepoResult<bool>
    where
        F: FnMut(&str, &Document) -> bool,
    {
        let tree = self.db.get_tree(id)?;
        let mut leaves = Vec::new();
        for bag_ref in &tree.document_bags {
            leaves.extend(self.db.get_document_bag(&bag_ref.bag)?.entries);
        }
        leaves.sort();
        for (leaf, doc_id) in leaves {
            let path = format!("{folder}{leaf}");
            if path.starts_with(prefix) {
                let document = self.db.get_document(&doc_id)?;
                if !visitor(&path, &document) {
                    return Ok(false);
                }
            }
        }
        for (name, child) in &tree.children {
            let child_folder = format!("{folder}{name}/");
            if (child_folder.starts_with(prefix) || prefix.starts_with(&child_folder))
                && !self.visit_tree(child, &child_folder, prefix, visitor)?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ---- History ----

    /// Up to `limit` commits, newest first.
    pub fn history(&self, perspective: &str, limit: usize) -> RepoResult<Vec<CommitSummary>> {
        let head = self.perspective(perspective)?.head;
        let mut out = Vec::new();
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            if out.len() >= limit {
                break;
            }
            let record = self.db.get_commit(&id)?;
            cursor = record.parent;
            out.push(CommitSummary::from_record(id, &record));
        }
        Ok(out)
    }

    /// Commits after `since` (exclusive), newest first. If `since` is not
    /// an ancestor of the head, the whole history is returned.
    pub fn commits_since(&self, perspective: &str, since: &ObjectId) -> RepoResult<Vec<CommitSummary>> {
        let head = self.perspective(perspective)?.head;
        let mut out = Vec::new();
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            if id == *since {
                break;
            }
            let record = self.db.get_commit(&id)?;
            cursor = record.parent;
            out.push(CommitSummary::from_record(id, &record));
        }
        Ok(out)
    }

    // ---- Tags ----

    /// Tag the current head of `perspective`.
    pub fn create_tag(&self, perspective: &str, name: &str, owner: &str) -> RepoResult<Tag> {
        let head = self.perspective(perspective)?.head;
        let tag = Tag::new(name, head, perspective, owner);
        self.refs.write_tag(&tag)?;
        info!(tag = name, perspective, head = %head.short_hex(), "tag created");
        Ok(tag)
    }

    pub fn tag(&self, name: &str) -> RepoResult<Tag> {
        self.refs
            .read_tag(name)?
            .ok_or_else(|| RepoError::TagNotFound(name.to_string()))
    }

    /// Read a document as of a tag.
    pub fn get_tag_document(&self, tag: &str, path: &str) -> RepoResult<Option<Document>> {
        let tag = self.tag(tag)?;
        self.get_document_at(&tag.commit, path)
    }

    pub fn tags(&self) -> RepoResult<Vec<Tag>> {
        Ok(self.refs.list_tags()?)
    }

    pub fn remove_tag(&self, name: &str) -> RepoResult<bool> {
        Ok(self.refs.delete_tag(name)?)
    }
}

impl std::fmt::Debug for VersionedRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedRepo")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use verso_store::{FileObjectStore, ObjectKind, StoreResult, StoredObject};

    fn repo() -> VersionedRepo {
        VersionedRepo::in_memory(RepoConfig::default()).unwrap()
    }

    fn text(repo: &VersionedRepo, perspective: &str, path: &str) -> Option<String> {
        repo.get_document(perspective, path)
            .unwrap()
            .and_then(|d| d.content.as_str().map(str::to_string))
    }

    fn put(repo: &VersionedRepo, perspective: &str, path: &str, value: &str) -> CommitResult {
        repo.put_document(perspective, path, Content::text(value), "tester", "put", false)
            .unwrap()
    }

    #[test]
    fn open_creates_default_perspective() {
        let repo = repo();
        let main = repo.perspective("main").unwrap();
        assert_eq!(main.base_commit, main.head);
        assert_eq!(repo.database().get_tree(&main.root).unwrap(), Tree::empty());

        let history = repo.history("main", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].comment, "Repo creation");
        assert_eq!(history[0].user, "admin");
        assert!(history[0].parent.is_none());
    }

    #[test]
    fn reopen_keeps_existing_perspective() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let refs: Arc<dyn PerspectiveStore> = Arc::new(InMemoryPerspectiveStore::new());
        let locks: Arc<dyn LockManager> = Arc::new(InMemoryLockManager::new());
        let repo = VersionedRepo::open(RepoConfig::default(), store.clone(), refs.clone(), locks.clone()).unwrap();
        put(&repo, "main", "a/x", "1");
        let head = repo.perspective("main").unwrap().head;

        let reopened = VersionedRepo::open(RepoConfig::default(), store, refs, locks).unwrap();
        assert_eq!(reopened.perspective("main").unwrap().head, head);
        assert_eq!(text(&reopened, "main", "a/x").as_deref(), Some("1"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = VersionedRepo::in_memory(RepoConfig::default().with_capacity(0)).unwrap_err();
        assert!(matches!(err, RepoError::InvalidConfig(_)));
    }

    #[test]
    fn put_get_and_overwrite() {
        let repo = repo();
        put(&repo, "main", "/orders/o1", "v1");
        assert_eq!(text(&repo, "main", "orders/o1").as_deref(), Some("v1"));
        put(&repo, "main", "orders/o1", "v2");
        assert_eq!(text(&repo, "main", "orders/o1").as_deref(), Some("v2"));
        assert_eq!(text(&repo, "main", "orders/missing"), None);
        assert_eq!(text(&repo, "main", "nofolder/x"), None);
    }

    #[test]
    fn must_be_new_rejects_existing() {
        let repo = repo();
        repo.put_document("main", "a/x", Content::text("1"), "t", "c", true)
            .unwrap();
        let err = repo
            .put_document("main", "a/x", Content::text("2"), "t", "c", true)
            .unwrap_err();
        assert!(matches!(err, RepoError::AlreadyExists(p) if p == "a/x"));
        assert_eq!(text(&repo, "main", "a/x").as_deref(), Some("1"));
    }

    #[test]
    fn documents_carry_their_commit() {
        let repo = repo();
        let result = put(&repo, "main", "x", "1");
        let doc = repo.get_document("main", "x").unwrap().unwrap();
        assert_eq!(doc.commit_ref, Some(result.commit_id));
    }

    #[test]
    fn put_documents_writes_content_once() {
        let repo = repo();
        let result = repo
            .put_documents("main", &["a/one", "b/two"], Content::text("same"), "t", "c", false)
            .unwrap();
        let refs = result.collector.doc_references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], refs[1]);
        assert_eq!(text(&repo, "main", "b/two").as_deref(), Some("same"));
    }

    #[test]
    fn remove_document() {
        let repo = repo();
        put(&repo, "main", "a/x", "1");
        put(&repo, "main", "a/y", "2");
        let before = repo.perspective("main").unwrap().head;

        assert!(repo.remove_document("main", "a/x", "t", "rm").unwrap());
        assert_eq!(text(&repo, "main", "a/x"), None);
        assert_eq!(text(&repo, "main", "a/y").as_deref(), Some("2"));
        // Older commits still see the document.
        assert!(repo.get_document_at(&before, "a/x").unwrap().is_some());

        let head = repo.perspective("main").unwrap().head;
        assert!(!repo.remove_document("main", "a/x", "t", "rm").unwrap());
        assert_eq!(repo.perspective("main").unwrap().head, head);
    }

    #[test]
    fn exists_reports_each_path() {
        let repo = repo();
        put(&repo, "main", "a/x", "1");
        assert_eq!(
            repo.exists("main", &["a/x", "a/y", "b/x"]).unwrap(),
            vec![true, false, false]
        );
    }

    #[test]
    fn invalid_path_is_an_error() {
        let repo = repo();
        assert!(matches!(
            repo.get_document("main", "a//b"),
            Err(RepoError::Path(_))
        ));
    }

    #[test]
    fn unknown_perspective() {
        let repo = repo();
        assert!(matches!(
            repo.get_document("nope", "x"),
            Err(RepoError::PerspectiveNotFound(_))
        ));
    }

    #[test]
    fn stale_stage_is_refused() {
        let repo = repo();
        let mut stale = repo.create_stage("main").unwrap();
        repo.add_to_stage(&mut stale, "x", Document::text("late"), false)
            .unwrap();
        put(&repo, "main", "y", "first");

        let err = repo.commit_stage(&mut stale, "t", "c").unwrap_err();
        assert!(matches!(err, RepoError::PerspectiveMoved { .. }));
        assert_eq!(text(&repo, "main", "x"), None);

        // The lock was released on failure.
        put(&repo, "main", "z", "after");
        assert_eq!(text(&repo, "main", "z").as_deref(), Some("after"));
    }

    #[test]
    fn stage_can_be_reused_across_commits() {
        let repo = repo();
        let mut stage = repo.create_stage("main").unwrap();
        repo.add_to_stage(&mut stage, "a/x", Document::text("1"), true)
            .unwrap();
        repo.commit_stage(&mut stage, "t", "one").unwrap();
        assert!(repo.remove_from_stage(&mut stage, "a/x").unwrap());
        repo.add_to_stage(&mut stage, "a/y", Document::text("2"), true)
            .unwrap();
        let result = repo.commit_stage(&mut stage, "t", "two").unwrap();

        assert_eq!(result.collector.doc_names(), ["a/y"]);
        assert_eq!(result.collector.removed_doc_names(), ["a/x"]);
        assert_eq!(text(&repo, "main", "a/x"), None);
        assert_eq!(text(&repo, "main", "a/y").as_deref(), Some("2"));
    }

    #[test]
    fn commit_times_out_when_locked() {
        let locks = Arc::new(InMemoryLockManager::new());
        let config = RepoConfig {
            lock_wait: Duration::from_millis(20),
            ..RepoConfig::default()
        };
        let repo = VersionedRepo::open(
            config,
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryPerspectiveStore::new()),
            locks.clone(),
        )
        .unwrap();
        let _held = locks
            .acquire("main", Duration::ZERO, Duration::from_secs(5))
            .unwrap()
            .unwrap();
        let err = repo
            .put_document("main", "x", Content::text("1"), "t", "c", false)
            .unwrap_err();
        assert!(matches!(err, RepoError::LockTimeout(name) if name == "main"));
    }

    /// Sleeps once, on the first commit record written after arming.
    #[derive(Default)]
    struct StallingStore {
        inner: InMemoryObjectStore,
        armed: AtomicBool,
    }

    impl ObjectStore for StallingStore {
        fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
            self.inner.read(id)
        }

        fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
            if object.kind == ObjectKind::Commit && self.armed.swap(false, Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(300));
            }
            self.inner.write(object)
        }

        fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
            self.inner.exists(id)
        }

        fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
            self.inner.delete(id)
        }
    }

    #[test]
    fn commit_outliving_its_lease_cannot_overwrite_newer_head() {
        let store = Arc::new(StallingStore::default());
        let config = RepoConfig {
            lock_hold: Duration::from_millis(50),
            ..RepoConfig::default()
        };
        let repo = VersionedRepo::open(
            config,
            store.clone(),
            Arc::new(InMemoryPerspectiveStore::new()),
            Arc::new(InMemoryLockManager::new()),
        )
        .unwrap();
        store.armed.store(true, Ordering::SeqCst);

        let slow = thread::scope(|s| {
            let slow = s.spawn(|| {
                repo.put_document("main", "a", Content::text("slow"), "t", "c", false)
            });
            thread::sleep(Duration::from_millis(120));
            put(&repo, "main", "b", "fast");
            slow.join().expect("slow writer panicked")
        });

        assert!(matches!(slow, Err(RepoError::PerspectiveMoved { .. })));
        assert_eq!(text(&repo, "main", "a"), None);
        assert_eq!(text(&repo, "main", "b").as_deref(), Some("fast"));
        assert_eq!(repo.history("main", 10).unwrap().len(), 2);
    }

    #[test]
    fn list_folder_contents() {
        let repo = repo();
        put(&repo, "main", "data/b", "1");
        put(&repo, "main", "data/a", "2");
        put(&repo, "main", "data/sub/c", "3");
        put(&repo, "main", "top", "4");

        let entries = repo.list_folder("main", "data").unwrap();
        let listed: Vec<(&str, &str, bool)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.path.as_str(), e.is_folder()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("a", "data/a", false),
                ("b", "data/b", false),
                ("sub", "data/sub", true),
            ]
        );

        let root = repo.list_folder("main", "/").unwrap();
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].name, "top");
        assert_eq!(root[1].kind, EntryKind::Folder);

        assert!(matches!(
            repo.list_folder("main", "data/none"),
            Err(RepoError::FolderNotFound(_))
        ));
    }

    #[test]
    fn visit_all_with_prefix_and_early_stop() {
        let repo = repo();
        for (path, value) in [("a/x", "1"), ("a/b/y", "2"), ("ab/z", "3"), ("c/w", "4")] {
            put(&repo, "main", path, value);
        }

        let mut seen = Vec::new();
        repo.visit_all("main", "a", |path, _| {
            seen.push(path.to_string());
            true
        })
        .unwrap();
        assert_eq!(seen, ["a/x", "a/b/y", "ab/z"]);

        let mut seen = Vec::new();
        repo.visit_all("main", "a/", |path, _| {
            seen.push(path.to_string());
            true
        })
        .unwrap();
        assert_eq!(seen, ["a/x", "a/b/y"]);

        let mut count = 0;
        repo.visit_all("main", "", |_, _| {
            count += 1;
            count < 2
        })
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn history_and_commits_since() {
        let repo = repo();
        let start = repo.perspective("main").unwrap().head;
        put(&repo, "main", "x", "1");
        let middle = repo.perspective("main").unwrap().head;
        put(&repo, "main", "y", "2");

        let history = repo.history("main", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].changes.contains("+ y"));
        assert_eq!(history[0].parent, Some(middle));

        assert_eq!(repo.commits_since("main", &start).unwrap().len(), 2);
        assert_eq!(repo.commits_since("main", &middle).unwrap().len(), 1);
        assert_eq!(repo.history("main", 100).unwrap().len(), 3);
    }

    #[test]
    fn tags_pin_a_commit() {
        let repo = repo();
        put(&repo, "main", "x", "1");
        repo.create_tag("main", "v1", "t").unwrap();
        put(&repo, "main", "x", "2");

        let old = repo.get_tag_document("v1", "x").unwrap().unwrap();
        assert_eq!(old.content.as_str(), Some("1"));
        assert!(matches!(
            repo.create_tag("main", "v1", "t"),
            Err(RepoError::Ref(RefError::TagImmutable { .. }))
        ));
        assert_eq!(repo.tags().unwrap().len(), 1);
        assert!(repo.remove_tag("v1").unwrap());
        assert!(matches!(
            repo.get_tag_document("v1", "x"),
            Err(RepoError::TagNotFound(_))
        ));
    }

    #[test]
    fn perspectives_fork_and_diverge() {
        let repo = repo();
        put(&repo, "main", "x", "base");
        let fork = repo.create_perspective("main", "dev", "t").unwrap();
        assert_eq!(fork.base_commit, repo.perspective("main").unwrap().head);

        put(&repo, "dev", "x", "dev");
        assert_eq!(text(&repo, "main", "x").as_deref(), Some("base"));
        assert_eq!(text(&repo, "dev", "x").as_deref(), Some("dev"));

        assert!(matches!(
            repo.create_perspective("main", "dev", "t"),
            Err(RepoError::Ref(RefError::AlreadyExists { .. }))
        ));
        assert!(matches!(
            repo.create_perspective("main", "bad name", "t"),
            Err(RepoError::Ref(RefError::InvalidName { .. }))
        ));
        assert_eq!(repo.perspectives().unwrap().len(), 2);
    }

    #[test]
    fn merge_brings_source_commits_into_target() {
        let repo = repo();
        put(&repo, "main", "shared", "base");
        put(&repo, "main", "mine", "base");
        repo.create_perspective("main", "dev", "t").unwrap();

        put(&repo, "dev", "shared", "dev-1");
        put(&repo, "dev", "f/new", "dev-2");
        put(&repo, "main", "mine", "main");

        let result = repo.merge_perspective("main", "dev", "t").unwrap().unwrap();
        assert_eq!(text(&repo, "main", "shared").as_deref(), Some("dev-1"));
        assert_eq!(text(&repo, "main", "f/new").as_deref(), Some("dev-2"));
        assert_eq!(text(&repo, "main", "mine").as_deref(), Some("main"));

        let dev = repo.perspective("dev").unwrap();
        assert_eq!(dev.head, result.head);
        assert_eq!(dev.base_commit, result.head);
        assert_eq!(text(&repo, "dev", "mine").as_deref(), Some("main"));

        assert!(repo.merge_perspective("main", "dev", "t").unwrap().is_none());
    }

    #[test]
    fn merge_keeps_target_value_for_untouched_source_documents() {
        let repo = repo();
        put(&repo, "main", "x", "base");
        put(&repo, "main", "y", "base");
        repo.create_perspective("main", "dev", "t").unwrap();
        put(&repo, "main", "x", "main");
        put(&repo, "dev", "y", "dev");

        repo.merge_perspective("main", "dev", "t").unwrap();
        assert_eq!(text(&repo, "main", "x").as_deref(), Some("main"));
        assert_eq!(text(&repo, "main", "y").as_deref(), Some("dev"));
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ChangeListener for Recorder {
        fn on_commit(&self, event: &CommitEvent<'_>) {
            self.events
                .lock()
                .unwrap()
                .push((event.perspective.to_string(), event.collector.doc_names().to_vec()));
        }
    }

    #[test]
    fn listeners_see_successful_commits() {
        let repo = repo();
        let recorder = Arc::new(Recorder::default());
        repo.subscribe(recorder.clone());

        put(&repo, "main", "a/x", "1");
        let mut stale = repo.create_stage("main").unwrap();
        repo.add_to_stage(&mut stale, "b", Document::text("2"), false)
            .unwrap();
        put(&repo, "main", "c", "3");
        assert!(repo.commit_stage(&mut stale, "t", "c").is_err());

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ("main".to_string(), vec!["a/x".to_string()]),
                ("main".to_string(), vec!["c".to_string()]),
            ]
        );
    }

    #[test]
    fn file_backed_repository() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FileObjectStore::open(dir.path()).unwrap());
        let refs: Arc<dyn PerspectiveStore> = Arc::new(InMemoryPerspectiveStore::new());
        let locks: Arc<dyn LockManager> = Arc::new(InMemoryLockManager::new());
        let repo = VersionedRepo::open(RepoConfig::default().with_capacity(2), store, refs, locks)
            .unwrap();
        for i in 0..5 {
            put(&repo, "main", &format!("docs/d{i}"), &i.to_string());
        }
        assert_eq!(text(&repo, "main", "docs/d3").as_deref(), Some("3"));
        assert_eq!(repo.list_folder("main", "docs").unwrap().len(), 5);
    }
}
