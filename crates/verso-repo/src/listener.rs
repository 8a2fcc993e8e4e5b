use verso_stage::CommitCollector;
use verso_types::{CommitId, ObjectId};

/// A successful commit, as seen by listeners.
#[derive(Clone, Copy, Debug)]
pub struct CommitEvent<'a> {
    pub perspective: &'a str,
    pub commit_id: CommitId,
    /// The new commit record.
    pub head: ObjectId,
    /// The new root tree.
    pub root: ObjectId,
    pub collector: &'a CommitCollector,
}

/// Receives every commit after its perspective has moved. Search indexers
/// and audit logs hook in here.
pub trait ChangeListener: Send + Sync {
    fn on_commit(&self, event: &CommitEvent<'_>);
}
