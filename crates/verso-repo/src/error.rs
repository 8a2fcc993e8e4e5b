use thiserror::Error;
use verso_types::ObjectId;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("perspective not found: {0}")]
    PerspectiveNotFound(String),

    /// The perspective advanced after the stage was created.
    #[error("perspective {perspective} moved: staged on {expected}, now at {actual}")]
    PerspectiveMoved {
        perspective: String,
        expected: ObjectId,
        actual: ObjectId,
    },

    #[error("timed out waiting for lock on {0}")]
    LockTimeout(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("folder not found: {0}")]
    FolderNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid path: {0}")]
    Path(#[from] verso_types::TypeError),

    #[error("store error: {0}")]
    Store(#[from] verso_store::StoreError),

    #[error("stage error: {0}")]
    Stage(#[from] verso_stage::StageError),

    #[error("ref error: {0}")]
    Ref(#[from] verso_refs::RefError),

    #[error("lock error: {0}")]
    Lock(#[from] verso_lock::LockError),
}

pub type RepoResult<T> = Result<T, RepoError>;
