use std::time::Duration;

use serde::{Deserialize, Serialize};
use verso_refs::validate_perspective_name;

use crate::error::{RepoError, RepoResult};

/// Repository-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Maximum entries per document bag.
    pub capacity: usize,
    /// Perspective created when the repository is first opened.
    pub default_perspective: String,
    /// How long a commit waits for a competing commit on the same
    /// perspective.
    pub lock_wait: Duration,
    /// Lease length of a commit lock.
    pub lock_hold: Duration,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            default_perspective: "main".into(),
            lock_wait: Duration::from_secs(5),
            lock_hold: Duration::from_secs(5),
        }
    }
}

impl RepoConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> RepoResult<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| RepoError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn validate(&self) -> RepoResult<()> {
        if self.capacity == 0 {
            return Err(RepoError::InvalidConfig("capacity must be at least 1".into()));
        }
        if self.lock_hold.is_zero() {
            return Err(RepoError::InvalidConfig("lock_hold must be positive".into()));
        }
        validate_perspective_name(&self.default_perspective)
            .map_err(|e| RepoError::InvalidConfig(e.to_string()))
    }
}
