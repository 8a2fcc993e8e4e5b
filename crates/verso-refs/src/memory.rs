//! In-memory [`PerspectiveStore`], for tests and embedding.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;
use verso_types::ObjectId;

use crate::error::{RefError, Result};
use crate::names::{validate_perspective_name, validate_tag_name};
use crate::traits::PerspectiveStore;
use crate::types::{Perspective, Tag};

/// Thread-safe, `BTreeMap`-backed perspective and tag store.
pub struct InMemoryPerspectiveStore {
    perspectives: RwLock<BTreeMap<String, Perspective>>,
    tags: RwLock<BTreeMap<String, Tag>>,
}

impl InMemoryPerspectiveStore {
    pub fn new() -> Self {
        Self {
            perspectives: RwLock::new(BTreeMap::new()),
            tags: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryPerspectiveStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RefError {
    RefError::LockPoisoned(e.to_string())
}

impl PerspectiveStore for InMemoryPerspectiveStore {
    fn read_perspective(&self, name: &str) -> Result<Option<Perspective>> {
        let map = self.perspectives.read().map_err(poisoned)?;
        Ok(map.get(name).cloned())
    }

    fn write_perspective(&self, perspective: &Perspective) -> Result<()> {
        validate_perspective_name(&perspective.name)?;
        let mut map = self.perspectives.write().map_err(poisoned)?;
        debug!(
            perspective = %perspective.name,
            head = %perspective.head.short_hex(),
            "perspective updated"
        );
        map.insert(perspective.name.clone(), perspective.clone());
        Ok(())
    }

    fn update_perspective(&self, perspective: &Perspective, expected_head: &ObjectId) -> Result<()> {
        let mut map = self.perspectives.write().map_err(poisoned)?;
        let stored = map
            .get_mut(&perspective.name)
            .ok_or_else(|| RefError::NotFound {
                name: perspective.name.clone(),
            })?;
        if stored.head != *expected_head {
            return Err(RefError::HeadMoved {
                name: perspective.name.clone(),
                expected: *expected_head,
                actual: stored.head,
            });
        }
        debug!(
            perspective = %perspective.name,
            from = %expected_head.short_hex(),
            head = %perspective.head.short_hex(),
            "perspective advanced"
        );
        *stored = perspective.clone();
        Ok(())
    }

    fn delete_perspective(&self, name: &str) -> Result<bool> {
        let mut map = self.perspectives.write().map_err(poisoned)?;
        Ok(map.remove(name).is_some())
    }

    fn list_perspectives(&self) -> Result<Vec<Perspective>> {
        let map = self.perspectives.read().map_err(poisoned)?;
        Ok(map.values().cloned().collect())
    }

    fn read_tag(&self, name: &str) -> Result<Option<Tag>> {
        let map = self.tags.read().map_err(poisoned)?;
        Ok(map.get(name).cloned())
    }

    fn write_tag(&self, tag: &Tag) -> Result<()> {
        validate_tag_name(&tag.name)?;
        let mut map = self.tags.write().map_err(poisoned)?;
        if map.contains_key(&tag.name) {
            return Err(RefError::TagImmutable {
                name: tag.name.clone(),
            });
        }
        map.insert(tag.name.clone(), tag.clone());
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<bool> {
        let mut map = self.tags.write().map_err(poisoned)?;
        Ok(map.remove(name).is_some())
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        let map = self.tags.read().map_err(poisoned)?;
        Ok(map.values().cloned().collect())
    }
}

impl std::fmt::Debug for InMemoryPerspectiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryPerspectiveStore").finish_non_exhaustive()
    }
}
