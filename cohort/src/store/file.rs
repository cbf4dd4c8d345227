//! File-based implementation of the GroupStore trait.
//!
//! Each record is a pretty-printed JSON file:
//!
//! ```text
//! <base>/categories/<category-id>.json
//! <base>/groups/<group-id>.json
//! ```
//!
//! All records are loaded into an in-memory cache when the store opens;
//! writes go to disk first and then to the cache. Member writes are
//! versioned.

use super::{GroupStore, StoreCapabilities};
use crate::error::{StoreError, StoreResult};
use crate::model::{Category, CategoryId, CategoryUpdate, Group, GroupId, StudentId};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

const CATEGORIES_DIR: &str = "categories";
const GROUPS_DIR: &str = "groups";

#[derive(Default)]
struct Cache {
    categories: IndexMap<CategoryId, Category>,
    groups: IndexMap<GroupId, Group>,
}

/// File-based group storage.
pub struct FileGroupStore {
    base_path: PathBuf,
    cache: RwLock<Cache>,
}

impl FileGroupStore {
    /// Open (or initialise) a store rooted at `base_path`.
    pub fn open(base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_path = base_path.into();
        for dir in [CATEGORIES_DIR, GROUPS_DIR] {
            std::fs::create_dir_all(base_path.join(dir))?;
        }

        let store = Self {
            base_path,
            cache: RwLock::new(Cache::default()),
        };
        store.load_all()?;
        Ok(store)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Cache>> {
        self.cache
            .read()
            .map_err(|_| StoreError::Transport("Failed to acquire read lock on cache".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Cache>> {
        self.cache
            .write()
            .map_err(|_| StoreError::Transport("Failed to acquire write lock on cache".to_string()))
    }

    fn record_path(&self, dir: &str, id: &str) -> PathBuf {
        self.base_path.join(dir).join(format!("{}.json", id))
    }

    /// Load every record into the cache. Unreadable files are skipped.
    fn load_all(&self) -> StoreResult<()> {
        let mut categories: Vec<Category> = self.load_dir(CATEGORIES_DIR)?;
        let mut groups: Vec<Group> = self.load_dir(GROUPS_DIR)?;

        // Directory order is arbitrary; creation order is what callers rely on.
        categories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut cache = self.write()?;
        cache.categories = categories.into_iter().map(|c| (c.id.clone(), c)).collect();
        cache.groups = groups.into_iter().map(|g| (g.id.clone(), g)).collect();
        debug!(
            categories = cache.categories.len(),
            groups = cache.groups.len(),
            path = %self.base_path.display(),
            "Loaded group store"
        );
        Ok(())
    }

    fn load_dir<T: DeserializeOwned>(&self, dir: &str) -> StoreResult<Vec<T>> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(self.base_path.join(dir))?.flatten() {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                match Self::load_record(&path) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Failed to load {}: {}", path.display(), e),
                }
            }
        }
        Ok(records)
    }

    fn load_record<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_record<T: Serialize>(&self, dir: &str, id: &str, record: &T) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(self.record_path(dir, id), content)?;
        Ok(())
    }

    fn delete_record(&self, dir: &str, id: &str) -> StoreResult<()> {
        let path = self.record_path(dir, id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[async_trait]
impl GroupStore for FileGroupStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            versioned_writes: true,
        }
    }

    async fn create_category(&self, category: Category) -> StoreResult<CategoryId> {
        let mut cache = self.write()?;
        if cache.categories.contains_key(&category.id) {
            return Err(StoreError::Duplicate(category.id));
        }
        self.save_record(CATEGORIES_DIR, &category.id, &category)?;
        let id = category.id.clone();
        cache.categories.insert(id.clone(), category);
        Ok(id)
    }

    async fn get_category(&self, id: &str) -> StoreResult<Option<Category>> {
        Ok(self.read()?.categories.get(id).cloned())
    }

    async fn update_category(&self, id: &str, update: CategoryUpdate) -> StoreResult<Category> {
        let mut cache = self.write()?;
        let mut category = cache
            .categories
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::Missing {
                kind: "Category",
                id: id.to_string(),
            })?;
        category.apply(&update);
        self.save_record(CATEGORIES_DIR, id, &category)?;
        cache.categories.insert(id.to_string(), category.clone());
        Ok(category)
    }

    async fn list_categories(&self, course_id: &str) -> StoreResult<Vec<Category>> {
        Ok(self
            .read()?
            .categories
            .values()
            .filter(|c| c.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn delete_category(&self, id: &str) -> StoreResult<bool> {
        let mut cache = self.write()?;
        self.delete_record(CATEGORIES_DIR, id)?;
        Ok(cache.categories.shift_remove(id).is_some())
    }

    async fn create_group(&self, group: Group) -> StoreResult<GroupId> {
        let mut cache = self.write()?;
        if cache.groups.contains_key(&group.id) {
            return Err(StoreError::Duplicate(group.id));
        }
        self.save_record(GROUPS_DIR, &group.id, &group)?;
        let id = group.id.clone();
        cache.groups.insert(id.clone(), group);
        Ok(id)
    }

    async fn get_group(&self, id: &str) -> StoreResult<Option<Group>> {
        Ok(self.read()?.groups.get(id).cloned())
    }

    async fn list_groups(&self, category_id: &str) -> StoreResult<Vec<Group>> {
        Ok(self
            .read()?
            .groups
            .values()
            .filter(|g| g.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn update_group_members(
        &self,
        id: &str,
        member_ids: Vec<StudentId>,
        expected_version: Option<u64>,
    ) -> StoreResult<Group> {
        // Hold the cache lock across the disk write so check-and-set is atomic.
        let mut cache = self.write()?;
        let mut group = cache
            .groups
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::Missing {
                kind: "Group",
                id: id.to_string(),
            })?;

        if let Some(expected) = expected_version {
            if group.version != expected {
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: group.version,
                });
            }
        }

        group.member_ids = member_ids;
        group.version += 1;
        self.save_record(GROUPS_DIR, id, &group)?;
        cache.groups.insert(id.to_string(), group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: &str) -> StoreResult<bool> {
        let mut cache = self.write()?;
        self.delete_record(GROUPS_DIR, id)?;
        Ok(cache.groups.shift_remove(id).is_some())
    }
}
