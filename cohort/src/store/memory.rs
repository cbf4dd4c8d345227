//! In-memory group storage implementation
//!
//! Used by tests and ephemeral deployments. Insertion order of the backing
//! `IndexMap`s doubles as creation order.

use super::{GroupStore, StoreCapabilities};
use crate::error::{StoreError, StoreResult};
use crate::model::{Category, CategoryId, CategoryUpdate, Group, GroupId, StudentId};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    categories: IndexMap<CategoryId, Category>,
    groups: IndexMap<GroupId, Group>,
}

/// In-memory group storage
pub struct InMemoryGroupStore {
    state: RwLock<State>,
    versioned: bool,
}

impl InMemoryGroupStore {
    /// Store that enforces version tokens on member writes.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            versioned: true,
        }
    }

    /// Store that ignores version tokens, like the legacy backend.
    pub fn unversioned() -> Self {
        Self {
            state: RwLock::new(State::default()),
            versioned: false,
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Transport("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Transport("in-memory store lock poisoned".to_string()))
    }
}

impl Default for InMemoryGroupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            versioned_writes: self.versioned,
        }
    }

    async fn create_category(&self, category: Category) -> StoreResult<CategoryId> {
        let mut state = self.write()?;
        if state.categories.contains_key(&category.id) {
            return Err(StoreError::Duplicate(category.id));
        }
        let id = category.id.clone();
        state.categories.insert(id.clone(), category);
        Ok(id)
    }

    async fn get_category(&self, id: &str) -> StoreResult<Option<Category>> {
        let state = self.read()?;
        Ok(state.categories.get(id).cloned())
    }

    async fn update_category(&self, id: &str, update: CategoryUpdate) -> StoreResult<Category> {
        let mut state = self.write()?;
        let category = state
            .categories
            .get_mut(id)
            .ok_or_else(|| StoreError::Missing {
                kind: "Category",
                id: id.to_string(),
            })?;
        category.apply(&update);
        Ok(category.clone())
    }

    async fn list_categories(&self, course_id: &str) -> StoreResult<Vec<Category>> {
        let state = self.read()?;
        Ok(state
            .categories
            .values()
            .filter(|c| c.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn delete_category(&self, id: &str) -> StoreResult<bool> {
        let mut state = self.write()?;
        Ok(state.categories.shift_remove(id).is_some())
    }

    async fn create_group(&self, group: Group) -> StoreResult<GroupId> {
        let mut state = self.write()?;
        if state.groups.contains_key(&group.id) {
            return Err(StoreError::Duplicate(group.id));
        }
        let id = group.id.clone();
        state.groups.insert(id.clone(), group);
        Ok(id)
    }

    async fn get_group(&self, id: &str) -> StoreResult<Option<Group>> {
        let state = self.read()?;
        Ok(state.groups.get(id).cloned())
    }

    async fn list_groups(&self, category_id: &str) -> StoreResult<Vec<Group>> {
        let state = self.read()?;
        Ok(state
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
        let versioned = self.versioned;
        let mut state = self.write()?;
        let group = state.groups.get_mut(id).ok_or_else(|| StoreError::Missing {
            kind: "Group",
            id: id.to_string(),
        })?;

        if let (true, Some(expected)) = (versioned, expected_version) {
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
        Ok(group.clone())
    }

    async fn delete_group(&self, id: &str) -> StoreResult<bool> {
        let mut state = self.write()?;
        Ok(state.groups.shift_remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupingPolicy;

    fn category() -> Category {
        Category::new("course-1", "Final Project", GroupingPolicy::Random, 3)
    }

    #[tokio::test]
    async fn test_groups_listed_in_creation_order() {
        let store = InMemoryGroupStore::new();
        let category = category();
        store.create_category(category.clone()).await.unwrap();

        let mut ids = Vec::new();
        for i in 1..=4 {
            let group = Group::new(&category, format!("Group {}", i));
            ids.push(store.create_group(group).await.unwrap());
        }
        store.delete_group(&ids[1]).await.unwrap();

        let listed: Vec<GroupId> = store
            .list_groups(&category.id)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(listed, vec![ids[0].clone(), ids[2].clone(), ids[3].clone()]);
    }

    #[tokio::test]
    async fn test_versioned_write_rejects_stale_token() {
        let store = InMemoryGroupStore::new();
        let category = category();
        let id = store.create_group(Group::new(&category, "Group 1")).await.unwrap();

        let updated = store
            .update_group_members(&id, vec!["a".to_string()], Some(0))
            .await
            .unwrap();
        assert_eq!(updated.version, 1);

        let stale = store
            .update_group_members(&id, vec!["b".to_string()], Some(0))
            .await;
        assert!(matches!(
            stale,
            Err(StoreError::Conflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));

        let stored = store.get_group(&id).await.unwrap().unwrap();
        assert_eq!(stored.member_ids, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_unversioned_store_ignores_tokens() {
        let store = InMemoryGroupStore::unversioned();
        assert!(!store.capabilities().versioned_writes);

        let id = store
            .create_group(Group::new(&category(), "Group 1"))
            .await
            .unwrap();
        store
            .update_group_members(&id, vec!["a".to_string()], Some(0))
            .await
            .unwrap();
        let overwritten = store
            .update_group_members(&id, vec!["b".to_string()], Some(0))
            .await
            .unwrap();
        assert_eq!(overwritten.member_ids, vec!["b".to_string()]);
        assert_eq!(overwritten.version, 2);
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_records() {
        let store = InMemoryGroupStore::new();
        let category = category();
        store.create_category(category.clone()).await.unwrap();
        assert!(matches!(
            store.create_category(category.clone()).await,
            Err(StoreError::Duplicate(_))
        ));

        assert!(matches!(
            store.update_group_members("nope", vec![], None).await,
            Err(StoreError::Missing { kind: "Group", .. })
        ));
        assert!(!store.delete_group("nope").await.unwrap());

        let updated = store
            .update_category(&category.id, CategoryUpdate::capacity(5))
            .await
            .unwrap();
        assert_eq!(updated.capacity_per_group, 5);
        assert_eq!(store.list_categories("course-1").await.unwrap().len(), 1);
        assert!(store.list_categories("course-2").await.unwrap().is_empty());
    }
}
