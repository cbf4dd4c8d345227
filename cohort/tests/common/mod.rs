//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cohort::model::{Category, CategoryId, CategoryUpdate, Group, GroupId, StudentId};
use cohort::{
    EngineConfig, GroupStore, InMemoryGroupStore, InMemoryRoster, PolicyEngine, StoreCapabilities,
    StoreError, StoreResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    CreateGroup,
    UpdateMembers,
    DeleteGroup,
}

/// In-memory store wrapper that counts writes and injects faults.
pub struct InstrumentedStore {
    inner: InMemoryGroupStore,
    writes: AtomicUsize,
    /// `(op, remaining)`: the op fails once `remaining` matching calls passed
    failures: Mutex<Vec<(WriteOp, usize)>>,
    latency: Mutex<Option<Duration>>,
    yield_on_list: AtomicBool,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::wrap(InMemoryGroupStore::new())
    }

    pub fn unversioned() -> Self {
        Self::wrap(InMemoryGroupStore::unversioned())
    }

    fn wrap(inner: InMemoryGroupStore) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
            latency: Mutex::new(None),
            yield_on_list: AtomicBool::new(false),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Fail the `(skip + 1)`-th upcoming call of `op` with a transport error.
    pub fn fail_after(&self, op: WriteOp, skip: usize) {
        self.failures.lock().unwrap().push((op, skip));
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Yield to the scheduler inside `list_groups`, between an engine's read
    /// and its write.
    pub fn interleave(&self, on: bool) {
        self.yield_on_list.store(on, Ordering::SeqCst);
    }

    async fn before(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn before_write(&self, op: WriteOp) -> StoreResult<()> {
        self.before().await;
        let fail = {
            let mut failures = self.failures.lock().unwrap();
            let mut fail = false;
            failures.retain_mut(|(kind, remaining)| {
                if *kind != op {
                    return true;
                }
                if *remaining == 0 {
                    fail = true;
                    return false;
                }
                *remaining -= 1;
                true
            });
            fail
        };
        if fail {
            return Err(StoreError::Transport(format!("injected failure on {:?}", op)));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl GroupStore for InstrumentedStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.inner.capabilities()
    }

    async fn create_category(&self, category: Category) -> StoreResult<CategoryId> {
        self.before_write(WriteOp::CreateCategory).await?;
        self.inner.create_category(category).await
    }

    async fn get_category(&self, id: &str) -> StoreResult<Option<Category>> {
        self.before().await;
        self.inner.get_category(id).await
    }

    async fn update_category(&self, id: &str, update: CategoryUpdate) -> StoreResult<Category> {
        self.before_write(WriteOp::UpdateCategory).await?;
        self.inner.update_category(id, update).await
    }

    async fn list_categories(&self, course_id: &str) -> StoreResult<Vec<Category>> {
        self.before().await;
        self.inner.list_categories(course_id).await
    }

    async fn delete_category(&self, id: &str) -> StoreResult<bool> {
        self.before_write(WriteOp::DeleteCategory).await?;
        self.inner.delete_category(id).await
    }

    async fn create_group(&self, group: Group) -> StoreResult<GroupId> {
        self.before_write(WriteOp::CreateGroup).await?;
        self.inner.create_group(group).await
    }

    async fn get_group(&self, id: &str) -> StoreResult<Option<Group>> {
        self.before().await;
        self.inner.get_group(id).await
    }

    async fn list_groups(&self, category_id: &str) -> StoreResult<Vec<Group>> {
        self.before().await;
        let groups = self.inner.list_groups(category_id).await?;
        if self.yield_on_list.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(groups)
    }

    async fn update_group_members(
        &self,
        id: &str,
        member_ids: Vec<StudentId>,
        expected_version: Option<u64>,
    ) -> StoreResult<Group> {
        self.before_write(WriteOp::UpdateMembers).await?;
        self.inner
            .update_group_members(id, member_ids, expected_version)
            .await
    }

    async fn delete_group(&self, id: &str) -> StoreResult<bool> {
        self.before_write(WriteOp::DeleteGroup).await?;
        self.inner.delete_group(id).await
    }
}

pub fn students(prefix: &str, count: usize) -> Vec<StudentId> {
    (1..=count).map(|i| format!("{}{}", prefix, i)).collect()
}

pub fn ids(items: &[&str]) -> Vec<StudentId> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn seeded_config(seed: u64) -> EngineConfig {
    EngineConfig {
        shuffle_seed: Some(seed),
        ..Default::default()
    }
}

/// Engine over an instrumented store with a single course roster.
pub fn setup(
    course_id: &str,
    roster: &[StudentId],
    config: EngineConfig,
) -> (PolicyEngine, Arc<InstrumentedStore>, Arc<InMemoryRoster>) {
    let store = Arc::new(InstrumentedStore::new());
    let roster = Arc::new(InMemoryRoster::with_course(course_id, roster.iter().cloned()));
    let engine = PolicyEngine::new(store.clone(), roster.clone(), config);
    (engine, store, roster)
}

pub fn sizes(groups: &[Group]) -> Vec<usize> {
    groups.iter().map(Group::len).collect()
}

/// Every member of every group, sorted.
pub fn all_members(groups: &[Group]) -> Vec<StudentId> {
    let mut members: Vec<StudentId> = groups
        .iter()
        .flat_map(|g| g.member_ids.iter().cloned())
        .collect();
    members.sort();
    members
}
