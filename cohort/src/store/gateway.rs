//! Timeout-bounded access to the store and roster.
//!
//! Every call is raced against the configured timeout. Expiry surfaces as
//! `GroupingError::StoreUnavailable`; the pending store future is dropped and
//! no local state is touched.

use super::{GroupStore, RosterSource, StoreCapabilities};
use crate::error::{GroupingError, GroupingResult, StoreResult};
use crate::model::{Category, CategoryId, CategoryUpdate, Group, GroupId, StudentId};
use crate::partition::unique_in_order;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct StoreGateway {
    store: Arc<dyn GroupStore>,
    roster: Arc<dyn RosterSource>,
    timeout: Duration,
}

impl StoreGateway {
    pub fn new(
        store: Arc<dyn GroupStore>,
        roster: Arc<dyn RosterSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            roster,
            timeout,
        }
    }

    pub fn capabilities(&self) -> StoreCapabilities {
        self.store.capabilities()
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> GroupingResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(GroupingError::from),
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(GroupingError::StoreUnavailable(format!(
                    "{} timed out after {}ms",
                    operation,
                    self.timeout.as_millis()
                )))
            }
        }
    }

    pub async fn enrolled_students(&self, course_id: &str) -> GroupingResult<Vec<StudentId>> {
        let students = self
            .call(
                "list_enrolled_students",
                self.roster.list_enrolled_students(course_id),
            )
            .await?;
        Ok(unique_in_order(&students))
    }

    pub async fn create_category(&self, category: Category) -> GroupingResult<CategoryId> {
        self.call("create_category", self.store.create_category(category))
            .await
    }

    pub async fn get_category(&self, id: &str) -> GroupingResult<Option<Category>> {
        self.call("get_category", self.store.get_category(id)).await
    }

    /// Like `get_category`, but a missing record is `NotFound`.
    pub async fn require_category(&self, id: &str) -> GroupingResult<Category> {
        self.get_category(id)
            .await?
            .ok_or_else(|| GroupingError::category_not_found(id))
    }

    pub async fn update_category(
        &self,
        id: &str,
        update: CategoryUpdate,
    ) -> GroupingResult<Category> {
        self.call("update_category", self.store.update_category(id, update))
            .await
    }

    pub async fn list_categories(&self, course_id: &str) -> GroupingResult<Vec<Category>> {
        self.call("list_categories", self.store.list_categories(course_id))
            .await
    }

    pub async fn delete_category(&self, id: &str) -> GroupingResult<bool> {
        self.call("delete_category", self.store.delete_category(id))
            .await
    }

    pub async fn create_group(&self, group: Group) -> GroupingResult<GroupId> {
        self.call("create_group", self.store.create_group(group)).await
    }

    pub async fn get_group(&self, id: &str) -> GroupingResult<Option<Group>> {
        self.call("get_group", self.store.get_group(id)).await
    }

    pub async fn require_group(&self, id: &str) -> GroupingResult<Group> {
        self.get_group(id)
            .await?
            .ok_or_else(|| GroupingError::group_not_found(id))
    }

    pub async fn list_groups(&self, category_id: &str) -> GroupingResult<Vec<Group>> {
        self.call("list_groups", self.store.list_groups(category_id))
            .await
    }

    pub async fn update_group_members(
        &self,
        id: &str,
        member_ids: Vec<StudentId>,
        expected_version: Option<u64>,
    ) -> GroupingResult<Group> {
        self.call(
            "update_group_members",
            self.store.update_group_members(id, member_ids, expected_version),
        )
        .await
    }

    pub async fn delete_group(&self, id: &str) -> GroupingResult<bool> {
        self.call("delete_group", self.store.delete_group(id)).await
    }
}
