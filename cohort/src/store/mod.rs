//! Persistence boundary of the grouping engine.
//!
//! The engine talks to two external collaborators:
//! - `GroupStore`: category and group records.
//! - `RosterSource`: the students enrolled in a course.
//!
//! Both are backend-agnostic async traits. Implementations can live in
//! memory, on disk, or behind a remote API; the engine reaches them only
//! through `StoreGateway`, which bounds every call with a timeout.

pub mod file;
pub mod gateway;
pub mod memory;
pub mod roster;

pub use file::FileGroupStore;
pub use gateway::StoreGateway;
pub use memory::InMemoryGroupStore;
pub use roster::{FileRoster, InMemoryRoster};

use crate::error::StoreResult;
use crate::model::{Category, CategoryId, CategoryUpdate, Group, GroupId, StudentId};

/// Optional features a store may offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// `update_group_members` honours `expected_version` and reports
    /// mismatches as `StoreError::Conflict`.
    pub versioned_writes: bool,
}

/// Backend-agnostic storage for categories and groups.
#[async_trait::async_trait]
pub trait GroupStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }

    /// Persist a new category
    async fn create_category(&self, category: Category) -> StoreResult<CategoryId>;

    async fn get_category(&self, id: &str) -> StoreResult<Option<Category>>;

    /// Apply the mutable fields and return the stored result
    async fn update_category(&self, id: &str, update: CategoryUpdate) -> StoreResult<Category>;

    async fn list_categories(&self, course_id: &str) -> StoreResult<Vec<Category>>;

    /// Remove a category record. Groups are not touched here.
    async fn delete_category(&self, id: &str) -> StoreResult<bool>;

    /// Persist a new group record as given
    async fn create_group(&self, group: Group) -> StoreResult<GroupId>;

    async fn get_group(&self, id: &str) -> StoreResult<Option<Group>>;

    /// Groups of a category, in creation order
    async fn list_groups(&self, category_id: &str) -> StoreResult<Vec<Group>>;

    /// Replace the member list and bump the version.
    ///
    /// With `expected_version` set, a store with `versioned_writes` rejects
    /// the write when the stored version differs.
    async fn update_group_members(
        &self,
        id: &str,
        member_ids: Vec<StudentId>,
        expected_version: Option<u64>,
    ) -> StoreResult<Group>;

    async fn delete_group(&self, id: &str) -> StoreResult<bool>;
}

/// Source of enrolled students for a course.
#[async_trait::async_trait]
pub trait RosterSource: Send + Sync {
    /// Enrolled student ids in roster order, without duplicates
    async fn list_enrolled_students(&self, course_id: &str) -> StoreResult<Vec<StudentId>>;
}
