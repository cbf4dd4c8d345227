//! Policy engine
//!
//! The façade callers use. It owns the category lifecycle (create, change
//! capacity, change policy, delete) and the group lifecycle (manual create and
//! delete, add/remove member, self-service join/leave), and delegates
//! partitioning and repair to the `MembershipReconciler`.
//!
//! The engine keeps no membership state between calls: every operation
//! re-reads the category, its groups and the roster through the
//! `StoreGateway`. In `ConcurrencyMode::Guarded` mutations of one category are
//! serialized behind a per-category lock and member writes carry version
//! tokens when the store supports them.

mod locks;

pub use locks::CategoryLocks;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::config::{ConcurrencyMode, EngineConfig};
use crate::error::{GroupingError, GroupingResult};
use crate::invariants::{audit, InvariantViolation};
use crate::model::{Category, CategoryUpdate, Group, GroupingPolicy, StudentId};
use crate::partition::validate_capacity;
use crate::reconcile::{unassigned_students, CapacityChange, GroupFormation, MembershipReconciler};
use crate::store::{GroupStore, RosterSource, StoreGateway};

/// Result of `create_category`. The category exists even when group
/// formation failed; reloading the category retries formation.
#[derive(Debug, Clone)]
pub struct CreatedCategory {
    pub category: Category,
    pub formation: GroupingResult<Vec<Group>>,
}

/// Fresh view of a category for one membership mutation. Holds the category
/// lock (if any) for as long as it lives.
struct MembershipView {
    _guard: Option<OwnedMutexGuard<()>>,
    category: Category,
    groups: Vec<Group>,
    target: usize,
}

impl MembershipView {
    fn target(&self) -> &Group {
        &self.groups[self.target]
    }

    /// Groups other than the target that contain `student_id`.
    fn other_groups_of<'a>(&'a self, student_id: &'a str) -> impl Iterator<Item = &'a Group> + 'a {
        let target_id = self.target().id.as_str();
        self.groups
            .iter()
            .filter(move |g| g.id != target_id && g.is_member(student_id))
    }
}

pub struct PolicyEngine {
    gateway: StoreGateway,
    reconciler: MembershipReconciler,
    locks: CategoryLocks,
    config: EngineConfig,
}

impl PolicyEngine {
    /// Engine with a random source from `config.shuffle_seed`, or OS entropy.
    pub fn new(
        store: Arc<dyn GroupStore>,
        roster: Arc<dyn RosterSource>,
        config: EngineConfig,
    ) -> Self {
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(store, roster, config, rng)
    }

    /// Engine with an injected random source.
    pub fn with_rng(
        store: Arc<dyn GroupStore>,
        roster: Arc<dyn RosterSource>,
        config: EngineConfig,
        rng: StdRng,
    ) -> Self {
        let gateway = StoreGateway::new(store, roster, config.store_timeout());
        let reconciler = MembershipReconciler::new(gateway.clone(), rng, &config);
        Self {
            gateway,
            reconciler,
            locks: CategoryLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn guard(&self, category_id: &str) -> Option<OwnedMutexGuard<()>> {
        match self.config.concurrency {
            ConcurrencyMode::Guarded => Some(self.locks.acquire(category_id).await),
            ConcurrencyMode::Naive => None,
        }
    }

    /// Resolve the category, lock it, and re-read it under the lock.
    ///
    /// Only ids that resolve get a lock entry; a category deleted while we
    /// waited has its entry dropped again.
    async fn lock_category(
        &self,
        category_id: &str,
    ) -> GroupingResult<(Option<OwnedMutexGuard<()>>, Category)> {
        self.gateway.require_category(category_id).await?;
        let guard = self.guard(category_id).await;
        match self.gateway.require_category(category_id).await {
            Ok(category) => Ok((guard, category)),
            Err(e) => {
                drop(guard);
                if matches!(e, GroupingError::NotFound { .. }) {
                    self.locks.forget(category_id);
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // Category lifecycle
    // ========================================================================

    /// Create a category and, if the course roster is non-empty, form its
    /// initial groups.
    pub async fn create_category(
        &self,
        course_id: &str,
        name: &str,
        policy: GroupingPolicy,
        capacity: u32,
    ) -> GroupingResult<CreatedCategory> {
        validate_capacity(capacity)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(GroupingError::configuration("category name must not be blank"));
        }

        let category = Category::new(course_id, name, policy, capacity);
        self.gateway.create_category(category.clone()).await?;
        info!(
            category_id = %category.id,
            course_id,
            policy = %policy,
            capacity,
            "Created category"
        );

        let _guard = self.guard(&category.id).await;
        let formation = self.form_for_new_category(&category).await;
        if let Err(e) = &formation {
            warn!(
                category_id = %category.id,
                error = %e,
                "Group formation failed; category kept for later reconciliation"
            );
        }

        Ok(CreatedCategory {
            category,
            formation,
        })
    }

    async fn form_for_new_category(&self, category: &Category) -> GroupingResult<Vec<Group>> {
        let students = self.gateway.enrolled_students(&category.course_id).await?;
        if students.is_empty() {
            return Ok(Vec::new());
        }
        self.reconciler.form_initial_groups(category, &students).await
    }

    pub async fn get_category(&self, category_id: &str) -> GroupingResult<Category> {
        self.gateway.require_category(category_id).await
    }

    pub async fn list_categories(&self, course_id: &str) -> GroupingResult<Vec<Category>> {
        self.gateway.list_categories(course_id).await
    }

    /// Groups of a category after an enrollment pass. Every read heals: an
    /// unformed category is formed, and under RANDOM students in no group
    /// are placed first-fit.
    pub async fn load_category_groups(&self, category_id: &str) -> GroupingResult<Vec<Group>> {
        let (_guard, category) = self.lock_category(category_id).await?;
        let groups = self.gateway.list_groups(category_id).await?;
        let students = self.gateway.enrolled_students(&category.course_id).await?;

        let groups = self
            .reconciler
            .reconcile_enrollment(&category, groups, &students)
            .await?;

        for violation in audit(&category, &groups, &students) {
            warn!(category_id, %violation, "Invariant violation after reconciliation");
        }
        Ok(groups)
    }

    /// Change the capacity per group and reconcile existing groups.
    pub async fn update_capacity(
        &self,
        category_id: &str,
        new_capacity: u32,
    ) -> GroupingResult<CapacityChange> {
        validate_capacity(new_capacity)?;
        let (_guard, category) = self.lock_category(category_id).await?;
        let groups = self.gateway.list_groups(category_id).await?;

        if category.capacity_per_group == new_capacity {
            debug!(category_id, new_capacity, "Capacity unchanged");
            return Ok(CapacityChange {
                groups,
                ..Default::default()
            });
        }

        let students = self.gateway.enrolled_students(&category.course_id).await?;
        let category = self
            .gateway
            .update_category(category_id, CategoryUpdate::capacity(new_capacity))
            .await?;
        info!(
            category_id,
            new_capacity,
            policy = %category.policy,
            "Updated capacity"
        );

        self.reconciler
            .reconcile_capacity_change(&category, groups, new_capacity, &students)
            .await
    }

    /// Switch policy. Only allowed while the category has no groups.
    pub async fn update_policy(
        &self,
        category_id: &str,
        policy: GroupingPolicy,
    ) -> GroupingResult<Category> {
        let (_guard, category) = self.lock_category(category_id).await?;
        if category.policy == policy {
            return Ok(category);
        }

        let groups = self.gateway.list_groups(category_id).await?;
        if !groups.is_empty() {
            return Err(GroupingError::configuration(format!(
                "cannot change policy of category {} from {} to {}: {} groups already exist",
                category_id,
                category.policy,
                policy,
                groups.len()
            )));
        }

        let category = self
            .gateway
            .update_category(category_id, CategoryUpdate::policy(policy))
            .await?;
        info!(category_id, policy = %policy, "Updated policy");
        Ok(category)
    }

    /// Delete a category and all of its groups.
    pub async fn delete_category(&self, category_id: &str) -> GroupingResult<()> {
        {
            let (_guard, _category) = self.lock_category(category_id).await?;
            let groups = self.gateway.list_groups(category_id).await?;
            for group in &groups {
                self.gateway.delete_group(&group.id).await?;
            }
            self.gateway.delete_category(category_id).await?;
            info!(category_id, groups = groups.len(), "Deleted category");
        }
        self.locks.forget(category_id);
        Ok(())
    }

    /// Number of stored groups, without reconciliation.
    pub async fn group_count(&self, category_id: &str) -> GroupingResult<usize> {
        Ok(self.gateway.list_groups(category_id).await?.len())
    }

    /// Read-only invariant check of a category against its roster.
    pub async fn audit_category(
        &self,
        category_id: &str,
    ) -> GroupingResult<Vec<InvariantViolation>> {
        let category = self.gateway.require_category(category_id).await?;
        let groups = self.gateway.list_groups(category_id).await?;
        let students = self.gateway.enrolled_students(&category.course_id).await?;
        Ok(audit(&category, &groups, &students))
    }

    /// Roster students of `course_id` that are in no group of the category.
    pub async fn students_without_group(
        &self,
        course_id: &str,
        category_id: &str,
    ) -> GroupingResult<Vec<StudentId>> {
        let category = self.gateway.require_category(category_id).await?;
        if category.course_id != course_id {
            return Err(GroupingError::configuration(format!(
                "category {} does not belong to course {}",
                category_id, course_id
            )));
        }
        let groups = self.gateway.list_groups(category_id).await?;
        let students = self.gateway.enrolled_students(course_id).await?;
        Ok(unassigned_students(&groups, &students))
    }

    // ========================================================================
    // Group lifecycle
    // ========================================================================

    pub async fn get_group(&self, group_id: &str) -> GroupingResult<Group> {
        self.gateway.require_group(group_id).await
    }

    /// Create an empty group. `None` picks the next automatic name.
    pub async fn create_manual_group(
        &self,
        category_id: &str,
        name: Option<&str>,
    ) -> GroupingResult<Group> {
        let name = match name.map(str::trim) {
            Some("") => {
                return Err(GroupingError::configuration("group name must not be blank"));
            }
            other => other.map(str::to_string),
        };

        let (_guard, category) = self.lock_category(category_id).await?;
        let name = match name {
            Some(name) => name,
            None => {
                let existing = self.gateway.list_groups(category_id).await?;
                self.reconciler.next_group_name(&existing)
            }
        };

        let group = GroupFormation::plan(&category, name, Vec::new())
            .run(&self.gateway)
            .await?;
        info!(category_id, group_id = %group.id, name = %group.name, "Created group");
        Ok(group)
    }

    /// Delete a group. Its members become unassigned; they are not moved.
    pub async fn delete_group(&self, group_id: &str) -> GroupingResult<Group> {
        let group = self.gateway.require_group(group_id).await?;
        let (_guard, _category) = self.lock_category(&group.category_id).await?;
        if !self.gateway.delete_group(group_id).await? {
            return Err(GroupingError::group_not_found(group_id));
        }
        info!(
            category_id = %group.category_id,
            group_id,
            released = group.len(),
            "Deleted group"
        );
        Ok(group)
    }

    /// Add a student to a group.
    ///
    /// Fails with `CapacityExceeded` when the group is full and with
    /// `AlreadyAssigned` when the student is in another group of the
    /// category. Adding an existing member is a no-op.
    pub async fn add_member(&self, group_id: &str, student_id: &str) -> GroupingResult<Group> {
        let view = self.membership_view(group_id).await?;
        let target = view.target();
        if target.is_member(student_id) {
            return Ok(target.clone());
        }

        let capacity = view.category.capacity_per_group;
        if target.is_full(capacity) {
            return Err(GroupingError::CapacityExceeded {
                group_id: group_id.to_string(),
                capacity,
            });
        }
        if let Some(other) = view.other_groups_of(student_id).next() {
            return Err(GroupingError::AlreadyAssigned {
                student_id: student_id.to_string(),
                group_id: other.id.clone(),
            });
        }

        let group = self.append_member(target, student_id).await?;
        debug!(group_id, student_id, "Added member");
        Ok(group)
    }

    /// Remove a student from a group; no-op if absent.
    pub async fn remove_member(&self, group_id: &str, student_id: &str) -> GroupingResult<Group> {
        let view = self.membership_view(group_id).await?;
        let group = self.drop_member(view.target(), student_id).await?;
        debug!(group_id, student_id, "Removed member");
        Ok(group)
    }

    /// Self-service join (FREE only). Moves the student out of any other
    /// group of the category, then into `group_id`. Joining a group the
    /// student is already in changes nothing.
    pub async fn join_group(&self, student_id: &str, group_id: &str) -> GroupingResult<Group> {
        let view = self.membership_view(group_id).await?;
        Self::require_self_service(&view.category)?;

        let target = view.target();
        if target.is_member(student_id) {
            return Ok(target.clone());
        }

        let capacity = view.category.capacity_per_group;
        if target.is_full(capacity) {
            return Err(GroupingError::CapacityExceeded {
                group_id: group_id.to_string(),
                capacity,
            });
        }

        for previous in view.other_groups_of(student_id) {
            self.drop_member(previous, student_id).await?;
            debug!(student_id, group_id = %previous.id, "Left previous group");
        }

        let group = self.append_member(target, student_id).await?;
        info!(student_id, group_id, "Joined group");
        Ok(group)
    }

    /// Self-service leave (FREE only); no-op if not a member.
    pub async fn leave_group(&self, student_id: &str, group_id: &str) -> GroupingResult<Group> {
        let view = self.membership_view(group_id).await?;
        Self::require_self_service(&view.category)?;
        let group = self.drop_member(view.target(), student_id).await?;
        info!(student_id, group_id, "Left group");
        Ok(group)
    }

    fn require_self_service(category: &Category) -> GroupingResult<()> {
        if category.policy != GroupingPolicy::Free {
            return Err(GroupingError::configuration(format!(
                "category {} uses {} policy; students cannot choose their group",
                category.id, category.policy
            )));
        }
        Ok(())
    }

    /// Lock the group's category and re-read all of its groups.
    async fn membership_view(&self, group_id: &str) -> GroupingResult<MembershipView> {
        let group = self.gateway.require_group(group_id).await?;
        let (guard, category) = self.lock_category(&group.category_id).await?;
        let groups = self.gateway.list_groups(&group.category_id).await?;
        let target = groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or_else(|| GroupingError::group_not_found(group_id))?;

        Ok(MembershipView {
            _guard: guard,
            category,
            groups,
            target,
        })
    }

    async fn append_member(&self, group: &Group, student_id: &str) -> GroupingResult<Group> {
        match group.with_member(student_id) {
            Some(members) => self.write_members(group, members).await,
            None => Ok(group.clone()),
        }
    }

    async fn drop_member(&self, group: &Group, student_id: &str) -> GroupingResult<Group> {
        match group.without_member(student_id) {
            Some(members) => self.write_members(group, members).await,
            None => Ok(group.clone()),
        }
    }

    async fn write_members(&self, group: &Group, members: Vec<StudentId>) -> GroupingResult<Group> {
        let token = self.reconciler.version_token(group);
        self.gateway
            .update_group_members(&group.id, members, token)
            .await
    }
}
