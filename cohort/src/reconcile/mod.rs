//! Membership reconciliation.
//!
//! Turns partition plans into store writes and repairs categories whose
//! persisted groups drifted from the roster:
//!
//! - `form_initial_groups`: first formation of a category.
//! - `reconcile_enrollment`: the self-healing pass run on every load. Forms
//!   groups for an unformed category, and under RANDOM absorbs students that
//!   are in no group (new enrollments, members of deleted groups, groups left
//!   empty by an interrupted formation).
//! - `reconcile_capacity_change`: full reshuffle under RANDOM; under FREE, more
//!   empty groups and truncation of groups above the new capacity.
//!
//! Write failures are returned as they happen. Completed writes are never
//! rolled back; the next `reconcile_enrollment` restores consistency.

mod formation;

pub use formation::{FormationPhase, GroupFormation};

use rand::rngs::StdRng;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ConcurrencyMode, EngineConfig, EvictionPolicy};
use crate::error::GroupingResult;
use crate::model::{group_name, Category, Group, GroupingPolicy, StudentId};
use crate::partition::{
    first_fit_assign, minimum_group_count, partition_random, unique_in_order, AssignmentPlan,
};
use crate::store::StoreGateway;

/// Outcome of a capacity change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityChange {
    /// Groups of the category after reconciliation, in creation order
    pub groups: Vec<Group>,
    /// Students cut from over-capacity groups and left without a group
    pub evicted: Vec<StudentId>,
    /// Students cut from over-capacity groups and placed elsewhere
    pub redistributed: Vec<StudentId>,
}

/// Roster students that appear in none of `groups`, in roster order.
pub fn unassigned_students(groups: &[Group], students: &[StudentId]) -> Vec<StudentId> {
    let assigned: HashSet<&str> = groups
        .iter()
        .flat_map(|g| g.member_ids.iter().map(String::as_str))
        .collect();
    unique_in_order(students)
        .into_iter()
        .filter(|s| !assigned.contains(s.as_str()))
        .collect()
}

pub struct MembershipReconciler {
    gateway: StoreGateway,
    rng: Mutex<StdRng>,
    name_prefix: String,
    concurrency: ConcurrencyMode,
    eviction: EvictionPolicy,
}

impl MembershipReconciler {
    pub fn new(gateway: StoreGateway, rng: StdRng, config: &EngineConfig) -> Self {
        Self {
            gateway,
            rng: Mutex::new(rng),
            name_prefix: config.group_name_prefix.clone(),
            concurrency: config.concurrency,
            eviction: config.evicted_members,
        }
    }

    pub fn gateway(&self) -> &StoreGateway {
        &self.gateway
    }

    /// Version token to send with a member write, if writes are guarded.
    pub fn version_token(&self, group: &Group) -> Option<u64> {
        match self.concurrency {
            ConcurrencyMode::Guarded if self.gateway.capabilities().versioned_writes => {
                Some(group.version)
            }
            _ => None,
        }
    }

    /// Automatic name for one more group: `existing.len() + 1`, moved up past
    /// ordinals still held by live groups after a deletion.
    pub fn next_group_name(&self, existing: &[Group]) -> String {
        let mut ordinal = existing.len() + 1;
        loop {
            let name = group_name(&self.name_prefix, ordinal);
            if !existing.iter().any(|g| g.name == name) {
                return name;
            }
            ordinal += 1;
        }
    }

    fn shuffle(
        &self,
        students: &[StudentId],
        capacity: u32,
    ) -> GroupingResult<Vec<Vec<StudentId>>> {
        // A poisoned RNG is still a valid RNG.
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        partition_random(students, capacity, &mut *rng)
    }

    /// Create the groups of a category that has none.
    ///
    /// RANDOM: shuffle and slice, then create-then-populate each group.
    /// FREE: `ceil(roster / capacity)` empty groups, nobody assigned.
    pub async fn form_initial_groups(
        &self,
        category: &Category,
        students: &[StudentId],
    ) -> GroupingResult<Vec<Group>> {
        let mut groups: Vec<Group> = Vec::new();
        match category.policy {
            GroupingPolicy::Random => {
                let parts = self.shuffle(students, category.capacity_per_group)?;
                for members in parts {
                    let name = self.next_group_name(&groups);
                    let group = GroupFormation::plan(category, name, members)
                        .run(&self.gateway)
                        .await?;
                    groups.push(group);
                }
            }
            GroupingPolicy::Free => {
                let count = minimum_group_count(students.len(), category.capacity_per_group)?;
                for _ in 0..count {
                    let name = self.next_group_name(&groups);
                    let group = GroupFormation::plan(category, name, Vec::new())
                        .run(&self.gateway)
                        .await?;
                    groups.push(group);
                }
            }
        }

        info!(
            category_id = %category.id,
            policy = %category.policy,
            capacity = category.capacity_per_group,
            students = students.len(),
            groups = groups.len(),
            "Formed initial groups"
        );
        Ok(groups)
    }

    /// Bring `groups` in line with the current roster. Idempotent: with no
    /// roster change a second call performs no writes.
    pub async fn reconcile_enrollment(
        &self,
        category: &Category,
        groups: Vec<Group>,
        students: &[StudentId],
    ) -> GroupingResult<Vec<Group>> {
        if groups.is_empty() {
            if students.is_empty() {
                return Ok(groups);
            }
            info!(category_id = %category.id, "Category has no groups, forming");
            return self.form_initial_groups(category, students).await;
        }

        if category.policy != GroupingPolicy::Random {
            return Ok(groups);
        }

        let stranded = groups.iter().filter(|g| g.is_unpopulated()).count();
        if stranded > 0 {
            warn!(
                category_id = %category.id,
                stranded,
                "Found unpopulated groups from an interrupted formation"
            );
        }

        let unassigned = unassigned_students(&groups, students);
        if unassigned.is_empty() {
            debug!(category_id = %category.id, "Enrollment already reconciled");
            return Ok(groups);
        }

        let plan = first_fit_assign(&unassigned, &groups, category.capacity_per_group)?;
        info!(
            category_id = %category.id,
            unassigned = unassigned.len(),
            new_groups = plan.new_groups.len(),
            "Assigning unassigned students first-fit"
        );
        self.apply_plan(category, groups, plan).await
    }

    /// Persist a first-fit plan: extend existing groups, then form new ones.
    async fn apply_plan(
        &self,
        category: &Category,
        mut groups: Vec<Group>,
        plan: AssignmentPlan,
    ) -> GroupingResult<Vec<Group>> {
        for group in groups.iter_mut() {
            if let Some(additions) = plan.additions.get(&group.id) {
                let mut members = group.member_ids.clone();
                members.extend(additions.iter().cloned());
                let token = self.version_token(group);
                *group = self
                    .gateway
                    .update_group_members(&group.id, members, token)
                    .await?;
            }
        }

        for members in plan.new_groups {
            let name = self.next_group_name(&groups);
            let group = GroupFormation::plan(category, name, members)
                .run(&self.gateway)
                .await?;
            groups.push(group);
        }
        Ok(groups)
    }

    /// Reconcile `groups` after the category's capacity became `new_capacity`.
    ///
    /// RANDOM disbands every group and reshuffles their members (identities
    /// are not preserved), then absorbs roster students that were in no group.
    /// If interrupted after the deletes, the category is unformed and the next
    /// load re-forms it.
    ///
    /// FREE tops up empty groups to `ceil(roster / new_capacity)` and cuts
    /// over-capacity groups down to their first `new_capacity` members.
    pub async fn reconcile_capacity_change(
        &self,
        category: &Category,
        groups: Vec<Group>,
        new_capacity: u32,
        students: &[StudentId],
    ) -> GroupingResult<CapacityChange> {
        let mut category = category.clone();
        category.capacity_per_group = new_capacity;

        match category.policy {
            GroupingPolicy::Random => self.reshuffle(&category, groups, students).await,
            GroupingPolicy::Free => self.resize_free(&category, groups, students).await,
        }
    }

    async fn reshuffle(
        &self,
        category: &Category,
        groups: Vec<Group>,
        students: &[StudentId],
    ) -> GroupingResult<CapacityChange> {
        let members = unique_in_order(groups.iter().flat_map(|g| g.member_ids.iter()));
        info!(
            category_id = %category.id,
            disbanded = groups.len(),
            members = members.len(),
            capacity = category.capacity_per_group,
            "Reshuffling groups after capacity change"
        );

        for group in &groups {
            self.gateway.delete_group(&group.id).await?;
        }

        let formed = self.form_initial_groups(category, &members).await?;
        let groups = self.reconcile_enrollment(category, formed, students).await?;
        Ok(CapacityChange {
            groups,
            ..Default::default()
        })
    }

    async fn resize_free(
        &self,
        category: &Category,
        mut groups: Vec<Group>,
        students: &[StudentId],
    ) -> GroupingResult<CapacityChange> {
        let capacity = category.capacity_per_group;
        let required = minimum_group_count(students.len(), capacity)?;
        while groups.len() < required {
            let name = self.next_group_name(&groups);
            let group = GroupFormation::plan(category, name, Vec::new())
                .run(&self.gateway)
                .await?;
            groups.push(group);
        }

        let mut cut = Vec::new();
        for group in groups.iter_mut() {
            if group.len() <= capacity as usize {
                continue;
            }
            let kept = group.member_ids[..capacity as usize].to_vec();
            let dropped = group.member_ids[capacity as usize..].to_vec();
            let token = self.version_token(group);
            *group = self
                .gateway
                .update_group_members(&group.id, kept, token)
                .await?;
            warn!(
                category_id = %category.id,
                group_id = %group.id,
                evicted = dropped.len(),
                "Truncated group above new capacity"
            );
            cut.extend(dropped);
        }

        if cut.is_empty() || self.eviction == EvictionPolicy::Drop {
            return Ok(CapacityChange {
                groups,
                evicted: cut,
                redistributed: Vec::new(),
            });
        }

        let plan = first_fit_assign(&cut, &groups, capacity)?;
        let groups = self.apply_plan(category, groups, plan).await?;
        info!(
            category_id = %category.id,
            redistributed = cut.len(),
            "Redistributed evicted members"
        );
        Ok(CapacityChange {
            groups,
            evicted: Vec::new(),
            redistributed: cut,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GroupStore, InMemoryGroupStore, InMemoryRoster};
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Duration;

    fn ids(items: &[&str]) -> Vec<StudentId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn reconciler(store: Arc<InMemoryGroupStore>, config: &EngineConfig) -> MembershipReconciler {
        let gateway = StoreGateway::new(
            store,
            Arc::new(InMemoryRoster::new()),
            Duration::from_secs(1),
        );
        MembershipReconciler::new(gateway, StdRng::seed_from_u64(11), config)
    }

    #[test]
    fn test_unassigned_students_keeps_roster_order() {
        let category = Category::new("c1", "Lab", GroupingPolicy::Random, 2);
        let mut group = Group::new(&category, "Group 1");
        group.member_ids = ids(&["b"]);

        assert_eq!(
            unassigned_students(&[group], &ids(&["c", "b", "a", "c"])),
            ids(&["c", "a"])
        );
    }

    #[tokio::test]
    async fn test_random_formation_names_and_sizes() {
        let store = Arc::new(InMemoryGroupStore::new());
        let reconciler = reconciler(store.clone(), &EngineConfig::default());
        let category = Category::new("c1", "Lab", GroupingPolicy::Random, 2);

        let groups = reconciler
            .form_initial_groups(&category, &ids(&["A", "B", "C", "D", "E"]))
            .await
            .unwrap();

        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Group 1", "Group 2", "Group 3"]);
        let sizes: Vec<usize> = groups.iter().map(Group::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(store.list_groups(&category.id).await.unwrap(), groups);
    }

    #[test]
    fn test_next_group_name_skips_live_names() {
        let store = Arc::new(InMemoryGroupStore::new());
        let reconciler = reconciler(store, &EngineConfig::default());
        let category = Category::new("c1", "Lab", GroupingPolicy::Free, 2);
        let groups: Vec<Group> = ["Group 2", "Group 3"]
            .iter()
            .map(|name| Group::new(&category, *name))
            .collect();

        assert_eq!(reconciler.next_group_name(&[]), "Group 1");
        assert_eq!(reconciler.next_group_name(&groups), "Group 4");
        assert_eq!(reconciler.next_group_name(&groups[1..]), "Group 2");
    }

    #[tokio::test]
    async fn test_free_formation_creates_empty_groups() {
        let store = Arc::new(InMemoryGroupStore::new());
        let reconciler = reconciler(store, &EngineConfig::default());
        let category = Category::new("c1", "Lab", GroupingPolicy::Free, 3);
        let roster: Vec<StudentId> = (0..7).map(|i| format!("s{}", i)).collect();

        let groups = reconciler.form_initial_groups(&category, &roster).await.unwrap();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(Group::is_empty));
    }

    #[tokio::test]
    async fn test_free_shrink_redistributes_when_configured() {
        let store = Arc::new(InMemoryGroupStore::new());
        let config = EngineConfig {
            evicted_members: EvictionPolicy::Redistribute,
            ..Default::default()
        };
        let reconciler = reconciler(store.clone(), &config);
        let category = Category::new("c1", "Lab", GroupingPolicy::Free, 5);

        let full = GroupFormation::plan(&category, "Group 1", ids(&["a", "b", "c", "d", "e"]))
            .run(reconciler.gateway())
            .await
            .unwrap();
        let empty = GroupFormation::plan(&category, "Group 2", Vec::new())
            .run(reconciler.gateway())
            .await
            .unwrap();

        let roster = ids(&["a", "b", "c", "d", "e"]);
        let change = reconciler
            .reconcile_capacity_change(&category, vec![full, empty], 3, &roster)
            .await
            .unwrap();

        assert!(change.evicted.is_empty());
        assert_eq!(change.redistributed, ids(&["d", "e"]));
        assert_eq!(change.groups[0].member_ids, ids(&["a", "b", "c"]));
        assert_eq!(change.groups[1].member_ids, ids(&["d", "e"]));
    }
}
