//! Two-phase group formation.
//!
//! The backing store cannot be trusted to persist a member list supplied at
//! creation time, so a group is formed in two writes: create an empty record,
//! then populate it. `GroupFormation` carries the group through those phases
//! so a failure leaves a recognisable intermediate state behind: a group that
//! is empty and still at version 0 (`Group::is_unpopulated`). The next
//! enrollment pass fills such groups first-fit.

use crate::error::GroupingResult;
use crate::model::{Category, Group, StudentId};
use crate::store::StoreGateway;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormationPhase {
    /// Nothing written yet
    Planned,
    /// Empty record exists in the store
    Created,
    /// Member list written (or nothing to write)
    Populated,
}

#[derive(Debug, Clone)]
pub struct GroupFormation {
    group: Group,
    members: Vec<StudentId>,
    phase: FormationPhase,
}

impl GroupFormation {
    pub fn plan(category: &Category, name: impl Into<String>, members: Vec<StudentId>) -> Self {
        Self {
            group: Group::new(category, name),
            members,
            phase: FormationPhase::Planned,
        }
    }

    pub fn phase(&self) -> FormationPhase {
        self.phase
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Phase one: persist the empty group record.
    pub async fn create(&mut self, gateway: &StoreGateway) -> GroupingResult<()> {
        if self.phase != FormationPhase::Planned {
            return Ok(());
        }
        gateway.create_group(self.group.clone()).await?;
        self.phase = FormationPhase::Created;
        debug!(group_id = %self.group.id, name = %self.group.name, "Created empty group");
        Ok(())
    }

    /// Phase two: write the planned members into the created record.
    pub async fn populate(&mut self, gateway: &StoreGateway) -> GroupingResult<()> {
        match self.phase {
            FormationPhase::Planned => {
                self.create(gateway).await?;
            }
            FormationPhase::Populated => return Ok(()),
            FormationPhase::Created => {}
        }

        if !self.members.is_empty() {
            self.group = gateway
                .update_group_members(
                    &self.group.id,
                    self.members.clone(),
                    Some(self.group.version),
                )
                .await?;
            debug!(
                group_id = %self.group.id,
                members = self.members.len(),
                "Populated group"
            );
        }
        self.phase = FormationPhase::Populated;
        Ok(())
    }

    /// Run both phases and return the stored group.
    pub async fn run(mut self, gateway: &StoreGateway) -> GroupingResult<Group> {
        self.create(gateway).await?;
        self.populate(gateway).await?;
        Ok(self.group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupingPolicy;
    use crate::store::{GroupStore, InMemoryGroupStore, InMemoryRoster};
    use std::sync::Arc;
    use std::time::Duration;

    fn gateway(store: Arc<InMemoryGroupStore>) -> StoreGateway {
        StoreGateway::new(store, Arc::new(InMemoryRoster::new()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_phases_advance_in_order() {
        let store = Arc::new(InMemoryGroupStore::new());
        let gateway = gateway(store.clone());
        let category = Category::new("c1", "Lab", GroupingPolicy::Random, 3);

        let mut formation =
            GroupFormation::plan(&category, "Group 1", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(formation.phase(), FormationPhase::Planned);

        formation.create(&gateway).await.unwrap();
        assert_eq!(formation.phase(), FormationPhase::Created);
        let stored = store.get_group(&formation.group().id).await.unwrap().unwrap();
        assert!(stored.is_unpopulated());

        formation.populate(&gateway).await.unwrap();
        assert_eq!(formation.phase(), FormationPhase::Populated);
        let stored = store.get_group(&formation.group().id).await.unwrap().unwrap();
        assert_eq!(stored.member_ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_empty_formation_skips_member_write() {
        let store = Arc::new(InMemoryGroupStore::new());
        let gateway = gateway(store.clone());
        let category = Category::new("c1", "Lab", GroupingPolicy::Free, 3);

        let group = GroupFormation::plan(&category, "Group 1", Vec::new())
            .run(&gateway)
            .await
            .unwrap();
        assert!(group.is_unpopulated());
        assert_eq!(store.list_groups(&category.id).await.unwrap().len(), 1);
    }
}
