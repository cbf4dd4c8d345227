//! Capacity partitioning.
//!
//! Pure functions that split a student set into groups of at most
//! `capacity` members. Nothing here touches a store:
//!
//! - `partition_random` shuffles with a caller-supplied RNG and slices the
//!   result into consecutive chunks. Used for initial formation and for the
//!   full reshuffle after a capacity change.
//! - `minimum_group_count` is how many groups a FREE category needs.
//! - `first_fit_assign` places late arrivals into existing groups in creation
//!   order, allocating new groups only when every group is full. It never
//!   shuffles, so settled groups are left alone.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::error::{GroupingError, GroupingResult};
use crate::model::{Group, GroupId, StudentId};

/// Reject capacities below one.
pub fn validate_capacity(capacity: u32) -> GroupingResult<u32> {
    if capacity == 0 {
        return Err(GroupingError::configuration(
            "capacity per group must be at least 1",
        ));
    }
    Ok(capacity)
}

/// Capacity from an untrusted signed value (CLI input, deserialized forms).
pub fn capacity_from_i64(value: i64) -> GroupingResult<u32> {
    let capacity = u32::try_from(value).map_err(|_| {
        GroupingError::configuration(format!("capacity per group out of range: {}", value))
    })?;
    validate_capacity(capacity)
}

/// `ceil(roster_size / capacity)`.
pub fn minimum_group_count(roster_size: usize, capacity: u32) -> GroupingResult<usize> {
    let capacity = validate_capacity(capacity)? as usize;
    Ok(roster_size.div_ceil(capacity))
}

/// Drop repeated ids, keeping the first occurrence.
pub fn unique_in_order<'a, I>(students: I) -> Vec<StudentId>
where
    I: IntoIterator<Item = &'a StudentId>,
{
    let mut seen = HashSet::new();
    students
        .into_iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}

/// Shuffle `students` and cut the sequence into chunks of `capacity`.
///
/// Produces `ceil(n / capacity)` member lists; only the last one may be short.
pub fn partition_random<R: Rng + ?Sized>(
    students: &[StudentId],
    capacity: u32,
    rng: &mut R,
) -> GroupingResult<Vec<Vec<StudentId>>> {
    let capacity = validate_capacity(capacity)? as usize;
    let mut shuffled = unique_in_order(students);
    shuffled.shuffle(rng);
    Ok(shuffled.chunks(capacity).map(|chunk| chunk.to_vec()).collect())
}

/// Result of `first_fit_assign`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentPlan {
    /// Students to append to existing groups, in group order.
    pub additions: IndexMap<GroupId, Vec<StudentId>>,
    /// Member lists of groups that have to be created, in allocation order.
    pub new_groups: Vec<Vec<StudentId>>,
}

impl AssignmentPlan {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.new_groups.is_empty()
    }

    pub fn assigned_count(&self) -> usize {
        self.additions.values().map(Vec::len).sum::<usize>()
            + self.new_groups.iter().map(Vec::len).sum::<usize>()
    }
}

/// Place each unassigned student, in the given order, into the first group
/// with spare capacity. Groups allocated by the plan take part in the search
/// for later students.
pub fn first_fit_assign(
    unassigned: &[StudentId],
    groups: &[Group],
    capacity: u32,
) -> GroupingResult<AssignmentPlan> {
    let capacity = validate_capacity(capacity)?;
    let mut remaining: Vec<usize> = groups
        .iter()
        .map(|g| g.remaining_capacity(capacity))
        .collect();
    let mut plan = AssignmentPlan::default();

    for student in unassigned {
        if let Some(idx) = remaining.iter().position(|spare| *spare > 0) {
            remaining[idx] -= 1;
            plan.additions
                .entry(groups[idx].id.clone())
                .or_default()
                .push(student.clone());
            continue;
        }

        match plan
            .new_groups
            .iter_mut()
            .find(|members| members.len() < capacity as usize)
        {
            Some(members) => members.push(student.clone()),
            None => plan.new_groups.push(vec![student.clone()]),
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, GroupingPolicy};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn students(ids: &[&str]) -> Vec<StudentId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn group_with(category: &Category, members: &[&str]) -> Group {
        let mut group = Group::new(category, "g");
        group.member_ids = students(members);
        group
    }

    #[test]
    fn test_partition_sizes_follow_capacity() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 0..25usize {
            for capacity in 1..7u32 {
                let roster: Vec<StudentId> = (0..n).map(|i| format!("s{}", i)).collect();
                let parts = partition_random(&roster, capacity, &mut rng).unwrap();

                assert_eq!(parts.len(), n.div_ceil(capacity as usize));
                assert!(parts.iter().all(|p| p.len() <= capacity as usize));
                if let Some((last, rest)) = parts.split_last() {
                    assert!(rest.iter().all(|p| p.len() == capacity as usize));
                    assert!(!last.is_empty());
                }

                let mut covered: Vec<StudentId> = parts.into_iter().flatten().collect();
                covered.sort();
                let mut expected = roster.clone();
                expected.sort();
                assert_eq!(covered, expected);
            }
        }
    }

    #[test]
    fn test_five_students_capacity_two() {
        let mut rng = StdRng::seed_from_u64(1);
        let parts = partition_random(&students(&["A", "B", "C", "D", "E"]), 2, &mut rng).unwrap();
        let sizes: Vec<usize> = parts.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_partition_is_deterministic_for_a_seed() {
        let roster: Vec<StudentId> = (0..12).map(|i| format!("s{}", i)).collect();
        let a = partition_random(&roster, 4, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = partition_random(&roster, 4, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_partition_edge_inputs() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(partition_random(&[], 3, &mut rng).unwrap().is_empty());
        assert!(matches!(
            partition_random(&students(&["a"]), 0, &mut rng),
            Err(GroupingError::Configuration(_))
        ));

        let parts = partition_random(&students(&["a", "a", "b"]), 5, &mut rng).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 2);
    }

    #[test]
    fn test_minimum_group_count() {
        assert_eq!(minimum_group_count(7, 3).unwrap(), 3);
        assert_eq!(minimum_group_count(6, 3).unwrap(), 2);
        assert_eq!(minimum_group_count(0, 3).unwrap(), 0);
        assert!(minimum_group_count(4, 0).is_err());
    }

    #[test]
    fn test_capacity_from_i64() {
        assert_eq!(capacity_from_i64(3).unwrap(), 3);
        assert!(capacity_from_i64(0).is_err());
        assert!(capacity_from_i64(-2).is_err());
    }

    #[test]
    fn test_first_fit_prefers_existing_groups_in_order() {
        let category = Category::new("c1", "Project", GroupingPolicy::Random, 3);
        let groups = vec![
            group_with(&category, &["a", "b", "c"]),
            group_with(&category, &["d", "e"]),
            group_with(&category, &["f"]),
        ];

        let plan = first_fit_assign(&students(&["x", "y", "z"]), &groups, 3).unwrap();
        assert!(plan.new_groups.is_empty());
        assert_eq!(plan.additions.len(), 2);
        assert_eq!(plan.additions[&groups[1].id], students(&["x"]));
        assert_eq!(plan.additions[&groups[2].id], students(&["y", "z"]));
        assert_eq!(plan.assigned_count(), 3);
    }

    #[test]
    fn test_first_fit_allocates_new_groups_only_when_all_full() {
        let category = Category::new("c1", "Project", GroupingPolicy::Random, 2);
        let groups = vec![
            group_with(&category, &["a", "b"]),
            group_with(&category, &["c", "d"]),
        ];

        let plan = first_fit_assign(&students(&["x", "y", "z"]), &groups, 2).unwrap();
        assert!(plan.additions.is_empty());
        assert_eq!(plan.new_groups, vec![students(&["x", "y"]), students(&["z"])]);
    }

    #[test]
    fn test_first_fit_treats_overfull_groups_as_full() {
        let category = Category::new("c1", "Project", GroupingPolicy::Random, 2);
        let groups = vec![group_with(&category, &["a", "b", "c"])];

        let plan = first_fit_assign(&students(&["x"]), &groups, 2).unwrap();
        assert_eq!(plan.new_groups, vec![students(&["x"])]);
    }

    #[test]
    fn test_first_fit_with_nothing_to_place() {
        let plan = first_fit_assign(&[], &[], 4).unwrap();
        assert!(plan.is_empty());
    }
}
