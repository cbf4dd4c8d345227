//! Membership invariant checks.
//!
//! Violations are reconciliation bugs (or the footprint of a lost update), not
//! states the engine produces on purpose. `audit` reports them; it never
//! writes.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::model::{Category, Group, GroupId, GroupingPolicy, StudentId};
use crate::reconcile::unassigned_students;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// A student is a member of more than one group in the category
    DuplicateAssignment {
        student_id: StudentId,
        group_ids: Vec<GroupId>,
    },
    /// A group lists the same student twice
    DuplicateMember {
        group_id: GroupId,
        student_id: StudentId,
    },
    OverCapacity {
        group_id: GroupId,
        members: usize,
        capacity: u32,
    },
    /// RANDOM only: an enrolled student is in no group
    Uncovered { student_id: StudentId },
    /// RANDOM only: a group created but never populated
    Unpopulated { group_id: GroupId },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::DuplicateAssignment {
                student_id,
                group_ids,
            } => write!(
                f,
                "student {} is in {} groups: {}",
                student_id,
                group_ids.len(),
                group_ids.join(", ")
            ),
            InvariantViolation::DuplicateMember {
                group_id,
                student_id,
            } => write!(f, "group {} lists {} twice", group_id, student_id),
            InvariantViolation::OverCapacity {
                group_id,
                members,
                capacity,
            } => write!(
                f,
                "group {} has {} members, capacity is {}",
                group_id, members, capacity
            ),
            InvariantViolation::Uncovered { student_id } => {
                write!(f, "student {} is in no group", student_id)
            }
            InvariantViolation::Unpopulated { group_id } => {
                write!(f, "group {} was created but never populated", group_id)
            }
        }
    }
}

/// Check the membership invariants of one category against its roster.
pub fn audit(
    category: &Category,
    groups: &[Group],
    roster: &[StudentId],
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut owners: HashMap<&str, Vec<GroupId>> = HashMap::new();

    for group in groups {
        let mut seen = HashSet::new();
        for member in &group.member_ids {
            if !seen.insert(member.as_str()) {
                violations.push(InvariantViolation::DuplicateMember {
                    group_id: group.id.clone(),
                    student_id: member.clone(),
                });
                continue;
            }
            owners
                .entry(member.as_str())
                .or_default()
                .push(group.id.clone());
        }

        if group.len() > category.capacity_per_group as usize {
            violations.push(InvariantViolation::OverCapacity {
                group_id: group.id.clone(),
                members: group.len(),
                capacity: category.capacity_per_group,
            });
        }
    }

    // Report duplicates in the order students first appear.
    let mut reported = HashSet::new();
    for group in groups {
        for member in &group.member_ids {
            if let Some(group_ids) = owners.get(member.as_str()) {
                if group_ids.len() > 1 && reported.insert(member.as_str()) {
                    violations.push(InvariantViolation::DuplicateAssignment {
                        student_id: member.clone(),
                        group_ids: group_ids.clone(),
                    });
                }
            }
        }
    }

    if category.policy == GroupingPolicy::Random && !groups.is_empty() {
        for student_id in unassigned_students(groups, roster) {
            violations.push(InvariantViolation::Uncovered { student_id });
        }
        for group in groups.iter().filter(|g| g.is_unpopulated()) {
            violations.push(InvariantViolation::Unpopulated {
                group_id: group.id.clone(),
            });
        }
    }

    violations
}
