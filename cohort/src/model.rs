//! Category and group records.
//!
//! A `Category` scopes a grouping policy inside a course; a `Group` is a
//! bounded set of students formed under exactly one category.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type CourseId = String;
pub type CategoryId = String;
pub type GroupId = String;
pub type StudentId = String;

/// How groups of a category are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupingPolicy {
    /// The engine forms and maintains groups; students cannot self-select.
    Random,
    /// The engine only provisions capacity; students join and leave themselves.
    Free,
}

impl fmt::Display for GroupingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingPolicy::Random => write!(f, "RANDOM"),
            GroupingPolicy::Free => write!(f, "FREE"),
        }
    }
}

impl std::str::FromStr for GroupingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(GroupingPolicy::Random),
            "free" => Ok(GroupingPolicy::Free),
            _ => Err(format!(
                "Unknown grouping policy '{}'. Valid options: random, free",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub course_id: CourseId,
    pub name: String,
    pub policy: GroupingPolicy,
    pub capacity_per_group: u32,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(
        course_id: impl Into<CourseId>,
        name: impl Into<String>,
        policy: GroupingPolicy,
        capacity_per_group: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            course_id: course_id.into(),
            name: name.into(),
            policy,
            capacity_per_group,
            created_at: Utc::now(),
        }
    }

    /// Apply the mutable fields of an update.
    pub fn apply(&mut self, update: &CategoryUpdate) {
        if let Some(capacity) = update.capacity_per_group {
            self.capacity_per_group = capacity;
        }
        if let Some(policy) = update.policy {
            self.policy = policy;
        }
    }
}

/// Capacity and policy are the only mutable category fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub capacity_per_group: Option<u32>,
    pub policy: Option<GroupingPolicy>,
}

impl CategoryUpdate {
    pub fn capacity(capacity: u32) -> Self {
        Self {
            capacity_per_group: Some(capacity),
            ..Default::default()
        }
    }

    pub fn policy(policy: GroupingPolicy) -> Self {
        Self {
            policy: Some(policy),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub category_id: CategoryId,
    pub course_id: CourseId,
    pub name: String,
    /// Stored order matters: capacity truncation keeps the first members.
    pub member_ids: Vec<StudentId>,
    /// Bumped by every member write; `0` means never populated.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// A new, empty group record for `category`.
    pub fn new(category: &Category, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category_id: category.id.clone(),
            course_id: category.course_id.clone(),
            name: name.into(),
            member_ids: Vec::new(),
            version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }

    pub fn is_member(&self, student_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == student_id)
    }

    pub fn is_full(&self, capacity: u32) -> bool {
        self.member_ids.len() >= capacity as usize
    }

    pub fn remaining_capacity(&self, capacity: u32) -> usize {
        (capacity as usize).saturating_sub(self.member_ids.len())
    }

    /// Created but never written with members: the intermediate state of an
    /// interrupted create-then-populate formation.
    pub fn is_unpopulated(&self) -> bool {
        self.member_ids.is_empty() && self.version == 0
    }

    /// Member list with `student_id` appended, or `None` if already present.
    pub fn with_member(&self, student_id: &str) -> Option<Vec<StudentId>> {
        if self.is_member(student_id) {
            return None;
        }
        let mut members = self.member_ids.clone();
        members.push(student_id.to_string());
        Some(members)
    }

    /// Member list without `student_id`, or `None` if absent.
    pub fn without_member(&self, student_id: &str) -> Option<Vec<StudentId>> {
        if !self.is_member(student_id) {
            return None;
        }
        Some(
            self.member_ids
                .iter()
                .filter(|m| m.as_str() != student_id)
                .cloned()
                .collect(),
        )
    }
}

/// Automatic group name, 1-based.
pub fn group_name(prefix: &str, ordinal: usize) -> String {
    format!("{} {}", prefix, ordinal)
}
