//! Roster sources.
//!
//! The course directory is an external service; these implementations back
//! tests and the CLI. Both keep enrollment order and drop duplicates.

use super::RosterSource;
use crate::error::{StoreError, StoreResult};
use crate::model::{CourseId, StudentId};
use crate::partition::unique_in_order;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::RwLock;

type Rosters = IndexMap<CourseId, Vec<StudentId>>;

fn enroll_into(rosters: &mut Rosters, course_id: &str, students: &[StudentId]) -> usize {
    let roster = rosters.entry(course_id.to_string()).or_default();
    let before = roster.len();
    for student in students {
        if !roster.contains(student) {
            roster.push(student.clone());
        }
    }
    roster.len() - before
}

fn unenroll_from(rosters: &mut Rosters, course_id: &str, student_id: &str) -> bool {
    match rosters.get_mut(course_id) {
        Some(roster) => {
            let before = roster.len();
            roster.retain(|s| s != student_id);
            roster.len() != before
        }
        None => false,
    }
}

/// In-memory roster, keyed by course.
#[derive(Default)]
pub struct InMemoryRoster {
    rosters: RwLock<Rosters>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course<I, S>(course_id: &str, students: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StudentId>,
    {
        let roster = Self::new();
        let students: Vec<StudentId> = students.into_iter().map(Into::into).collect();
        if let Ok(mut rosters) = roster.rosters.write() {
            rosters.insert(course_id.to_string(), unique_in_order(&students));
        }
        roster
    }

    pub fn set_roster(&self, course_id: &str, students: Vec<StudentId>) -> StoreResult<()> {
        let mut rosters = self.lock_write()?;
        rosters.insert(course_id.to_string(), unique_in_order(&students));
        Ok(())
    }

    /// Append students not yet enrolled; returns how many were new.
    pub fn enroll(&self, course_id: &str, students: &[StudentId]) -> StoreResult<usize> {
        let mut rosters = self.lock_write()?;
        Ok(enroll_into(&mut rosters, course_id, students))
    }

    pub fn unenroll(&self, course_id: &str, student_id: &str) -> StoreResult<bool> {
        let mut rosters = self.lock_write()?;
        Ok(unenroll_from(&mut rosters, course_id, student_id))
    }

    fn lock_write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Rosters>> {
        self.rosters
            .write()
            .map_err(|_| StoreError::Transport("roster lock poisoned".to_string()))
    }
}

#[async_trait]
impl RosterSource for InMemoryRoster {
    async fn list_enrolled_students(&self, course_id: &str) -> StoreResult<Vec<StudentId>> {
        let rosters = self
            .rosters
            .read()
            .map_err(|_| StoreError::Transport("roster lock poisoned".to_string()))?;
        Ok(rosters.get(course_id).cloned().unwrap_or_default())
    }
}

/// Roster persisted as a single JSON map `course id -> [student ids]`.
pub struct FileRoster {
    path: PathBuf,
    rosters: RwLock<Rosters>,
}

impl FileRoster {
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let rosters = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Rosters::new()
        };
        Ok(Self {
            path,
            rosters: RwLock::new(rosters),
        })
    }

    pub fn set_roster(&self, course_id: &str, students: Vec<StudentId>) -> StoreResult<()> {
        self.mutate(|rosters| {
            rosters.insert(course_id.to_string(), unique_in_order(&students));
        })
    }

    pub fn enroll(&self, course_id: &str, students: &[StudentId]) -> StoreResult<usize> {
        self.mutate(|rosters| enroll_into(rosters, course_id, students))
    }

    pub fn unenroll(&self, course_id: &str, student_id: &str) -> StoreResult<bool> {
        self.mutate(|rosters| unenroll_from(rosters, course_id, student_id))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Rosters) -> T) -> StoreResult<T> {
        let mut rosters = self
            .rosters
            .write()
            .map_err(|_| StoreError::Transport("roster lock poisoned".to_string()))?;
        let result = f(&mut rosters);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&*rosters)?)?;
        Ok(result)
    }
}

#[async_trait]
impl RosterSource for FileRoster {
    async fn list_enrolled_students(&self, course_id: &str) -> StoreResult<Vec<StudentId>> {
        let rosters = self
            .rosters
            .read()
            .map_err(|_| StoreError::Transport("roster lock poisoned".to_string()))?;
        Ok(rosters
            .get(course_id)
            .map(|students| unique_in_order(students))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ids(items: &[&str]) -> Vec<StudentId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_in_memory_roster_keeps_order_without_duplicates() {
        let roster = InMemoryRoster::with_course("c1", ["b", "a", "b"]);
        assert_eq!(roster.list_enrolled_students("c1").await.unwrap(), ids(&["b", "a"]));

        assert_eq!(roster.enroll("c1", &ids(&["a", "c"])).unwrap(), 1);
        assert!(roster.unenroll("c1", "b").unwrap());
        assert!(!roster.unenroll("c1", "zz").unwrap());
        assert_eq!(roster.list_enrolled_students("c1").await.unwrap(), ids(&["a", "c"]));
        assert!(roster.list_enrolled_students("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_roster_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rosters.json");

        let roster = FileRoster::open(&path).unwrap();
        roster.set_roster("c1", ids(&["x", "y"])).unwrap();
        roster.enroll("c1", &ids(&["z"])).unwrap();

        let reopened = FileRoster::open(&path).unwrap();
        assert_eq!(
            reopened.list_enrolled_students("c1").await.unwrap(),
            ids(&["x", "y", "z"])
        );
    }
}
