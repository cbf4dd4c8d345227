//! Error types for the grouping engine and its store backends.
//!
//! Responsibilities:
//! - `GroupingError` is what every `PolicyEngine` operation returns to callers.
//! - `StoreError` is what `GroupStore` / `RosterSource` backends return; the
//!   engine folds it into `GroupingError` through `From`.
//!
//! Unit tests at the bottom pin the store-to-engine error mapping.

use thiserror::Error;

/// Errors surfaced by `PolicyEngine` operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GroupingError {
    /// Invalid capacity, blank name or an unsupported policy transition.
    /// Always raised before any write.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Group {group_id} is full (capacity {capacity})")]
    CapacityExceeded { group_id: String, capacity: u32 },
    #[error("Student {student_id} already belongs to group {group_id}")]
    AlreadyAssigned { student_id: String, group_id: String },
    /// Transport failure or timeout. State may be partially written; reloading
    /// the category repairs it.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl GroupingError {
    pub fn configuration(message: impl Into<String>) -> Self {
        GroupingError::Configuration(message.into())
    }

    pub fn category_not_found(id: &str) -> Self {
        GroupingError::NotFound {
            kind: "Category",
            id: id.to_string(),
        }
    }

    pub fn group_not_found(id: &str) -> Self {
        GroupingError::NotFound {
            kind: "Group",
            id: id.to_string(),
        }
    }

    /// Whether re-invoking the operation (or reloading the category) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GroupingError::StoreUnavailable(_) | GroupingError::Conflict(_)
        )
    }
}

pub type GroupingResult<T> = Result<T, GroupingError>;

/// Error type for store and roster backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },
    #[error("Duplicate record id: {0}")]
    Duplicate(String),
    #[error("{kind} not found: {id}")]
    Missing { kind: &'static str, id: String },
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e.to_string())
    }
}

impl From<StoreError> for GroupingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { .. } | StoreError::Duplicate(_) => {
                GroupingError::Conflict(e.to_string())
            }
            StoreError::Missing { kind, id } => GroupingError::NotFound { kind, id },
            other => GroupingError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failures_become_store_unavailable() {
        let err: GroupingError = StoreError::Transport("connection reset".to_string()).into();
        assert!(matches!(err, GroupingError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        let err: GroupingError =
            StoreError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk")).into();
        assert!(matches!(err, GroupingError::StoreUnavailable(_)));
    }

    #[test]
    fn test_conflicts_are_surfaced_distinctly() {
        let err: GroupingError = StoreError::Conflict {
            id: "g1".to_string(),
            expected: 2,
            actual: 3,
        }
        .into();
        assert!(matches!(err, GroupingError::Conflict(_)));

        let err: GroupingError = StoreError::Duplicate("g1".to_string()).into();
        assert!(matches!(err, GroupingError::Conflict(_)));
    }

    #[test]
    fn test_missing_maps_to_not_found() {
        let err: GroupingError = StoreError::Missing {
            kind: "Group",
            id: "g9".to_string(),
        }
        .into();
        assert_eq!(err, GroupingError::group_not_found("g9"));
        assert!(!err.is_retryable());
    }
}
