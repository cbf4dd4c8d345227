//! Cohort - group membership and capacity assignment
//!
//! Partitions the students enrolled in a course into capacity-bounded groups
//! inside a *category* (e.g. "Project teams"), and keeps those groups
//! consistent with the roster as students enroll and capacities change.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        PolicyEngine                          │
//! │  category lifecycle · group lifecycle · join/leave           │
//! │  per-category locks (Guarded) · version tokens               │
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌───────────────────────────────┐   ┌──────────────────────────┐
//! │     MembershipReconciler      │   │        partition         │
//! │  form · enroll-heal · resize  │──▶│  shuffle-and-chunk       │
//! │  two-phase GroupFormation     │   │  first-fit plan          │
//! └───────────────┬───────────────┘   └──────────────────────────┘
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │          StoreGateway (per-call timeout → StoreUnavailable)  │
//! │      GroupStore (memory / file)   RosterSource (memory/file) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use cohort::{EngineConfig, GroupingPolicy, InMemoryGroupStore, InMemoryRoster, PolicyEngine};
//! use std::sync::Arc;
//!
//! let roster = Arc::new(InMemoryRoster::with_course("course-1", ["ana", "ben", "cai"]));
//! let engine = PolicyEngine::new(
//!     Arc::new(InMemoryGroupStore::new()),
//!     roster,
//!     EngineConfig::default(),
//! );
//!
//! let created = engine
//!     .create_category("course-1", "Project teams", GroupingPolicy::Random, 2)
//!     .await?;
//! let groups = engine.load_category_groups(&created.category.id).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod invariants;
pub mod model;
pub mod partition;
pub mod reconcile;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::{CohortConfig, ConcurrencyMode, EngineConfig, EvictionPolicy, StorageConfig};
pub use engine::{CreatedCategory, PolicyEngine};
pub use error::{GroupingError, GroupingResult, StoreError, StoreResult};
pub use invariants::{audit, InvariantViolation};
pub use model::{Category, CategoryUpdate, Group, GroupingPolicy};
pub use reconcile::{CapacityChange, MembershipReconciler};
pub use store::{
    FileGroupStore, FileRoster, GroupStore, InMemoryGroupStore, InMemoryRoster, RosterSource,
    StoreCapabilities, StoreGateway,
};
