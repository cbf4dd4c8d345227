//! Cohort CLI module
//!
//! Command-line front end over a file-backed `PolicyEngine`.
//!
//! # Commands
//!
//! - `roster` - Course rosters (set, enroll, unenroll, show)
//! - `category` - Categories (create, show, list, capacity, policy, delete, audit, unassigned)
//! - `group` - Groups (create, delete, add, remove, join, leave)

pub mod commands;
pub mod context;
pub mod output;

pub use context::CliContext;
pub use output::{OutputFormat, OutputFormatter};
