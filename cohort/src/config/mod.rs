//! Configuration for the grouping engine and its storage.
//!
//! Loaded from TOML; every field has a default so partial files are valid.

pub mod types;

pub use types::*;
