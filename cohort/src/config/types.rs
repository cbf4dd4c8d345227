use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GroupingError, GroupingResult};

/// Top-level configuration file layout.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CohortConfig {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
}

impl CohortConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> GroupingResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GroupingError::configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml(&content).map_err(|e| {
            GroupingError::configuration(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Check values the type system cannot rule out.
    pub fn validate(&self) -> GroupingResult<()> {
        if self.engine.default_capacity == 0 {
            return Err(GroupingError::configuration(
                "engine.default_capacity must be at least 1",
            ));
        }
        if self.engine.store_timeout_ms == 0 {
            return Err(GroupingError::configuration(
                "engine.store_timeout_ms must be positive",
            ));
        }
        if self.engine.group_name_prefix.trim().is_empty() {
            return Err(GroupingError::configuration(
                "engine.group_name_prefix must not be blank",
            ));
        }
        Ok(())
    }
}

/// Engine behaviour knobs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity used when a caller does not specify one
    pub default_capacity: u32,
    /// Upper bound for every single store or roster call, in milliseconds
    pub store_timeout_ms: u64,
    /// Prefix of automatically generated group names ("Group 1", "Group 2", ...)
    pub group_name_prefix: String,
    /// Fixed seed for the shuffle source; `None` draws from OS entropy
    pub shuffle_seed: Option<u64>,
    pub concurrency: ConcurrencyMode,
    pub evicted_members: EvictionPolicy,
}

impl EngineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_capacity: 5,
            store_timeout_ms: 10_000, // 10 seconds
            group_name_prefix: "Group".to_string(),
            shuffle_seed: None,
            concurrency: ConcurrencyMode::Guarded,
            evicted_members: EvictionPolicy::Drop,
        }
    }
}

/// How membership read-modify-write sequences are protected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Per-category lock, plus version tokens when the store supports them
    Guarded,
    /// Unsynchronized read-modify-write; concurrent writers can lose updates
    Naive,
}

impl Default for ConcurrencyMode {
    fn default() -> Self {
        Self::Guarded
    }
}

/// What happens to members cut off by a FREE-policy capacity shrink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evicted members become ungrouped (legacy truncation)
    Drop,
    /// Evicted members are re-placed first-fit into groups with spare room
    Redistribute,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::Drop
    }
}

/// Where the file-backed store and roster keep their data.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".cohort"),
        }
    }
}
