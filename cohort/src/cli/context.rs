//! CLI context - shared state and services for all commands

use crate::config::CohortConfig;
use crate::engine::PolicyEngine;
use crate::error::GroupingResult;
use crate::store::{FileGroupStore, FileRoster};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ROSTER_FILE: &str = "rosters.json";

/// Shared context for CLI commands
pub struct CliContext {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: CohortConfig,
    /// Output format preference
    pub output_format: super::OutputFormat,
    /// Quiet mode (suppress status messages)
    pub quiet: bool,
    /// Verbose mode (extra debug output)
    pub verbose: bool,
    /// Roster file (lazy initialized)
    roster: Option<Arc<FileRoster>>,
    /// Engine over the data directory (lazy initialized)
    engine: Option<Arc<PolicyEngine>>,
}

impl CliContext {
    /// Create a new CLI context from configuration path
    pub fn new(config_path: PathBuf) -> GroupingResult<Self> {
        let config = CohortConfig::load(&config_path)?;
        config.validate()?;
        Ok(Self::from_config(config_path, config))
    }

    /// Create context with default configuration
    pub fn with_defaults() -> GroupingResult<Self> {
        let default_paths = [
            PathBuf::from("config/cohort.toml"),
            PathBuf::from("cohort.toml"),
        ];

        for path in &default_paths {
            if path.exists() {
                return Self::new(path.clone());
            }
        }

        // No config found, use defaults
        Ok(Self::from_config(
            PathBuf::from("cohort.toml"),
            CohortConfig::default(),
        ))
    }

    fn from_config(config_path: PathBuf, config: CohortConfig) -> Self {
        Self {
            config_path,
            config,
            output_format: super::OutputFormat::Table,
            quiet: false,
            verbose: false,
            roster: None,
            engine: None,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.storage.data_dir
    }

    /// Get or open the roster file under the data directory
    pub fn roster(&mut self) -> GroupingResult<Arc<FileRoster>> {
        if let Some(ref roster) = self.roster {
            return Ok(Arc::clone(roster));
        }

        let path = self.data_dir().join(ROSTER_FILE);
        self.debug(&format!("Opening roster file {:?}", path));
        let roster = Arc::new(FileRoster::open(path)?);
        self.roster = Some(Arc::clone(&roster));
        Ok(roster)
    }

    /// Get or initialize the engine over the file store
    pub fn engine(&mut self) -> GroupingResult<Arc<PolicyEngine>> {
        if let Some(ref engine) = self.engine {
            return Ok(Arc::clone(engine));
        }

        let roster = self.roster()?;
        self.debug(&format!("Opening group store in {:?}", self.data_dir()));
        let store = Arc::new(FileGroupStore::open(self.data_dir())?);
        let engine = Arc::new(PolicyEngine::new(store, roster, self.config.engine.clone()));
        self.engine = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Print status message (respects quiet mode)
    pub fn status(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }

    /// Print verbose message (only in verbose mode)
    pub fn debug(&self, message: &str) {
        if self.verbose {
            eprintln!("[DEBUG] {}", message);
        }
    }
}
