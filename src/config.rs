//! Configuration loading and management.
//!
//! Lookup order for [`Config::load_or_default`]:
//! 1. `task-cascade/config.yaml` in the working directory
//! 2. `~/.task-cascade/config.yaml`
//! 3. Built-in defaults
//!
//! Environment variables are applied on top of whichever file was found:
//! - `TASK_CASCADE_DB_PATH` - Database path
//! - `TASK_CASCADE_MAX_DEPTH` - Maximum hierarchy depth
//! - `TASK_CASCADE_ORPHAN_GUARD` - `true`/`false`

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default maximum hierarchy depth, counting the root as level 1.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub hierarchy: HierarchyConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("task-cascade/tasks.db")
}

/// Tuning for hierarchy walks and cascade deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Deepest level a walk may reach before failing.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Roll back a cascade delete that would leave tasks pointing at a
    /// deleted parent.
    #[serde(default = "default_orphan_guard")]
    pub orphan_guard: bool,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            orphan_guard: default_orphan_guard(),
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_orphan_guard() -> bool {
    true
}

impl HierarchyConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            bail!("hierarchy.max_depth must be at least 1");
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.hierarchy.validate()?;
        Ok(config)
    }

    /// Candidate config files, highest priority first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("task-cascade/config.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".task-cascade").join("config.yaml"));
        }
        paths
    }

    /// Load configuration from default locations or return defaults,
    /// then apply environment overrides.
    pub fn load_or_default() -> Result<Self> {
        let mut config = Self::default();

        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(loaded) => {
                    debug!(path = %path.display(), "Loaded config");
                    config = loaded;
                    break;
                }
                Err(e) => warn!(path = %path.display(), "Ignoring unreadable config: {}", e),
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        config.hierarchy.validate()?;
        Ok(config)
    }

    /// Apply `TASK_CASCADE_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("TASK_CASCADE_DB_PATH") {
            self.store.db_path = PathBuf::from(db_path);
        }

        if let Some(depth) = lookup("TASK_CASCADE_MAX_DEPTH") {
            match depth.parse() {
                Ok(depth) => self.hierarchy.max_depth = depth,
                Err(_) => warn!("Ignoring invalid TASK_CASCADE_MAX_DEPTH '{}'", depth),
            }
        }

        if let Some(guard) = lookup("TASK_CASCADE_ORPHAN_GUARD") {
            match guard.parse() {
                Ok(guard) => self.hierarchy.orphan_guard = guard,
                Err(_) => warn!("Ignoring invalid TASK_CASCADE_ORPHAN_GUARD '{}'", guard),
            }
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
