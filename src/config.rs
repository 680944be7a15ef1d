//! Configuration for a migration run.
//!
//! A single [`MigrateConfig`] value is built once at startup (defaults, then
//! an optional JSON file, then command-line flags) and handed explicitly to
//! the migrator and the task runner.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::planner::GatingMode;

/// How task files are executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Runner binary, looked up on PATH unless it contains a slash
    pub program: String,
    /// Extra arguments placed before the taskfile flags
    pub args: Vec<String>,
    /// Task invoked in every migration file
    pub target: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "task".to_string(),
            args: Vec::new(),
            target: "up".to_string(),
        }
    }
}

/// Settings for task-migrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Directory containing task files
    pub directory: PathBuf,
    /// SQLite file holding the applied-version history
    pub database: PathBuf,
    pub verbose: bool,
    pub color: bool,
    pub gating: GatingMode,
    pub runner: RunnerConfig,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("versions"),
            database: PathBuf::from("database.db"),
            verbose: false,
            color: true,
            gating: GatingMode::default(),
            runner: RunnerConfig::default(),
        }
    }
}

impl MigrateConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file; missing keys take their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            anyhow::bail!("Migrations directory must be specified");
        }
        if self.database.as_os_str().is_empty() {
            anyhow::bail!("Database path must be specified");
        }
        if self.runner.program.trim().is_empty() {
            anyhow::bail!("Runner program must be specified");
        }
        let target = self.runner.target.trim();
        if target.is_empty() {
            anyhow::bail!("Runner target must be specified");
        }
        if target.starts_with('-') {
            anyhow::bail!("Runner target {:?} looks like a flag", target);
        }
        Ok(())
    }
}
