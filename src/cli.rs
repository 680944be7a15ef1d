use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::MigrateConfig;
use crate::planner::GatingMode;

/// task-migrate - apply versioned Task files in order, once each
#[derive(Parser, Debug)]
#[command(name = "task-migrate")]
#[command(about = "A general purpose migration tool built around the Task runner")]
#[command(version)]
pub struct Cli {
    /// Directory containing task files
    #[arg(short, long, global = true)]
    pub directory: Option<PathBuf>,

    /// SQLite database recording applied migrations
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// JSON configuration file (flags override its values)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output from task-migrate and the task runner
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// How pending migrations are selected (order-key, applied-name)
    #[arg(long, global = true)]
    pub gating: Option<GatingMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Migrate to the most recent version available
    Up,
    /// Show applied migrations
    Status,
    /// List the migrations `up` would run, without running them
    Pending,
    /// Delete the record of an applied migration
    Forget {
        /// Migration file name as shown by `status`
        name: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Layer command-line flags over `base`.
    pub fn apply_overrides(&self, mut base: MigrateConfig) -> MigrateConfig {
        if let Some(directory) = &self.directory {
            base.directory = directory.clone();
        }
        if let Some(database) = &self.database {
            base.database = database.clone();
        }
        if self.verbose {
            base.verbose = true;
        }
        if self.no_color {
            base.color = false;
        }
        if let Some(gating) = self.gating {
            base.gating = gating;
        }
        base
    }
}
