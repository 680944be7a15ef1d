//! task-migrate library
//!
//! Applies an ordered directory of Task files against an environment and
//! records each one that succeeds, so re-running only picks up new files.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod migrator;
pub mod planner;
pub mod process_guard;
pub mod sanity;
pub mod scanner;
pub mod status;
pub mod store;

pub use config::{MigrateConfig, RunnerConfig};
pub use error::{MigrateError, Result};
pub use executor::{Executor, IoMode, TaskOutcome, TaskRunner};
pub use migrator::{MigrationState, Migrator};
pub use planner::{GatingMode, PlannedMigration, plan, plan_by_name};
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use scanner::{MigrationUnit, scan};
pub use status::StatusReport;
pub use store::{MigrationRecord, SqliteStore, VersionStore};
