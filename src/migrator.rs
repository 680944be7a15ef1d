//! Migration Controller
//!
//! [`Migrator`] drives one migration run: plan, then for each pending unit run
//! it and record it, stopping at the first failure.
//!
//! # State flow
//!
//! ```text
//! Idle ──up()──▶ Planning ──empty plan──▶ Applied
//!                   │  └──scan/store error──▶ Failed
//!                   ▼
//!              Applying(0) ─▶ Applying(1) ─▶ … ─▶ Applied
//!                   └───────── run/insert error ──▶ Failed
//! ```
//!
//! `Applied` and `Failed` are terminal for a run; the next `up()` starts a new
//! one from `Planning`. A failed run leaves exactly the units recorded before
//! the failure, so recovering is just running `up()` again.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, error, info};

use crate::config::MigrateConfig;
use crate::error::{MigrateError, Result};
use crate::executor::Executor;
use crate::planner::{self, GatingMode, PlannedMigration};
use crate::scanner::{self, MigrationUnit};
use crate::status::StatusReport;
use crate::store::{MigrationRecord, VersionStore};

/// Where the migrator is within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationState {
    #[default]
    Idle,
    Planning,
    /// Running the unit at this index of the plan
    Applying(usize),
    Applied,
    Failed,
}

impl MigrationState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Applied | Self::Failed)
    }

    /// Whether `self -> next` is a legal step
    pub fn can_transition_to(self, next: Self) -> bool {
        use MigrationState::*;
        match (self, next) {
            (Idle | Applied | Failed, Planning) => true,
            (Planning, Applying(0) | Applied | Failed) => true,
            (Applying(i), Applying(j)) => j == i + 1,
            (Applying(_), Applied | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Planning => write!(f, "planning"),
            Self::Applying(i) => write!(f, "applying #{}", i + 1),
            Self::Applied => write!(f, "applied"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Orchestrates scanner, planner, executor and version store.
pub struct Migrator<S, E> {
    config: MigrateConfig,
    store: S,
    executor: E,
    state: MigrationState,
}

impl<S: VersionStore, E: Executor> Migrator<S, E> {
    pub fn new(config: MigrateConfig, store: S, executor: E) -> Self {
        Self {
            config,
            store,
            executor,
            state: MigrationState::Idle,
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn transition(&mut self, next: MigrationState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(MigrateError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("migrator: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Compute the pending units without running anything.
    pub fn find_migrations(&self) -> Result<PlannedMigration> {
        match self.config.gating {
            GatingMode::OrderKey => {
                let last_applied_id = self.store.last_applied_id()?;
                let units = scanner::scan(&self.config.directory)?;
                Ok(planner::plan(units, last_applied_id))
            }
            GatingMode::AppliedName => {
                let applied: HashSet<String> = self
                    .store
                    .find_all()?
                    .into_iter()
                    .map(|r| r.name)
                    .collect();
                let units = scanner::scan(&self.config.directory)?;
                Ok(planner::plan_by_name(units, &applied))
            }
        }
    }

    /// Apply every pending migration in order.
    ///
    /// Returns how many were applied. When a unit fails to run or record, the
    /// error is `MigrateError::Halted` carrying the count applied before it.
    pub fn up(&mut self) -> Result<usize> {
        self.transition(MigrationState::Planning)?;

        let planned = match self.find_migrations() {
            Ok(planned) => planned,
            Err(e) => {
                self.transition(MigrationState::Failed)?;
                return Err(e);
            }
        };

        if planned.is_empty() {
            info!("no migrations to run");
            self.transition(MigrationState::Applied)?;
            return Ok(0);
        }

        info!("{} migration(s) to run: {}", planned.len(), planned.names().join(", "));

        let result = planned
            .into_iter()
            .enumerate()
            .try_fold(0usize, |applied, (index, unit)| {
                self.apply_one(index, &unit)
                    .map(|_| applied + 1)
                    .map_err(|source| (applied, unit.name, source))
            });

        match result {
            Ok(applied) => {
                self.transition(MigrationState::Applied)?;
                info!("applied {} migration(s)", applied);
                Ok(applied)
            }
            Err((applied, name, source)) => {
                error!("migration {} failed: {}", name, source);
                self.transition(MigrationState::Failed)?;
                Err(MigrateError::Halted {
                    applied,
                    name,
                    source: Box::new(source),
                })
            }
        }
    }

    fn apply_one(&mut self, index: usize, unit: &MigrationUnit) -> Result<MigrationRecord> {
        self.transition(MigrationState::Applying(index))?;
        info!("applying {}", unit.name);
        self.executor.run(unit)?;
        let record = self.store.insert(&unit.name)?;
        info!("applied {} (version {})", record.name, record.id);
        Ok(record)
    }

    /// Applied migrations, oldest first.
    pub fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport::new(self.store.find_all()?))
    }

    /// Same as [`Migrator::find_migrations`], for the `pending` command.
    pub fn pending(&self) -> Result<PlannedMigration> {
        self.find_migrations()
    }

    /// Remove the record for `name` so it is no longer considered applied.
    pub fn forget(&self, name: &str) -> Result<()> {
        info!("forgetting migration {}", name);
        self.store.delete(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use std::cell::RefCell;
    use std::fs::File;
    use std::path::Path;

    #[derive(Default)]
    struct Recorder {
        runs: RefCell<Vec<String>>,
        fail_on: Option<String>,
    }

    impl Executor for Recorder {
        fn run(&self, unit: &MigrationUnit) -> Result<()> {
            self.runs.borrow_mut().push(unit.name.clone());
            if self.fail_on.as_deref() == Some(unit.name.as_str()) {
                return Err(MigrateError::execution(&unit.name, "exit code 1"));
            }
            Ok(())
        }
    }

    fn migrator(dir: &Path, recorder: Recorder) -> Migrator<SqliteStore, Recorder> {
        let config = MigrateConfig {
            directory: dir.to_path_buf(),
            ..MigrateConfig::default()
        };
        Migrator::new(config, SqliteStore::in_memory().unwrap(), recorder)
    }

    #[test]
    fn test_state_transitions() {
        use MigrationState::*;
        assert!(Idle.can_transition_to(Planning));
        assert!(Planning.can_transition_to(Applying(0)));
        assert!(Applying(0).can_transition_to(Applying(1)));
        assert!(Applying(2).can_transition_to(Failed));
        assert!(Applied.can_transition_to(Planning));

        assert!(!Idle.can_transition_to(Applying(0)));
        assert!(!Planning.can_transition_to(Applying(1)));
        assert!(!Applying(0).can_transition_to(Applying(2)));
        assert!(!Applied.can_transition_to(Applying(0)));
        assert!(Applied.is_terminal() && Failed.is_terminal());
        assert_eq!(Applying(0).to_string(), "applying #1");
    }

    #[test]
    fn test_up_with_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = migrator(dir.path(), Recorder::default());
        assert_eq!(m.up().unwrap(), 0);
        assert_eq!(m.state(), MigrationState::Applied);
    }

    #[test]
    fn test_up_stops_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1-a", "2-b", "3-c"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let recorder = Recorder {
            fail_on: Some("2-b".to_string()),
            ..Recorder::default()
        };
        let mut m = migrator(dir.path(), recorder);

        let err = m.up().unwrap_err();
        assert_eq!(err.applied_before_failure(), Some(1));
        assert_eq!(m.state(), MigrationState::Failed);
        assert_eq!(*m.executor().runs.borrow(), ["1-a", "2-b"]);
        assert_eq!(m.store().find_all().unwrap().len(), 1);
    }

    #[test]
    fn test_up_missing_directory_fails_planning() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = migrator(&dir.path().join("missing"), Recorder::default());
        let err = m.up().unwrap_err();
        assert!(matches!(err, MigrateError::DirectoryRead { .. }));
        assert_eq!(m.state(), MigrationState::Failed);
        assert!(m.executor().runs.borrow().is_empty());
    }
}
