//! Executor boundary
//!
//! The migration core only needs one thing from a task engine: run a unit to
//! completion and say whether it worked. [`Executor`] is that contract and
//! [`TaskRunner`] is the adapter over the external `task` binary.
//!
//! Task processes go through the same lifecycle rules as everything else we
//! spawn: own process group, registered with [`ChildRegistry`] while running.
//! The exception is a task that inherits a terminal stdin. It stays in our
//! foreground process group so it can prompt.

use std::io::IsTerminal;
use std::process::{Command, Output, Stdio};

use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::error::{MigrateError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use crate::scanner::MigrationUnit;

/// Runs a single migration unit.
pub trait Executor {
    /// Block until the unit has finished. Any failure of the run, including
    /// a failing internal step, must come back as `MigrateError::Execution`.
    fn run(&self, unit: &MigrationUnit) -> Result<()>;
}

/// What happens to the task process's standard streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    /// Share stdin/stdout/stderr with task-migrate
    #[default]
    Inherit,
    /// Close stdin and capture stdout/stderr; stderr becomes the diagnostic
    Capture,
}

/// Result of one task process
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub stdout: String,
    pub stderr: String,
    /// None if the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl TaskOutcome {
    fn from_output(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            success: output.status.success(),
        }
    }

    /// Turn a failed outcome into an execution error for `unit`.
    pub fn ensure_success(&self, unit: &MigrationUnit, target: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }

        let status = match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        let detail = if stderr.is_empty() {
            format!("task {target:?} failed ({status})")
        } else {
            format!("task {target:?} failed ({status}): {stderr}")
        };
        Err(MigrateError::execution(&unit.name, detail))
    }
}

/// [`Executor`] that shells out to the `task` runner.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    runner: RunnerConfig,
    verbose: bool,
    color: bool,
    io: IoMode,
}

impl TaskRunner {
    pub fn new(runner: RunnerConfig, verbose: bool, color: bool) -> Self {
        Self {
            runner,
            verbose,
            color,
            io: IoMode::default(),
        }
    }

    pub fn with_io(mut self, io: IoMode) -> Self {
        self.io = io;
        self
    }

    /// Arguments passed after the program name for `unit`.
    pub fn command_args(&self, unit: &MigrationUnit) -> Vec<String> {
        let mut args = self.runner.args.clone();
        args.push("--taskfile".to_string());
        args.push(unit.path.display().to_string());
        if self.verbose {
            args.push("--verbose".to_string());
        }
        if !self.color {
            args.push("--color=false".to_string());
        }
        args.push(self.runner.target.clone());
        args
    }

    fn shares_terminal(&self) -> bool {
        self.io == IoMode::Inherit && std::io::stdin().is_terminal()
    }

    /// Spawn the task process for `unit` and wait for it.
    pub fn execute(&self, unit: &MigrationUnit) -> Result<TaskOutcome> {
        let args = self.command_args(unit);
        info!("running {} {}", self.runner.program, args.join(" "));

        let mut cmd = Command::new(&self.runner.program);
        cmd.args(&args);
        if self.shares_terminal() {
            debug!("stdin is a terminal, keeping task in the foreground process group");
            cmd.with_parent_death_signal();
        } else {
            cmd.in_new_process_group();
        }
        match self.io {
            IoMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            IoMode::Capture => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
        }

        let child = cmd.spawn().map_err(|e| {
            MigrateError::execution(
                &unit.name,
                format!("failed to start {}: {e}", self.runner.program),
            )
        })?;
        let pid = child.id();
        with_registry(|registry| registry.register(pid));

        let waited = child.wait_with_output();
        with_registry(|registry| registry.unregister(pid));

        let output = waited.map_err(|e| {
            MigrateError::execution(&unit.name, format!("failed waiting for task: {e}"))
        })?;
        let outcome = TaskOutcome::from_output(output);

        if outcome.success {
            debug!("task for {} exited cleanly", unit.name);
        } else {
            warn!("task for {} failed with {:?}", unit.name, outcome.exit_code);
        }
        Ok(outcome)
    }
}

impl Executor for TaskRunner {
    fn run(&self, unit: &MigrationUnit) -> Result<()> {
        self.execute(unit)?
            .ensure_success(unit, &self.runner.target)
    }
}

fn with_registry(f: impl FnOnce(&mut ChildRegistry)) {
    match ChildRegistry::global().lock() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}
