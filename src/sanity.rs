//! Pre-flight checks before applying migrations
//!
//! `up` refuses to start when the migration run is bound to fail on the first
//! unit anyway: the runner program is missing or the migrations directory is
//! not a directory. Nothing has been executed or recorded at that point.

use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::config::MigrateConfig;
use crate::process_guard::CommandProcessGroup;

/// Outcome of the pre-flight checks
#[derive(Debug, Default)]
pub struct PreflightResult {
    /// Runner program that could not be found, if any
    pub missing_runner: Option<String>,
    /// Migrations directory that does not exist or is not a directory
    pub missing_directory: Option<String>,
}

impl PreflightResult {
    pub fn is_ok(&self) -> bool {
        self.missing_runner.is_none() && self.missing_directory.is_none()
    }

    /// One line per failed check, for the error message
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(program) = &self.missing_runner {
            problems.push(format!(
                "runner {program:?} not found (install Task from https://taskfile.dev or set runner.program)"
            ));
        }
        if let Some(dir) = &self.missing_directory {
            problems.push(format!("migrations directory {dir:?} does not exist"));
        }
        problems
    }
}

/// Check if a program is runnable: a path with a slash must exist, a bare name
/// must be found by `which`.
pub fn program_exists(program: &str) -> bool {
    if program.contains('/') {
        return Path::new(program).is_file();
    }
    Command::new("which")
        .arg(program)
        .in_new_process_group()
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn verify_environment(config: &MigrateConfig) -> PreflightResult {
    let mut result = PreflightResult::default();

    if !program_exists(&config.runner.program) {
        result.missing_runner = Some(config.runner.program.clone());
    }
    if !config.directory.is_dir() {
        result.missing_directory = Some(config.directory.display().to_string());
    }
    result
}

/// Run every check and fail with all problems listed.
pub fn run_preflight_checks(config: &MigrateConfig) -> anyhow::Result<()> {
    debug!("running pre-flight checks");
    let result = verify_environment(config);
    if !result.is_ok() {
        anyhow::bail!("pre-flight check failed:\n  {}", result.problems().join("\n  "));
    }
    info!("pre-flight checks passed");
    Ok(())
}
