//! Tests for task execution through a real child process
//!
//! A small shell script stands in for the `task` binary. It logs every call
//! and fails when the taskfile contains the word FAIL, which lets these tests
//! verify:
//! - The runner command line (taskfile, flags, target)
//! - Non-zero exits surfacing as execution errors with the task's stderr
//! - A full `up` run through `TaskRunner` and the SQLite store

use std::fs;
use std::path::{Path, PathBuf};

use task_migrate::{
    Executor, IoMode, MigrateConfig, MigrateError, MigrationUnit, Migrator, RunnerConfig,
    SqliteStore, TaskRunner, VersionStore,
};

/// Write the stand-in runner and return (script path, log path).
fn fake_task(dir: &Path) -> (PathBuf, PathBuf) {
    let script = dir.join("fake-task.sh");
    let log = dir.join("calls.log");
    let body = format!(
        r#"file=""
target=""
flags=""
while [ $# -gt 0 ]; do
  case "$1" in
    --taskfile) file="$2"; shift 2 ;;
    --*) flags="$flags $1"; shift ;;
    *) target="$1"; shift ;;
  esac
done
echo "$(basename "$file") $target$flags" >> "{log}"
if grep -q FAIL "$file"; then
  echo "task: Failed to run task \"$target\": exit status 1" >&2
  exit 201
fi
"#,
        log = log.display()
    );
    fs::write(&script, body).unwrap();
    (script, log)
}

fn runner_config(script: &Path) -> RunnerConfig {
    RunnerConfig {
        program: "sh".to_string(),
        args: vec![script.display().to_string()],
        target: "up".to_string(),
    }
}

fn calls(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn write_versions(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    let versions = dir.join("versions");
    fs::create_dir_all(&versions).unwrap();
    for (name, content) in files {
        fs::write(versions.join(name), content).unwrap();
    }
    versions
}

#[test]
fn test_runner_passes_taskfile_and_target() {
    let dir = tempfile::tempdir().unwrap();
    let (script, log) = fake_task(dir.path());
    let versions = write_versions(dir.path(), &[("1-init.yml", "version: '3'\n")]);

    let runner = TaskRunner::new(runner_config(&script), false, true).with_io(IoMode::Capture);
    let unit = MigrationUnit::from_path(versions.join("1-init.yml")).unwrap();
    runner.run(&unit).unwrap();

    assert_eq!(calls(&log), ["1-init.yml up"]);
}

#[test]
fn test_runner_default_io_inherits_streams() {
    let dir = tempfile::tempdir().unwrap();
    let (script, log) = fake_task(dir.path());
    let versions = write_versions(dir.path(), &[("1-init.yml", "version: '3'\n")]);

    let runner = TaskRunner::new(runner_config(&script), false, true);
    let unit = MigrationUnit::from_path(versions.join("1-init.yml")).unwrap();
    runner.run(&unit).unwrap();

    assert_eq!(calls(&log), ["1-init.yml up"]);
}

#[test]
fn test_runner_passes_verbose_and_color_flags() {
    let dir = tempfile::tempdir().unwrap();
    let (script, log) = fake_task(dir.path());
    let versions = write_versions(dir.path(), &[("1-init.yml", "version: '3'\n")]);

    let runner = TaskRunner::new(runner_config(&script), true, false).with_io(IoMode::Capture);
    let unit = MigrationUnit::from_path(versions.join("1-init.yml")).unwrap();
    runner.run(&unit).unwrap();

    assert_eq!(calls(&log), ["1-init.yml up --verbose --color=false"]);
}

#[test]
fn test_runner_failure_carries_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let (script, _log) = fake_task(dir.path());
    let versions = write_versions(dir.path(), &[("1-broken.yml", "FAIL\n")]);

    let runner = TaskRunner::new(runner_config(&script), false, true).with_io(IoMode::Capture);
    let unit = MigrationUnit::from_path(versions.join("1-broken.yml")).unwrap();

    let outcome = runner.execute(&unit).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, Some(201));

    let err = runner.run(&unit).unwrap_err();
    match err {
        MigrateError::Execution { name, detail } => {
            assert_eq!(name, "1-broken.yml");
            assert!(detail.contains("exit code 201"), "detail: {detail}");
            assert!(detail.contains("Failed to run task"), "detail: {detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_up_through_task_runner() {
    let dir = tempfile::tempdir().unwrap();
    let (script, log) = fake_task(dir.path());
    let versions = write_versions(
        dir.path(),
        &[
            ("1-a.yml", "ok\n"),
            ("2-b.yml", "ok\n"),
            ("3-c.yml", "FAIL\n"),
            ("4-d.yml", "ok\n"),
        ],
    );

    let config = MigrateConfig {
        directory: versions.clone(),
        database: dir.path().join("database.db"),
        runner: runner_config(&script),
        ..MigrateConfig::default()
    };
    let runner = TaskRunner::new(config.runner.clone(), false, true).with_io(IoMode::Capture);
    let store = SqliteStore::open(&config.database).unwrap();
    let mut migrator = Migrator::new(config.clone(), store, runner);

    let err = migrator.up().unwrap_err();
    assert_eq!(err.applied_before_failure(), Some(2));
    assert_eq!(calls(&log), ["1-a.yml up", "2-b.yml up", "3-c.yml up"]);

    // Fix the broken unit and re-run with a fresh store handle on the same file
    fs::write(versions.join("3-c.yml"), "ok\n").unwrap();
    let runner = TaskRunner::new(config.runner.clone(), false, true).with_io(IoMode::Capture);
    let store = SqliteStore::open(&config.database).unwrap();
    let mut migrator = Migrator::new(config, store, runner);

    assert_eq!(migrator.up().unwrap(), 2);
    assert_eq!(
        calls(&log),
        ["1-a.yml up", "2-b.yml up", "3-c.yml up", "3-c.yml up", "4-d.yml up"]
    );
    let names: Vec<_> = migrator
        .store()
        .find_all()
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, ["1-a.yml", "2-b.yml", "3-c.yml", "4-d.yml"]);
}
