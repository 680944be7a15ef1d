//! task-migrate - main entry point

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use task_migrate::cli::{Cli, Commands};
use task_migrate::{MigrateConfig, Migrator, SqliteStore, TaskRunner, process_guard, sanity};

/// Initialize the tracing subscriber on stderr.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
fn init_logger(verbose: bool, color: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<MigrateConfig> {
    let base = match &cli.config {
        Some(path) => MigrateConfig::load_from_file(path)?,
        None => MigrateConfig::default(),
    };
    let config = cli.apply_overrides(base);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(cli: Cli, config: MigrateConfig) -> Result<()> {
    debug!("configuration: {:?}", config);

    let store = SqliteStore::open(&config.database).context("failed to get db")?;
    let runner = TaskRunner::new(config.runner.clone(), config.verbose, config.color);
    let color = config.color;
    let mut migrator = Migrator::new(config, store, runner);

    match cli.command {
        Commands::Up => {
            sanity::run_preflight_checks(migrator.config())?;
            let applied = migrator.up().context("failed to run migrations")?;
            info!("migration run complete, {} applied", applied);
        }
        Commands::Status => {
            let report = migrator.status().context("failed to render status")?;
            print!("{}", report.render(color));
        }
        Commands::Pending => {
            let planned = migrator
                .pending()
                .context("failed to determine pending migrations")?;
            if planned.is_empty() {
                println!("no migrations to run");
            }
            for unit in planned.units() {
                println!("{}\t{}", unit.order_key, unit.name);
            }
        }
        Commands::Forget { name } => {
            migrator
                .forget(&name)
                .with_context(|| format!("failed to forget migration {name}"))?;
            println!("forgot {name}");
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse_args();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            std::process::exit(1);
        }
    };
    init_logger(config.verbose, config.color);

    // Task processes are cleaned up on SIGINT/SIGTERM/SIGHUP
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("failed to initialize signal handlers: {}", e);
    }

    if let Err(e) = run(cli, config) {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
