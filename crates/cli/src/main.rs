use crate::{commands::Commands, env::EnvManager, error::CliError, output::{CheckpointView, StatusReport}, shutdown::ShutdownCoordinator};
use clap::Parser;
use config::{run_preflight, Config};
use engine_core::{CheckpointStore, ProgressStore, SqlCheckpointStore, SqlProgressStore};
use model::MigrationKey;
use mysql::MySqlAdapter;
use orchestrator::Orchestrator;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "replicate", version = "0.1.0", about = "Resumable MySQL-to-MySQL single-table replication")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let exit_code = match run_cli().await {
        Ok(()) => 0,
        Err(e) => match &e {
            CliError::ShutdownRequested => {
                info!("shutdown completed gracefully");
                130
            }
            _ => {
                tracing::error!("{e}");
                1
            }
        },
    };

    process::exit(exit_code);
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { env_file } => run_replication(env_file.as_deref()).await,
        Commands::Status { env_file, json } => show_status(env_file.as_deref(), json).await,
    }
}

fn load_config(env_file: Option<&str>) -> Result<Config, CliError> {
    let mut env_manager = EnvManager::new();
    if let Some(path) = env_file {
        info!(path, "loading environment overlay from file");
        env_manager.load_from_file(path)?;
    }
    Ok(Config::from_vars(env_manager.all())?)
}

async fn run_replication(env_file: Option<&str>) -> Result<(), CliError> {
    let config = load_config(env_file)?;

    let cancel = CancellationToken::new();
    let shutdown_coordinator = ShutdownCoordinator::new(cancel.clone());
    shutdown_coordinator.register_handlers();

    let source = MySqlAdapter::connect(&config.src_dsn)?;
    let target = MySqlAdapter::connect(&config.tgt_dsn)?;

    let preflight = run_preflight(&config, &source, &target).await;
    if !preflight.passed() {
        return Err(CliError::PreflightFailed(preflight.failures));
    }

    let orchestrator = Orchestrator::new(config, source, target);
    match orchestrator.run(cancel).await {
        Ok(()) => {
            info!("replication loop exited");
            Ok(())
        }
        Err(e) if shutdown_coordinator.is_shutdown_requested() => {
            info!(error = %e, "replication stopped by shutdown signal, last checkpoint stands");
            Err(CliError::ShutdownRequested)
        }
        Err(e) => Err(CliError::Orchestrator(e)),
    }
}

async fn show_status(env_file: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let config = load_config(env_file)?;
    let key = MigrationKey::new(&config.src_dsn, &config.src_db, &config.src_table);

    let target = MySqlAdapter::connect(&config.tgt_dsn)?;
    let checkpoints = SqlCheckpointStore::new(target.clone(), config.checkpoint_table.clone());
    let progress = SqlProgressStore::new(target, "full_load_progress");

    checkpoints.ensure_table(&config.checkpoint_table).await?;
    progress.ensure_table().await?;

    let checkpoint = checkpoints.read(&key).await?.map(|cp| CheckpointView { file: cp.file, pos: cp.pos });
    let done_ranges = progress.done_ranges(&key).await?.len();

    let report = StatusReport {
        key: key.to_string(),
        checkpoint,
        done_ranges,
    };

    output::print_status(&report, as_json)
}
