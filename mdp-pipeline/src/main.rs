//! mdp-pipeline - Maritime data pipeline
//!
//! Polls the positions, sea-state and port-call feeds on their own
//! intervals, keeps deduplicated raw tables and periodically writes the
//! normalised and fused tables.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use mdp_common::config::{load_toml_config, resolve_config_path, resolve_data_dir};
use mdp_pipeline::{Pipeline, Scheduler, SchedulerPlan};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for mdp-pipeline
#[derive(Parser, Debug)]
#[command(name = "mdp-pipeline")]
#[command(about = "Collects, deduplicates and fuses maritime AIS, sea-state and port-call feeds")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder for raw tables and tabular outputs
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log filter (overrides RUST_LOG and the config file), e.g. "debug"
    #[arg(long)]
    log_level: Option<String>,

    /// Run the selected stages once and exit
    #[arg(long)]
    one_time: bool,

    /// Only fetch and store raw data
    #[arg(long, conflicts_with = "transform_only")]
    extract_only: bool,

    /// Only normalise and fuse what is already stored
    #[arg(long)]
    transform_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_toml_config(&config_path).context("Failed to load configuration")?;

    init_logging(args.log_level.as_deref(), &config.logging.level, config.logging.file.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        build_timestamp = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting mdp-pipeline"
    );
    info!("Configuration: {}", config_path.display());

    config.validate().context("Invalid configuration")?;

    let data_dir = resolve_data_dir(args.data_dir.as_deref(), &config);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data folder {}", data_dir.display()))?;
    info!("Data folder: {}", data_dir.display());

    let plan = SchedulerPlan {
        extract: !args.transform_only,
        transform: !args.extract_only,
    };

    let pipeline = Pipeline::new(&config, &data_dir).context("Failed to initialise pipeline")?;
    let pipeline = Arc::new(attach_sink(pipeline, &config).await?);

    if args.one_time {
        info!(extract = plan.extract, transform = plan.transform, "Running once");
        Scheduler::run_once(&pipeline, plan).await;
        info!("One-time run complete");
        return Ok(());
    }

    let scheduler = Scheduler::new(pipeline, config.schedule.clone(), plan);
    let cancel = scheduler.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Finishing in-flight ticks before exit");
        cancel.cancel();
    });

    scheduler.run().await;
    info!("Shutdown complete");
    Ok(())
}

/// Console layer plus an optional plain-text file layer
///
/// Filter priority: `--log-level` → `RUST_LOG` → config `[logging].level`.
fn init_logging(cli_level: Option<&str>, config_level: &str, file: Option<&Path>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(config_level)?,
        },
    };

    let file_layer = match file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(feature = "sqlx")]
async fn attach_sink(pipeline: Pipeline, config: &mdp_common::config::TomlConfig) -> Result<Pipeline> {
    match &config.sink {
        Some(sink) => {
            let sqlite = mdp_pipeline::sink::SqliteSink::connect(&sink.database_path)
                .await
                .context("Failed to open SQLite sink")?;
            Ok(pipeline.with_sink(Arc::new(sqlite)))
        }
        None => Ok(pipeline),
    }
}

#[cfg(not(feature = "sqlx"))]
async fn attach_sink(pipeline: Pipeline, config: &mdp_common::config::TomlConfig) -> Result<Pipeline> {
    if config.sink.is_some() {
        warn!("[sink] configured but this build has no SQLite support; ignoring");
    }
    Ok(pipeline)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
