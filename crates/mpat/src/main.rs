//! MPAT - Measurement-data processing
//!
//! # Usage
//!
//! ```bash
//! # Mirror production results tables into a working store
//! mpat cp results__<uuid>__<uuid> --source-dsn http://iris:8123/iris --destination-dsn http://localhost:8123/mpat
//!
//! # Derive routes and forwarding decisions
//! mpat compute routes --input-file tables.txt
//! mpat compute forwarding-decisions results__<uuid>__<uuid>
//!
//! # Ingest warts
//! mpat download ark 2024-01-01 2024-01-02
//! mpat upload iris-results results__<uuid>__<uuid> a.warts.gz b.warts
//!
//! # Compare source and destination
//! mpat check results__<uuid>__<uuid>
//! ```

mod cmd;
mod logging;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mpat_config::{Config, ENV_DEBUG};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

/// MPAT - copy, derive and ingest traceroute measurement tables
#[derive(Parser, Debug)]
#[command(name = "mpat")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive. Overrides MPAT_DEBUG and the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy tables from the source store to the destination store
    Cp(cmd::TablesArgs),

    /// Compute derived tables from results tables
    Compute(cmd::compute::ComputeArgs),

    /// Download measurements from a remote archive
    Download(cmd::download::DownloadArgs),

    /// Upload local measurement files
    Upload(cmd::upload::UploadArgs),

    /// Show source and destination metadata of tables
    Check(cmd::TablesArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let debug = std::env::var(ENV_DEBUG).ok();
    let level = logging::resolve_log_level(cli.log_level.as_deref(), debug.as_deref(), &config.log);
    if let Err(e) = logging::init_logging(&level, config.log.format) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    let interrupted = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(cancel.clone(), Arc::clone(&interrupted));

    match run(cli.command, config, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if interrupted.load(Ordering::Acquire) {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(command: Command, config: Config, cancel: &CancellationToken) -> Result<()> {
    match command {
        Command::Cp(args) => cmd::cp::run(args, config, cancel).await,
        Command::Compute(args) => cmd::compute::run(args, config, cancel).await,
        Command::Download(args) => cmd::download::run(args, config, cancel).await,
        Command::Upload(args) => cmd::upload::run(args, config, cancel).await,
        Command::Check(args) => cmd::check::run(args, config).await,
    }
}

/// Load the configuration file, or defaults when none is given
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            Config::from_file(path).context("failed to load configuration")
        }
        None => Ok(Config::default()),
    }
}

/// Cancel the shared token on Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken, interrupted: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            warn!("failed to install Ctrl-C handler");
            return;
        }
        warn!("interrupted, draining pipelines");
        interrupted.store(true, Ordering::Release);
        cancel.cancel();
    });
}
