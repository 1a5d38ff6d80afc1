//! Upload commands
//!
//! # Usage
//!
//! ```bash
//! mpat upload iris-results results__<uuid>__<uuid> a.warts.gz b.warts
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use mpat_config::Config;
use mpat_sources::{DEFAULT_HTTP_TIMEOUT, WartsReader, build_client};
use tokio_util::sync::CancellationToken;

use super::{CommonArgs, connect_destination, report};
use crate::settings;

/// Upload local measurement files
#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(subcommand)]
    pub command: UploadCommand,
}

#[derive(Subcommand, Debug)]
pub enum UploadCommand {
    /// Warts files (plain or gzipped) into an Iris results table
    IrisResults(IrisResultsArgs),
}

#[derive(Args, Debug)]
pub struct IrisResultsArgs {
    /// Destination results table
    pub table: String,

    /// Warts files
    pub files: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn run(args: UploadArgs, config: Config, cancel: &CancellationToken) -> Result<()> {
    match args.command {
        UploadCommand::IrisResults(args) => iris_results(args, config, cancel).await,
    }
}

async fn iris_results(args: IrisResultsArgs, config: Config, cancel: &CancellationToken) -> Result<()> {
    let config = args.common.resolve(config)?;
    let files: Vec<PathBuf> = args
        .common
        .arguments(&args.files)?
        .into_iter()
        .map(PathBuf::from)
        .collect();

    let http = build_client(DEFAULT_HTTP_TIMEOUT)?;
    let reader = WartsReader::new(http, None, settings::converter_config(&config));

    let runner = connect_destination(&config).await?;
    let report = runner
        .upload_iris_results(&reader, &args.table, &files, cancel)
        .await
        .with_context(|| format!("upload into {} failed", args.table))?;

    report::print("upload iris-results", &report);
    Ok(())
}
