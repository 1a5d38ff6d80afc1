//! Download commands
//!
//! # Usage
//!
//! ```bash
//! mpat download ark 2024-01-01 20240102 --destination-dsn http://localhost:8123/mpat
//! MPAT_ARK_USERNAME=me MPAT_ARK_PASSWORD=... mpat download ark --input-file dates.txt
//! ```

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use mpat_config::Config;
use mpat_sources::{ArkClient, DEFAULT_HTTP_TIMEOUT, WartsReader, build_client, parse_cycle_date};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use super::{CommonArgs, connect_destination, report};
use crate::settings;

/// Download measurements from a remote archive
#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(subcommand)]
    pub command: DownloadCommand,
}

#[derive(Subcommand, Debug)]
pub enum DownloadCommand {
    /// Ark daily cycles into ark_results__cycle<YYYYMMDD> tables
    Ark(ArkArgs),
}

#[derive(Args, Debug)]
pub struct ArkArgs {
    /// Cycle dates (YYYY-MM-DD or YYYYMMDD)
    pub dates: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn run(args: DownloadArgs, config: Config, cancel: &CancellationToken) -> Result<()> {
    match args.command {
        DownloadCommand::Ark(args) => ark(args, config, cancel).await,
    }
}

async fn ark(args: ArkArgs, config: Config, cancel: &CancellationToken) -> Result<()> {
    let config = args.common.resolve(config)?;
    let dates = args
        .common
        .arguments(&args.dates)?
        .iter()
        .map(|d| parse_cycle_date(d))
        .collect::<Result<Vec<_>, _>>()?;

    let base_url = Url::parse(&config.ark.base_url).context("invalid Ark base URL")?;
    let credentials = settings::ark_credentials(&config.ark);
    if credentials.is_none() {
        info!("no Ark credentials, requesting anonymously");
    }

    let http = build_client(DEFAULT_HTTP_TIMEOUT)?;
    let ark = ArkClient::new(http.clone(), base_url, credentials.clone());
    let reader = WartsReader::new(http, credentials, settings::converter_config(&config));

    let runner = connect_destination(&config).await?;
    let report = runner
        .download_ark(&ark, &reader, &dates, cancel)
        .await
        .context("Ark download failed")?;

    report::print("download ark", &report);
    Ok(())
}
