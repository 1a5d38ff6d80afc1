//! Copy command
//!
//! # Usage
//!
//! ```bash
//! mpat cp results__<uuid>__<uuid> --source-dsn http://iris:8123/iris --destination-dsn http://localhost:8123/mpat
//! mpat cp --input-file tables.txt --chunk-size 500000 --parallel-downloads 8
//! ```

use anyhow::{Context, Result};
use mpat_config::Config;
use tokio_util::sync::CancellationToken;

use super::{TablesArgs, connect, report};

pub async fn run(args: TablesArgs, config: Config, cancel: &CancellationToken) -> Result<()> {
    let config = args.common.resolve(config)?;
    let tables = args.common.arguments(&args.tables)?;

    let runner = connect(&config).await?;
    let report = runner.copy(&tables, cancel).await.context("copy failed")?;

    report::print("cp", &report);
    Ok(())
}
