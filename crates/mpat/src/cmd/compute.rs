//! Compute commands
//!
//! Flows are read from results tables in the source store; the derived
//! tables are written to the destination store.
//!
//! # Usage
//!
//! ```bash
//! mpat compute routes results__<uuid>__<uuid>
//! mpat compute forwarding-decisions --input-file tables.txt --force-reset-destination
//! ```

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use mpat_config::Config;
use tokio_util::sync::CancellationToken;

use super::{TablesArgs, connect, report};

/// Compute derived tables
#[derive(Args, Debug)]
pub struct ComputeArgs {
    #[command(subcommand)]
    pub command: ComputeCommand,
}

#[derive(Subcommand, Debug)]
pub enum ComputeCommand {
    /// Next-hop triples into routes__* tables
    Routes(TablesArgs),

    /// Adjacent hop pairs into forwarding_decisions__* tables
    ForwardingDecisions(TablesArgs),
}

pub async fn run(args: ComputeArgs, config: Config, cancel: &CancellationToken) -> Result<()> {
    match args.command {
        ComputeCommand::Routes(args) => {
            let config = args.common.resolve(config)?;
            let tables = args.common.arguments(&args.tables)?;
            let runner = connect(&config).await?;
            let report = runner
                .compute_routes(&tables, cancel)
                .await
                .context("computing routes failed")?;
            report::print("compute routes", &report);
        }
        ComputeCommand::ForwardingDecisions(args) => {
            let config = args.common.resolve(config)?;
            let tables = args.common.arguments(&args.tables)?;
            let runner = connect(&config).await?;
            let report = runner
                .compute_forwarding_decisions(&tables, cancel)
                .await
                .context("computing forwarding decisions failed")?;
            report::print("compute forwarding-decisions", &report);
        }
    }
    Ok(())
}
