//! Check command
//!
//! Prints source and destination metadata of each table and whether the
//! destination already holds as many rows as the source.
//!
//! # Usage
//!
//! ```bash
//! mpat check results__<uuid>__<uuid> --destination-dsn http://localhost:8123/mpat
//! ```

use anyhow::{Context, Result};
use mpat_config::Config;
use owo_colors::OwoColorize;

use super::{TablesArgs, connect};

pub async fn run(args: TablesArgs, config: Config) -> Result<()> {
    let config = args.common.resolve(config)?;
    let tables = args.common.arguments(&args.tables)?;

    let runner = connect(&config).await?;
    let checks = runner.check(&tables).await.context("failed to read table info")?;

    println!();
    println!("{}", "mpat check".bold());
    println!("{}", "─".repeat(50));

    let mut coherent = 0;
    for check in &checks {
        if check.is_coherent() {
            coherent += 1;
            println!("{} {}", "✓".green(), check.source.table);
        } else {
            println!("{} {}", "✗".red(), check.source.table);
        }
        println!("    source       {}", check.source.to_string().dimmed());
        println!("    destination  {}", check.destination.to_string().dimmed());
    }

    println!("{}", "─".repeat(50));
    println!("{coherent}/{} tables coherent", checks.len());
    println!();
    Ok(())
}
