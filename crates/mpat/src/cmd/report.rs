//! Job summaries on stdout

use mpat_jobs::{JobReport, TableStatus};
use owo_colors::OwoColorize;

/// Print one line per table and the job counters
pub fn print(job: &str, report: &JobReport) {
    println!();
    println!("{}", format!("mpat {job}").bold());
    println!("{}", "─".repeat(50));

    for outcome in &report.tables {
        let status = format!("{:<10}", outcome.status.as_str());
        let status = match outcome.status {
            TableStatus::Written => status.green().to_string(),
            TableStatus::Coherent => status.cyan().to_string(),
            TableStatus::Skipped => status.yellow().to_string(),
        };
        println!("  {status} {}", outcome.table);
    }

    let m = &report.metrics;
    println!("{}", "─".repeat(50));
    println!("Rows written  {}", m.rows_written);
    if m.chunks_processed > 0 {
        println!("Chunks        {}", m.chunks_processed);
    }
    if m.items_processed > 0 {
        println!("Items         {} in, {} out", m.items_processed, m.items_emitted);
    }
    println!("Retries       {}", m.retries);
    if m.warnings > 0 {
        println!("Warnings      {}", m.warnings.yellow());
    }
    if m.parse_errors > 0 {
        println!("Parse errors  {}", m.parse_errors.yellow());
    }
    if m.tables_skipped > 0 {
        println!("Skipped       {}", m.tables_skipped.yellow());
    }
    println!();
}
