//! Configuration to runtime settings
//!
//! The library crates take plain settings structs; this module builds them
//! from a resolved [`Config`].

use std::path::Path;

use anyhow::{Context, Result};
use mpat_config::{ArkSection, Config, ConverterFormat, PipelineSection};
use mpat_jobs::JobSettings;
use mpat_pipeline::{PipelineConfig, RetryPolicy};
use mpat_sources::{ConverterConfig, Credentials, OutputFormat};

/// Pipeline runtime settings
pub fn pipeline_config(section: &PipelineSection) -> PipelineConfig {
    let retry = RetryPolicy::default()
        .with_max_retries(section.max_retries)
        .with_base_delay(section.retry_base_delay)
        .with_max_delay(section.retry_max_delay);

    let mut config = PipelineConfig::default()
        .with_workers(
            section.parallel_downloads,
            section.process_workers,
            section.parallel_uploads,
        )
        .with_retry(retry)
        .with_max_rows_per_sec(section.max_row_upload_rate)
        .with_progress_interval(section.progress_interval);
    config.ingest_buffer = section.ingest_buffer;
    config.egress_buffer = section.egress_buffer;
    config
}

/// Settings shared by every job
pub fn job_settings(config: &Config) -> JobSettings {
    let section = &config.pipeline;
    JobSettings::default()
        .with_chunk_size(section.chunk_size)
        .with_upload_chunk_size(section.upload_chunk_size)
        .with_force_reset(section.force_reset_destination)
        .with_pipeline(pipeline_config(section))
}

/// Converter invocation and parse policy
pub fn converter_config(config: &Config) -> ConverterConfig {
    let format = match config.converter.format {
        ConverterFormat::Iris => OutputFormat::Iris,
        ConverterFormat::Flat => OutputFormat::Flat,
    };
    ConverterConfig::new(config.converter.program.clone())
        .with_format(format)
        .with_strict(config.pipeline.strict_parsing)
        .with_max_parse_errors(config.pipeline.max_parse_errors)
}

/// Ark basic-auth credentials, when both halves are set
pub fn ark_credentials(section: &ArkSection) -> Option<Credentials> {
    match (&section.username, &section.password) {
        (Some(username), Some(password)) => Some(Credentials::new(username, password)),
        _ => None,
    }
}

// =============================================================================
// Argument lists
// =============================================================================

/// One entry per line; blank lines and `#` comments are skipped
pub fn parse_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read an `--input-file`
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;
    Ok(parse_list(&contents))
}

/// Positional arguments followed by file entries, first occurrence kept
pub fn merge_lists(positional: &[String], extra: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(positional.len() + extra.len());
    for item in positional.iter().cloned().chain(extra) {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    merged
}
