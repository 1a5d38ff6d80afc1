//! Pipeline settings
//!
//! Worker counts, batching, retry and rate limits shared by every job.

use std::time::Duration;

use serde::Deserialize;

/// Rows per copy chunk
pub const DEFAULT_CHUNK_SIZE: u64 = 100_000;

/// Rows per insert batch
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 100_000;

/// Ingest and egress workers
pub const DEFAULT_PARALLELISM: usize = 4;

/// Upper bound on the backoff between retries
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Pipeline configuration
///
/// # Example
///
/// ```toml
/// [pipeline]
/// chunk_size = 500000
/// parallel_downloads = 8
/// max_row_upload_rate = 2000000
/// retry_base_delay = "250ms"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineSection {
    /// Rows per `(table, offset, limit)` copy chunk
    /// Default: 100000
    pub chunk_size: u64,

    /// Rows per insert batch
    /// Default: 100000
    pub upload_chunk_size: usize,

    /// Ingest workers
    /// Default: 4
    pub parallel_downloads: usize,

    /// Process workers
    /// Default: number of CPU cores
    pub process_workers: usize,

    /// Egress workers
    /// Default: 4
    pub parallel_uploads: usize,

    /// Ingest → process channel capacity
    /// Default: max(1024, 4 * widest stage)
    pub ingest_buffer: Option<usize>,

    /// Process → egress channel capacity
    /// Default: max(1024, 4 * widest stage)
    pub egress_buffer: Option<usize>,

    /// Retries after the first attempt
    /// Default: 3
    pub max_retries: u32,

    /// First backoff delay, doubled per attempt
    /// Default: 500ms
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,

    /// Backoff cap, at most 10s
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,

    /// Rows per second across egress workers; 0 is unlimited
    pub max_row_upload_rate: u64,

    /// Drop and recreate every destination table
    pub force_reset_destination: bool,

    /// Progress report interval; "0s" disables reports
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,

    /// Fail on the first malformed converter line
    pub strict_parsing: bool,

    /// Fail once more converter lines than this are malformed
    pub max_parse_errors: Option<u64>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            parallel_downloads: DEFAULT_PARALLELISM,
            process_workers: num_cpus(),
            parallel_uploads: DEFAULT_PARALLELISM,
            ingest_buffer: None,
            egress_buffer: None,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: MAX_RETRY_DELAY,
            max_row_upload_rate: 0,
            force_reset_destination: false,
            progress_interval: Duration::from_secs(10),
            strict_parsing: false,
            max_parse_errors: None,
        }
    }
}

/// Get the number of available CPUs, defaulting to 4 if detection fails
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_PARALLELISM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineSection::default();
        assert_eq!(config.chunk_size, 100_000);
        assert_eq!(config.parallel_downloads, 4);
        assert!(config.process_workers > 0);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_max_delay, Duration::from_secs(10));
        assert!(!config.force_reset_destination);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
chunk_size = 500000
parallel_uploads = 2
retry_base_delay = "250ms"
progress_interval = "0s"
"#;
        let config: PipelineSection = toml::from_str(toml).unwrap();
        assert_eq!(config.chunk_size, 500_000);
        assert_eq!(config.parallel_uploads, 2);
        assert_eq!(config.retry_base_delay, Duration::from_millis(250));
        assert_eq!(config.progress_interval, Duration::ZERO);
        // Defaults still apply
        assert_eq!(config.upload_chunk_size, 100_000);
        assert_eq!(config.max_parse_errors, None);
    }
}
