//! Pipeline runtime configuration

use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;

/// Default number of workers per stage
pub const DEFAULT_WORKERS: usize = 4;

/// Smallest default channel capacity
pub const MIN_CHANNEL_CAPACITY: usize = 1024;

/// Default interval between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Worker counts, channel sizes, retry and rate limits of one pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Ingest workers (N_i)
    pub ingest_workers: usize,

    /// Process workers (N_p)
    pub process_workers: usize,

    /// Egress workers (N_e)
    pub egress_workers: usize,

    /// Capacity of the ingest → process channel; `None` uses the default
    pub ingest_buffer: Option<usize>,

    /// Capacity of the process → egress channel; `None` uses the default
    pub egress_buffer: Option<usize>,

    /// Retry policy handed to every stage
    pub retry: RetryPolicy,

    /// Egress row rate; 0 means unlimited
    pub max_rows_per_sec: u64,

    /// Progress report interval; zero disables reporting
    pub progress_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest_workers: DEFAULT_WORKERS,
            process_workers: DEFAULT_WORKERS,
            egress_workers: DEFAULT_WORKERS,
            ingest_buffer: None,
            egress_buffer: None,
            retry: RetryPolicy::default(),
            max_rows_per_sec: 0,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, ingest: usize, process: usize, egress: usize) -> Self {
        self.ingest_workers = ingest;
        self.process_workers = process;
        self.egress_workers = egress;
        self
    }

    pub fn with_buffers(mut self, ingest: usize, egress: usize) -> Self {
        self.ingest_buffer = Some(ingest);
        self.egress_buffer = Some(egress);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_rows_per_sec(mut self, rate: u64) -> Self {
        self.max_rows_per_sec = rate;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// `max(1024, 4 * max(N_i, N_p, N_e))`
    pub fn default_buffer(&self) -> usize {
        let widest = self
            .ingest_workers
            .max(self.process_workers)
            .max(self.egress_workers);
        MIN_CHANNEL_CAPACITY.max(4 * widest)
    }

    /// Effective ingest → process channel capacity
    pub fn ingest_capacity(&self) -> usize {
        self.ingest_buffer.unwrap_or_else(|| self.default_buffer())
    }

    /// Effective process → egress channel capacity
    pub fn egress_capacity(&self) -> usize {
        self.egress_buffer.unwrap_or_else(|| self.default_buffer())
    }

    /// Capacity of the error channel, one slot per worker plus one
    pub fn error_capacity(&self) -> usize {
        self.ingest_workers + self.process_workers + self.egress_workers + 1
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ingest_workers", self.ingest_workers),
            ("process_workers", self.process_workers),
            ("egress_workers", self.egress_workers),
            ("ingest_buffer", self.ingest_capacity()),
            ("egress_buffer", self.egress_capacity()),
        ] {
            if value == 0 {
                return Err(PipelineError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }
}
