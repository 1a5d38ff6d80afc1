//! Job settings

use mpat_pipeline::PipelineConfig;

/// Default rows per copy chunk
pub const DEFAULT_CHUNK_SIZE: u64 = 100_000;

/// Default rows per insert batch
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 100_000;

/// Knobs shared by every job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    /// Rows per downloaded chunk (copy)
    pub chunk_size: u64,

    /// Rows per insert batch (routes, forwarding decisions, warts uploads)
    pub upload_chunk_size: usize,

    /// Drop and recreate destination tables even when they look coherent
    pub force_reset: bool,

    /// Worker counts, buffers, retry and rate limit
    pub pipeline: PipelineConfig,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            force_reset: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl JobSettings {
    pub fn with_chunk_size(mut self, rows: u64) -> Self {
        self.chunk_size = rows.max(1);
        self
    }

    pub fn with_upload_chunk_size(mut self, rows: usize) -> Self {
        self.upload_chunk_size = rows.max(1);
        self
    }

    pub fn with_force_reset(mut self, force: bool) -> Self {
        self.force_reset = force;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}
