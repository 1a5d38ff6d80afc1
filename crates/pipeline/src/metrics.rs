//! Pipeline metrics
//!
//! Atomic counters shared by every worker of a pipeline.
//! All operations use relaxed ordering; values are eventually consistent.

use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one pipeline run
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Items ingest workers sent to the process stage
    items_ingested: AtomicU64,

    /// Items the process stage consumed
    items_processed: AtomicU64,

    /// Items the process stage emitted
    items_emitted: AtomicU64,

    /// Egress batches written
    batches_flushed: AtomicU64,

    /// Rows reported written by egress
    rows_written: AtomicU64,

    /// Retried attempts across all stages
    retries: AtomicU64,

    /// Times an egress worker waited on the rate limiter
    rate_limit_waits: AtomicU64,

    /// Non-fatal warnings
    warnings: AtomicU64,

    /// Malformed input records skipped
    parse_errors: AtomicU64,

    /// Chunks fully copied
    chunks_processed: AtomicU64,

    /// Tables skipped at pipeline start
    tables_skipped: AtomicU64,
}

impl PipelineMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            items_ingested: AtomicU64::new(0),
            items_processed: AtomicU64::new(0),
            items_emitted: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            rate_limit_waits: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            chunks_processed: AtomicU64::new(0),
            tables_skipped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_ingested(&self) {
        self.items_ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one processed input and the outputs it produced
    #[inline]
    pub fn record_processed(&self, emitted: u64) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
        self.items_emitted.fetch_add(emitted, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flush(&self, rows: u64) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rate_limit_wait(&self) {
        self.rate_limit_waits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_warning(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped malformed record; returns the new total
    #[inline]
    pub fn record_parse_error(&self) -> u64 {
        self.parse_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record malformed records counted elsewhere
    #[inline]
    pub fn record_parse_errors(&self, count: u64) {
        self.parse_errors.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_chunk(&self) {
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_table_skipped(&self) {
        self.tables_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_ingested: self.items_ingested.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            items_emitted: self.items_emitted.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limit_waits: self.rate_limit_waits.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            tables_skipped: self.tables_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub items_ingested: u64,
    pub items_processed: u64,
    pub items_emitted: u64,
    pub batches_flushed: u64,
    pub rows_written: u64,
    pub retries: u64,
    pub rate_limit_waits: u64,
    pub warnings: u64,
    pub parse_errors: u64,
    pub chunks_processed: u64,
    pub tables_skipped: u64,
}

impl MetricsSnapshot {
    /// Counter growth since an earlier snapshot
    pub fn delta(&self, previous: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            items_ingested: self.items_ingested.saturating_sub(previous.items_ingested),
            items_processed: self.items_processed.saturating_sub(previous.items_processed),
            items_emitted: self.items_emitted.saturating_sub(previous.items_emitted),
            batches_flushed: self.batches_flushed.saturating_sub(previous.batches_flushed),
            rows_written: self.rows_written.saturating_sub(previous.rows_written),
            retries: self.retries.saturating_sub(previous.retries),
            rate_limit_waits: self.rate_limit_waits.saturating_sub(previous.rate_limit_waits),
            warnings: self.warnings.saturating_sub(previous.warnings),
            parse_errors: self.parse_errors.saturating_sub(previous.parse_errors),
            chunks_processed: self.chunks_processed.saturating_sub(previous.chunks_processed),
            tables_skipped: self.tables_skipped.saturating_sub(previous.tables_skipped),
        }
    }
}

impl AddAssign for MetricsSnapshot {
    fn add_assign(&mut self, other: Self) {
        self.items_ingested += other.items_ingested;
        self.items_processed += other.items_processed;
        self.items_emitted += other.items_emitted;
        self.batches_flushed += other.batches_flushed;
        self.rows_written += other.rows_written;
        self.retries += other.retries;
        self.rate_limit_waits += other.rate_limit_waits;
        self.warnings += other.warnings;
        self.parse_errors += other.parse_errors;
        self.chunks_processed += other.chunks_processed;
        self.tables_skipped += other.tables_skipped;
    }
}
