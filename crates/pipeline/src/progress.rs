//! Periodic progress reporting
//!
//! Logs the counters of a running pipeline at a fixed interval until
//! cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::metrics::{MetricsSnapshot, PipelineMetrics};

/// Progress reporter for one pipeline
pub struct ProgressReporter {
    name: String,
    metrics: Arc<PipelineMetrics>,
    interval: Duration,
    previous: MetricsSnapshot,
}

impl ProgressReporter {
    pub fn new(name: impl Into<String>, metrics: Arc<PipelineMetrics>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            metrics,
            interval,
            previous: MetricsSnapshot::default(),
        }
    }

    /// Run the reporter until cancellation; returns at once if the interval is zero
    pub async fn run(mut self, cancel: CancellationToken) {
        if self.interval.is_zero() {
            return;
        }

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }

    /// Log current counters; returns the growth since the last report
    fn report(&mut self) -> MetricsSnapshot {
        let snapshot = self.metrics.snapshot();
        let delta = snapshot.delta(&self.previous);

        info!(
            pipeline = %self.name,
            ingested = snapshot.items_ingested,
            processed = snapshot.items_processed,
            rows_written = snapshot.rows_written,
            rows_since_last = delta.rows_written,
            batches = snapshot.batches_flushed,
            chunks = snapshot.chunks_processed,
            retries = snapshot.retries,
            warnings = snapshot.warnings,
            "progress"
        );

        self.previous = snapshot;
        delta
    }
}
