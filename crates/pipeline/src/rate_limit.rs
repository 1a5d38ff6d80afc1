//! Egress rate limiting
//!
//! One token is released every `batch_size / max_rows_per_sec` seconds and
//! every egress flush takes one. The limiter is shared by the whole egress
//! pool, so the aggregate upload rate stays under `max_rows_per_sec`.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::metrics::PipelineMetrics;

/// Token source shared by egress workers
#[derive(Debug)]
pub struct RateLimiter {
    /// `None` when limiting is disabled
    period: Option<Duration>,
    /// Created on first use so construction does not need a runtime
    ticker: Mutex<Option<Interval>>,
}

impl RateLimiter {
    /// Limiter for `max_rows_per_sec` rows in batches of `batch_size`;
    /// a rate of 0 disables limiting
    pub fn new(max_rows_per_sec: u64, batch_size: usize) -> Self {
        let period = (max_rows_per_sec > 0).then(|| {
            let secs = batch_size.max(1) as f64 / max_rows_per_sec as f64;
            Duration::from_secs_f64(secs).max(Duration::from_nanos(1))
        });
        Self {
            period,
            ticker: Mutex::new(None),
        }
    }

    /// Limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(0, 1)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.period.is_some()
    }

    /// Interval between tokens
    #[inline]
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Wait for a token; returns `false` if cancelled first
    pub async fn acquire(&self, cancel: &CancellationToken, metrics: &PipelineMetrics) -> bool {
        let Some(period) = self.period else {
            return !cancel.is_cancelled();
        };

        let started = Instant::now();
        let acquired = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = async {
                let mut ticker = self.ticker.lock().await;
                let ticker = ticker.get_or_insert_with(|| {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    ticker
                });
                ticker.tick().await;
            } => true,
        };

        if acquired && !started.elapsed().is_zero() {
            metrics.record_rate_limit_wait();
        }
        acquired
    }
}
