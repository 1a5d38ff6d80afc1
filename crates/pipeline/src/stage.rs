//! Stage traits and the context handed to stage code
//!
//! A pipeline is built from one implementation of each trait:
//!
//! - [`Ingest`]: every ingest worker calls [`Ingest::run`] on the shared
//!   stage value; implementations hand out work units (chunks, URLs, a cursor)
//!   so that each unit is taken by exactly one worker.
//! - [`Process`]: a synchronous function from one input to zero or more
//!   outputs. Each input is processed atomically by one worker.
//! - [`Egress`]: receives batches of at most [`Egress::batch_size`] items.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use crossfire::MAsyncTx;
use tokio_util::sync::CancellationToken;

use crate::error::{Stage, TaskError};
use crate::metrics::PipelineMetrics;
use crate::retry::RetryPolicy;

// =============================================================================
// Stage traits
// =============================================================================

/// Source of work items
#[async_trait]
pub trait Ingest: Send + Sync + 'static {
    type Output: Send + Unpin + 'static;

    /// Emit items until the source is exhausted
    ///
    /// Called once per ingest worker, concurrently. Returning `Ok` means this
    /// worker found no more work.
    async fn run(&self, ctx: &StageContext, out: &Emitter<Self::Output>) -> Result<(), TaskError>;
}

/// Per-item transformation
pub trait Process: Send + Sync + 'static {
    type Input: Send + Unpin + 'static;
    type Output: Send + Unpin + 'static;

    /// Push the outputs for `input` onto `out`
    fn process(
        &self,
        ctx: &StageContext,
        input: Self::Input,
        out: &mut Vec<Self::Output>,
    ) -> Result<(), TaskError>;
}

/// Batched sink
#[async_trait]
pub trait Egress: Send + Sync + 'static {
    type Input: Send + Unpin + 'static;

    /// Maximum items per flush
    fn batch_size(&self) -> usize;

    /// Rows a full batch writes, used to pace the rate limiter
    fn rows_per_batch(&self) -> usize {
        self.batch_size()
    }

    /// Write one batch; returns rows written
    ///
    /// Implementations wrap retryable work in [`StageContext::retry`].
    async fn flush(&self, ctx: &StageContext, batch: Vec<Self::Input>) -> Result<u64, TaskError>;
}

/// Identity process stage
pub struct Passthrough<T>(PhantomData<fn(T) -> T>);

impl<T> Passthrough<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Passthrough<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Passthrough<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passthrough")
    }
}

impl<T: Send + Unpin + 'static> Process for Passthrough<T> {
    type Input = T;
    type Output = T;

    #[inline]
    fn process(&self, _ctx: &StageContext, input: T, out: &mut Vec<T>) -> Result<(), TaskError> {
        out.push(input);
        Ok(())
    }
}

// =============================================================================
// Stage context
// =============================================================================

/// Per-worker view of the running pipeline
#[derive(Debug, Clone)]
pub struct StageContext {
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
    retry: RetryPolicy,
    stage: Stage,
    worker: usize,
}

impl StageContext {
    pub(crate) fn new(
        cancel: CancellationToken,
        metrics: Arc<PipelineMetrics>,
        retry: RetryPolicy,
        stage: Stage,
        worker: usize,
    ) -> Self {
        Self {
            cancel,
            metrics,
            retry,
            stage,
            worker,
        }
    }

    /// Context outside any running pipeline, for driving a stage directly
    pub fn standalone(stage: Stage) -> Self {
        Self::new(
            CancellationToken::new(),
            Arc::new(PipelineMetrics::new()),
            RetryPolicy::none(),
            stage,
            0,
        )
    }

    #[inline]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the pipeline is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    #[inline]
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    #[inline]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Index of this worker within its stage
    #[inline]
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Run `operation` under the pipeline's retry policy
    pub async fn retry<T, F, Fut>(&self, target: &str, operation: F) -> Result<T, TaskError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        self.retry
            .run(&self.cancel, &self.metrics, target, operation)
            .await
    }

    /// Log and count a non-fatal problem
    pub fn warn(&self, target: &str, message: impl fmt::Display) {
        self.metrics.record_warning();
        tracing::warn!(stage = %self.stage, worker = self.worker, task = target, "{message}");
    }
}

// =============================================================================
// Emitter
// =============================================================================

/// Sending half of the ingest → process channel
pub struct Emitter<T> {
    tx: MAsyncTx<T>,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
}

impl<T: Send + Unpin + 'static> Emitter<T> {
    pub(crate) fn new(tx: MAsyncTx<T>, cancel: CancellationToken, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            tx,
            cancel,
            metrics,
        }
    }

    /// Send one item, waiting for channel space
    ///
    /// Fails with a cancelled error when the pipeline is cancelled or the
    /// process stage is gone.
    pub async fn emit(&self, item: T) -> Result<(), TaskError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TaskError::cancelled()),
            sent = self.tx.send(item) => {
                sent.map_err(|_| TaskError::cancelled())?;
                self.metrics.record_ingested();
                Ok(())
            }
        }
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
