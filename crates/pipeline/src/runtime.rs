//! Pipeline runtime
//!
//! Spawns the three worker pools and wires them with bounded channels:
//!
//! ```text
//!  Ingest ──in──► Process ──out──► Egress
//!    N_i            N_p              N_e
//! ```
//!
//! Every worker holds a clone of its output sender. A channel closes once the
//! last worker of the stage feeding it has exited, so each stage shuts down
//! only after its input is closed and drained.
//!
//! A worker that fails publishes one [`PipelineError`] and cancels the
//! pipeline's token; the other workers observe the cancellation at their next
//! channel operation and exit. Cancelled errors are never published.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crossfire::{AsyncRx, MAsyncRx, MAsyncTx};
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage, TaskError};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::progress::ProgressReporter;
use crate::rate_limit::RateLimiter;
use crate::stage::{Egress, Emitter, Ingest, Process, StageContext};

// =============================================================================
// Pipeline
// =============================================================================

/// An ingest → process → egress pipeline ready to start
pub struct Pipeline<I, P, E> {
    name: String,
    config: PipelineConfig,
    ingest: Arc<I>,
    process: Arc<P>,
    egress: Arc<E>,
}

impl<I, P, E> Pipeline<I, P, E>
where
    I: Ingest,
    P: Process<Input = I::Output>,
    E: Egress<Input = P::Output>,
{
    pub fn new(name: impl Into<String>, config: PipelineConfig, ingest: I, process: P, egress: E) -> Self {
        Self {
            name: name.into(),
            config,
            ingest: Arc::new(ingest),
            process: Arc::new(process),
            egress: Arc::new(egress),
        }
    }

    /// Spawn all workers
    ///
    /// The pipeline runs under a child of `parent`: cancelling `parent`
    /// cancels the pipeline, while a fatal error inside the pipeline does not
    /// cancel `parent`.
    pub fn start(self, parent: &CancellationToken) -> Result<PipelineHandle> {
        self.config.validate()?;

        let config = &self.config;
        let cancel = parent.child_token();
        let metrics = Arc::new(PipelineMetrics::new());
        let limiter = Arc::new(RateLimiter::new(
            config.max_rows_per_sec,
            self.egress.rows_per_batch(),
        ));

        let (in_tx, in_rx) = crossfire::mpmc::bounded_async::<I::Output>(config.ingest_capacity());
        let (out_tx, out_rx) = crossfire::mpmc::bounded_async::<P::Output>(config.egress_capacity());
        let (err_tx, err_rx) = crossfire::mpsc::bounded_async::<PipelineError>(config.error_capacity());
        let errors = ErrorSink {
            pipeline: self.name.clone(),
            tx: err_tx,
            cancel: cancel.clone(),
        };

        let context = |stage: Stage, worker: usize| {
            StageContext::new(cancel.clone(), Arc::clone(&metrics), config.retry, stage, worker)
        };

        let mut workers = Vec::with_capacity(config.error_capacity());

        for worker in 0..config.ingest_workers {
            let ingest = Arc::clone(&self.ingest);
            let ctx = context(Stage::Ingest, worker);
            let out = Emitter::new(in_tx.clone(), cancel.clone(), Arc::clone(&metrics));
            workers.push(spawn_worker(Stage::Ingest, errors.clone(), async move {
                ingest.run(&ctx, &out).await
            }));
        }
        drop(in_tx);

        for worker in 0..config.process_workers {
            let process = Arc::clone(&self.process);
            let ctx = context(Stage::Process, worker);
            let rx = in_rx.clone();
            let tx = out_tx.clone();
            workers.push(spawn_worker(
                Stage::Process,
                errors.clone(),
                process_worker(process, ctx, rx, tx),
            ));
        }
        drop(in_rx);
        drop(out_tx);

        for worker in 0..config.egress_workers {
            let egress = Arc::clone(&self.egress);
            let ctx = context(Stage::Egress, worker);
            let rx = out_rx.clone();
            let limiter = Arc::clone(&limiter);
            workers.push(spawn_worker(
                Stage::Egress,
                errors.clone(),
                egress_worker(egress, ctx, rx, limiter),
            ));
        }
        drop(out_rx);
        drop(errors);

        let reporter_cancel = cancel.child_token();
        let reporter = ProgressReporter::new(
            self.name.clone(),
            Arc::clone(&metrics),
            config.progress_interval,
        );
        let reporter_task = tokio::spawn(reporter.run(reporter_cancel.clone()));

        info!(
            pipeline = %self.name,
            ingest_workers = config.ingest_workers,
            process_workers = config.process_workers,
            egress_workers = config.egress_workers,
            ingest_buffer = config.ingest_capacity(),
            egress_buffer = config.egress_capacity(),
            max_rows_per_sec = config.max_rows_per_sec,
            max_retries = config.retry.max_retries,
            "pipeline started"
        );

        Ok(PipelineHandle {
            name: self.name,
            cancel,
            metrics,
            workers,
            reporter: (reporter_cancel, reporter_task),
            errors: err_rx,
            started: Instant::now(),
        })
    }
}

// =============================================================================
// Handle
// =============================================================================

/// A running pipeline
pub struct PipelineHandle {
    name: String,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
    workers: Vec<JoinHandle<()>>,
    reporter: (CancellationToken, JoinHandle<()>),
    errors: AsyncRx<PipelineError>,
    started: Instant,
}

impl PipelineHandle {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel every stage
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The pipeline's own token
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Fatal errors as they are published
    ///
    /// The channel closes once every worker has exited.
    pub fn errors(&self) -> &AsyncRx<PipelineError> {
        &self.errors
    }

    /// Wait for every worker to exit; returns final counters and all
    /// published errors
    pub async fn wait_all(self) -> (MetricsSnapshot, Vec<PipelineError>) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(pipeline = %self.name, error = %e, "worker task failed to join");
            }
        }

        let (reporter_cancel, reporter_task) = self.reporter;
        reporter_cancel.cancel();
        let _ = reporter_task.await;

        let mut errors = Vec::new();
        while let Ok(err) = self.errors.try_recv() {
            errors.push(err);
        }

        let snapshot = self.metrics.snapshot();
        info!(
            pipeline = %self.name,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            ingested = snapshot.items_ingested,
            processed = snapshot.items_processed,
            emitted = snapshot.items_emitted,
            batches = snapshot.batches_flushed,
            rows_written = snapshot.rows_written,
            chunks = snapshot.chunks_processed,
            tables_skipped = snapshot.tables_skipped,
            retries = snapshot.retries,
            rate_limit_waits = snapshot.rate_limit_waits,
            warnings = snapshot.warnings,
            parse_errors = snapshot.parse_errors,
            errors = errors.len(),
            cancelled = self.cancel.is_cancelled(),
            "pipeline finished"
        );

        (snapshot, errors)
    }

    /// Wait for completion
    ///
    /// Returns the first fatal error, [`PipelineError::Cancelled`] if the
    /// pipeline was cancelled without one, or the final counters.
    pub async fn wait(self) -> Result<MetricsSnapshot> {
        let cancel = self.cancel.clone();
        let (snapshot, errors) = self.wait_all().await;

        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(snapshot)
    }
}

// =============================================================================
// Workers
// =============================================================================

#[derive(Clone)]
struct ErrorSink {
    pipeline: String,
    tx: MAsyncTx<PipelineError>,
    cancel: CancellationToken,
}

impl ErrorSink {
    fn publish(&self, err: PipelineError) {
        error!(pipeline = %self.pipeline, error = %err, "pipeline stage failed");
        // One slot per worker, so this only drops when a worker publishes twice
        let _ = self.tx.try_send(err);
        self.cancel.cancel();
    }
}

fn spawn_worker<F>(stage: Stage, errors: ErrorSink, work: F) -> JoinHandle<()>
where
    F: Future<Output = std::result::Result<(), TaskError>> + Send + 'static,
{
    tokio::spawn(async move {
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.is_cancelled() => {
                debug!(pipeline = %errors.pipeline, stage = %stage, "worker cancelled");
            }
            Ok(Err(err)) => errors.publish(PipelineError::stage(stage, err)),
            Err(panic) => errors.publish(PipelineError::WorkerPanicked {
                stage,
                message: panic_message(&*panic),
            }),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Send with cancellation; a closed channel counts as cancellation
async fn send<T: Send + Unpin + 'static>(
    cancel: &CancellationToken,
    tx: &MAsyncTx<T>,
    item: T,
) -> std::result::Result<(), TaskError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TaskError::cancelled()),
        sent = tx.send(item) => sent.map_err(|_| TaskError::cancelled()),
    }
}

async fn process_worker<P: Process>(
    process: Arc<P>,
    ctx: StageContext,
    rx: MAsyncRx<P::Input>,
    tx: MAsyncTx<P::Output>,
) -> std::result::Result<(), TaskError> {
    let mut outputs = Vec::new();

    loop {
        let input = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(TaskError::cancelled()),
            received = rx.recv() => match received {
                Ok(input) => input,
                Err(_) => return Ok(()),
            },
        };

        process.process(&ctx, input, &mut outputs)?;
        ctx.metrics().record_processed(outputs.len() as u64);

        for output in outputs.drain(..) {
            send(ctx.cancel_token(), &tx, output).await?;
        }
    }
}

async fn egress_worker<E: Egress>(
    egress: Arc<E>,
    ctx: StageContext,
    rx: MAsyncRx<E::Input>,
    limiter: Arc<RateLimiter>,
) -> std::result::Result<(), TaskError> {
    let batch_size = egress.batch_size().max(1);
    let mut batch = Vec::with_capacity(batch_size);

    loop {
        let received = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                if !batch.is_empty() {
                    debug!(worker = ctx.worker(), discarded = batch.len(), "discarding pending batch");
                }
                return Err(TaskError::cancelled());
            }
            received = rx.recv() => received,
        };

        match received {
            Ok(item) => {
                batch.push(item);
                if batch.len() >= batch_size {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                    flush(egress.as_ref(), &ctx, &limiter, full).await?;
                }
            }
            Err(_) => break,
        }
    }

    if !batch.is_empty() {
        flush(egress.as_ref(), &ctx, &limiter, batch).await?;
    }
    Ok(())
}

async fn flush<E: Egress>(
    egress: &E,
    ctx: &StageContext,
    limiter: &RateLimiter,
    batch: Vec<E::Input>,
) -> std::result::Result<(), TaskError> {
    if !limiter.acquire(ctx.cancel_token(), ctx.metrics()).await {
        return Err(TaskError::cancelled());
    }

    let items = batch.len();
    let rows = tokio::select! {
        biased;
        _ = ctx.cancelled() => return Err(TaskError::cancelled()),
        rows = egress.flush(ctx, batch) => rows?,
    };

    ctx.metrics().record_flush(rows);
    debug!(worker = ctx.worker(), items, rows, "batch flushed");
    Ok(())
}
