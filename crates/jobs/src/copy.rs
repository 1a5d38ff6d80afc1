//! Table copy
//!
//! ```text
//!  ChunkIngest ──► Passthrough ──► ChunkTransfer
//!  chunk windows                   download_chunk ──► upload_native
//! ```
//!
//! Every table is split into `(table, offset, limit)` chunks up front. Ingest
//! workers take chunks by bumping a shared counter, so each chunk is handed
//! out exactly once. The download is opened by the egress worker right before
//! the upload consumes it: a streaming `SELECT` stays open on the source for
//! as long as its body is unread, so at most `N_e` of them are open at a time.
//!
//! A failed upload cannot replay a half-consumed stream, so a retry downloads
//! the chunk again. A retried upload may already have committed part of the
//! chunk; the row count check after the run catches that.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mpat_pipeline::{Egress, Emitter, Ingest, Passthrough, Pipeline, StageContext, TaskError};
use mpat_protocol::{TableKind, TableName, TableType};
use mpat_store::{Chunk, Store};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{JobError, Result};
use crate::lifecycle::{Decision, Expectation};
use crate::runner::{JobReport, JobRunner, TableStatus};

/// A chunk and the rows it is expected to carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyChunk {
    pub chunk: Chunk,
    pub rows: u64,
}

impl CopyChunk {
    /// Chunks of a `num_rows` table; the last one may be short
    pub fn plan(table: &str, num_rows: u64, chunk_size: u64) -> Vec<CopyChunk> {
        Chunk::plan(table, num_rows, chunk_size)
            .into_iter()
            .map(|chunk| CopyChunk {
                rows: chunk.limit.min(num_rows - chunk.offset),
                chunk,
            })
            .collect()
    }
}

// =============================================================================
// Stages
// =============================================================================

/// Hands out chunk windows
pub struct ChunkIngest {
    chunks: Vec<CopyChunk>,
    next: AtomicUsize,
}

impl ChunkIngest {
    pub fn new(chunks: Vec<CopyChunk>) -> Self {
        Self {
            chunks,
            next: AtomicUsize::new(0),
        }
    }

    fn take(&self) -> Option<&CopyChunk> {
        self.chunks.get(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl Ingest for ChunkIngest {
    type Output = CopyChunk;

    async fn run(&self, ctx: &StageContext, out: &Emitter<CopyChunk>) -> std::result::Result<(), TaskError> {
        while let Some(chunk) = self.take() {
            debug!(chunk = %chunk.chunk, worker = ctx.worker(), "chunk taken");
            out.emit(chunk.clone()).await?;
        }
        Ok(())
    }
}

/// Streams each chunk from the source store into the destination store
pub struct ChunkTransfer {
    source: Arc<dyn Store>,
    destination: Arc<dyn Store>,
    chunk_size: u64,
}

impl ChunkTransfer {
    pub fn new(source: Arc<dyn Store>, destination: Arc<dyn Store>, chunk_size: u64) -> Self {
        Self {
            source,
            destination,
            chunk_size,
        }
    }
}

#[async_trait]
impl Egress for ChunkTransfer {
    type Input = CopyChunk;

    fn batch_size(&self) -> usize {
        1
    }

    fn rows_per_batch(&self) -> usize {
        usize::try_from(self.chunk_size).unwrap_or(usize::MAX)
    }

    async fn flush(&self, ctx: &StageContext, batch: Vec<CopyChunk>) -> std::result::Result<u64, TaskError> {
        let (source, destination) = (self.source.as_ref(), self.destination.as_ref());
        let mut rows = 0;

        for chunk in batch {
            let target = chunk.chunk.to_string();
            let (window, target_ref) = (&chunk.chunk, target.as_str());

            ctx.retry(target_ref, |attempt| async move {
                if attempt > 0 {
                    debug!(chunk = target_ref, attempt = attempt, "downloading chunk again");
                }
                let body = source
                    .download_chunk(window)
                    .await
                    .map_err(|e| TaskError::from_error(target_ref, &e))?;
                destination
                    .upload_native(&window.table, body)
                    .await
                    .map_err(|e| TaskError::from_error(target_ref, &e))
            })
            .await?;

            ctx.metrics().record_chunk();
            debug!(chunk = %target, worker = ctx.worker(), rows = chunk.rows, "chunk copied");
            rows += chunk.rows;
        }
        Ok(rows)
    }
}

// =============================================================================
// Job
// =============================================================================

fn copy_kind(table: &str) -> Result<TableKind> {
    match TableName::parse(table)?.table_type() {
        TableType::Results => Ok(TableKind::Results),
        TableType::Routes => Ok(TableKind::Routes),
        TableType::Unknown => Err(JobError::WrongTableType {
            table: table.to_string(),
            expected: "results or routes",
        }),
    }
}

impl JobRunner {
    /// Copy `tables` from the source store to the destination store
    ///
    /// Destinations already holding the source row count are left alone.
    /// A destination that still has rows after preparation is skipped with a
    /// warning. Once the pipeline finishes, every written table must hold the
    /// source row count; a retried upload that had already committed part of
    /// its chunk shows up here.
    pub async fn copy(&self, tables: &[String], cancel: &CancellationToken) -> Result<JobReport> {
        let mut report = JobReport::default();
        let mut chunks = Vec::new();
        let mut expected = Vec::new();

        for table in tables {
            let kind = copy_kind(table)?;
            let source = self.source_info(table).await?;

            let decision = self
                .lifecycle
                .prepare(
                    table,
                    kind,
                    Expectation::Rows(source.num_rows),
                    self.settings.force_reset,
                )
                .await?;
            if decision == Decision::Skip {
                info!(table = %table, rows = source.num_rows, "destination already coherent");
                report.record(table.clone(), TableStatus::Coherent);
                continue;
            }

            let existing = self.destination.count(table).await?;
            if existing > 0 {
                warn!(table = %table, rows = existing, "destination has rows at copy start, skipping");
                report.record(table.clone(), TableStatus::Skipped);
                continue;
            }

            let planned = CopyChunk::plan(table, source.num_rows, self.settings.chunk_size);
            info!(
                table = %table,
                rows = source.num_rows,
                chunks = planned.len(),
                decision = %decision,
                "copy planned"
            );
            chunks.extend(planned);
            expected.push((table.clone(), source.num_rows));
            report.record(table.clone(), TableStatus::Written);
        }

        if chunks.is_empty() {
            return Ok(report);
        }

        let pipeline = Pipeline::new(
            "copy",
            self.pipeline_config(),
            ChunkIngest::new(chunks),
            Passthrough::<CopyChunk>::new(),
            ChunkTransfer::new(
                Arc::clone(&self.source),
                Arc::clone(&self.destination),
                self.settings.chunk_size,
            ),
        );
        report.metrics += pipeline.start(cancel)?.wait().await?;

        for (table, rows) in expected {
            let copied = self.destination.count(&table).await?;
            if copied != rows {
                return Err(JobError::RowCountMismatch {
                    table,
                    expected: rows,
                    actual: copied,
                });
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_rows() {
        let chunks = CopyChunk::plan("t", 5, 2);
        let rows: Vec<u64> = chunks.iter().map(|c| c.rows).collect();
        assert_eq!(rows, vec![2, 2, 1]);
        assert_eq!(chunks[2].chunk.offset, 4);
        assert!(CopyChunk::plan("t", 0, 2).is_empty());
    }

    #[test]
    fn test_copy_kind() {
        assert_eq!(copy_kind("ark_results__cycle20240101").unwrap(), TableKind::Results);
        assert_eq!(copy_kind("ark_routes__cycle20240101").unwrap(), TableKind::Routes);
        assert!(matches!(copy_kind("users"), Err(JobError::Name(_))));
    }
}
