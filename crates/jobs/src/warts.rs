//! Warts uploads
//!
//! ```text
//!  WartsIngest ──► Passthrough ──► InsertEgress<ProbeRecord>
//!  one source per take              batches of upload_chunk_size
//! ```
//!
//! Sources are URLs of an Ark cycle or local files. Each source is opened by
//! one ingest worker and streamed through the converter record by record.
//! Opening is retried; once records flow, a failure ends the run because the
//! emitted records cannot be taken back.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use mpat_pipeline::{Emitter, Ingest, Passthrough, Pipeline, StageContext, TaskError};
use mpat_protocol::{ProbeRecord, TableKind, TableName, TableType};
use mpat_sources::{ArkClient, WartsReader, WartsSource};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{JobError, Result};
use crate::insert::InsertEgress;
use crate::lifecycle::Expectation;
use crate::runner::{JobReport, JobRunner, TableStatus};

/// Streams probe records out of warts sources
pub struct WartsIngest {
    reader: WartsReader,
    sources: Vec<WartsSource>,
    next: AtomicUsize,
}

impl WartsIngest {
    pub fn new(reader: WartsReader, sources: Vec<WartsSource>) -> Self {
        Self {
            reader,
            sources,
            next: AtomicUsize::new(0),
        }
    }

    fn take(&self) -> Option<&WartsSource> {
        self.sources.get(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl Ingest for WartsIngest {
    type Output = ProbeRecord;

    async fn run(&self, ctx: &StageContext, out: &Emitter<ProbeRecord>) -> std::result::Result<(), TaskError> {
        let reader = &self.reader;
        while let Some(source) = self.take() {
            let target = source.to_string();
            let target_ref = target.as_str();

            let mut stream = ctx
                .retry(target_ref, |_| async move {
                    reader
                        .open(source)
                        .await
                        .map_err(|e| TaskError::from_error(target_ref, &e))
                })
                .await?;

            loop {
                let next = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Err(TaskError::cancelled()),
                    next = stream.next_records() => next,
                };
                let records = next.map_err(|e| TaskError::from_error(target_ref, &e))?;
                let Some(records) = records else { break };
                for record in records {
                    out.emit(record).await?;
                }
            }

            let summary = stream
                .finish()
                .await
                .map_err(|e| TaskError::from_error(target_ref, &e))?;
            ctx.metrics().record_parse_errors(summary.parse_errors);
            if summary.parse_errors > 0 {
                ctx.warn(target_ref, format_args!("{} malformed records skipped", summary.parse_errors));
            }
        }
        Ok(())
    }
}

impl JobRunner {
    /// Convert warts `sources` into the results table `table`
    ///
    /// Existing rows are cleared first.
    pub async fn upload_warts(
        &self,
        reader: &WartsReader,
        table: &TableName,
        sources: Vec<WartsSource>,
        cancel: &CancellationToken,
    ) -> Result<JobReport> {
        if table.table_type() != TableType::Results {
            return Err(JobError::WrongTableType {
                table: table.to_string(),
                expected: TableType::Results.as_str(),
            });
        }

        let mut report = JobReport::default();
        self.lifecycle
            .prepare(
                table.as_str(),
                TableKind::Results,
                Expectation::Rebuild,
                self.settings.force_reset,
            )
            .await?;
        if sources.is_empty() {
            warn!(table = %table, "no warts sources");
            report.record(table.to_string(), TableStatus::Written);
            return Ok(report);
        }

        info!(table = %table, sources = sources.len(), "uploading warts");
        let pipeline = Pipeline::new(
            format!("warts:{table}"),
            self.pipeline_config(),
            WartsIngest::new(reader.clone(), sources),
            Passthrough::<ProbeRecord>::new(),
            InsertEgress::<ProbeRecord>::new(
                Arc::clone(&self.destination),
                table.to_string(),
                self.settings.upload_chunk_size,
            ),
        );
        report.metrics += pipeline.start(cancel)?.wait().await?;
        report.record(table.to_string(), TableStatus::Written);
        Ok(report)
    }

    /// Download Ark cycles into `ark_results__cycle<YYYYMMDD>` tables
    pub async fn download_ark(
        &self,
        ark: &ArkClient,
        reader: &WartsReader,
        dates: &[NaiveDate],
        cancel: &CancellationToken,
    ) -> Result<JobReport> {
        let mut report = JobReport::default();
        for &date in dates {
            let table = TableName::ark_results(date);
            let urls = ark.list_cycle(date).await?;
            let sources = urls.into_iter().map(WartsSource::Url).collect();

            let cycle = self.upload_warts(reader, &table, sources, cancel).await?;
            report.metrics += cycle.metrics;
            report.tables.extend(cycle.tables);
        }
        Ok(report)
    }

    /// Upload local warts files into the Iris results table `table`
    pub async fn upload_iris_results(
        &self,
        reader: &WartsReader,
        table: &str,
        files: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<JobReport> {
        let table = TableName::parse(table)?;
        let sources = files.iter().cloned().map(WartsSource::File).collect();
        self.upload_warts(reader, &table, sources, cancel).await
    }
}
