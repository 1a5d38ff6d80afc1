//! Job runner
//!
//! [`JobRunner`] owns the two stores and the settings every job shares. Each
//! job lives in its own module as an `impl JobRunner` block.

use std::fmt;
use std::sync::Arc;

use mpat_pipeline::{MetricsSnapshot, Pipeline, PipelineConfig, Process};
use mpat_protocol::{GroupedFlow, TableName, TableType};
use mpat_store::{Store, TableInfo};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{JobError, Result};
use crate::flows::FlowIngest;
use crate::insert::{InsertEgress, InsertRows};
use crate::lifecycle::{Expectation, Lifecycle};
use crate::settings::JobSettings;

// =============================================================================
// Reports
// =============================================================================

/// What happened to one destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    /// A pipeline filled the table
    Written,
    /// The table already matched its source; left alone
    Coherent,
    /// The table was not touched because it had rows at pipeline start
    Skipped,
}

impl TableStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Coherent => "coherent",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutcome {
    pub table: String,
    pub status: TableStatus,
}

/// Outcome of a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub tables: Vec<TableOutcome>,
    /// Counters summed over every pipeline the job ran
    pub metrics: MetricsSnapshot,
}

impl JobReport {
    pub(crate) fn record(&mut self, table: impl Into<String>, status: TableStatus) {
        if status == TableStatus::Skipped {
            self.metrics.tables_skipped += 1;
        }
        self.tables.push(TableOutcome {
            table: table.into(),
            status,
        });
    }

    /// Tables with the given status
    pub fn with_status(&self, status: TableStatus) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .filter(move |t| t.status == status)
            .map(|t| t.table.as_str())
    }
}

/// Source and destination metadata of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCheck {
    pub source: TableInfo,
    pub destination: TableInfo,
}

impl TableCheck {
    /// Destination has as many rows as the source
    pub fn is_coherent(&self) -> bool {
        self.destination.is_coherent_with(&self.source)
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Runs jobs from a source store into a destination store
#[derive(Clone)]
pub struct JobRunner {
    pub(crate) source: Arc<dyn Store>,
    pub(crate) destination: Arc<dyn Store>,
    pub(crate) settings: JobSettings,
    pub(crate) lifecycle: Lifecycle,
}

impl JobRunner {
    /// Runner reading from `source` and writing to `destination`; both may be
    /// the same store
    pub fn new(source: Arc<dyn Store>, destination: Arc<dyn Store>, settings: JobSettings) -> Self {
        Self {
            lifecycle: Lifecycle::new(Arc::clone(&destination)),
            source,
            destination,
            settings,
        }
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub(crate) fn pipeline_config(&self) -> PipelineConfig {
        self.settings.pipeline.clone()
    }

    /// Source and destination metadata of `tables`
    pub async fn check(&self, tables: &[String]) -> Result<Vec<TableCheck>> {
        let source = self.source.info(tables).await?;
        let destination = self.destination.info(tables).await?;
        Ok(source
            .into_iter()
            .zip(destination)
            .map(|(source, destination)| TableCheck { source, destination })
            .collect())
    }

    /// Source metadata of `table`; missing tables are an error
    pub(crate) async fn source_info(&self, table: &str) -> Result<TableInfo> {
        let info = self
            .source
            .info(&[table.to_string()])
            .await?
            .pop()
            .unwrap_or_else(|| TableInfo::missing(table));
        if !info.exists {
            return Err(JobError::MissingTable(table.to_string()));
        }
        Ok(info)
    }

    /// Fill one derived table per results table from its grouped flows
    pub(crate) async fn derive_from_flows<P, N>(
        &self,
        job: &str,
        tables: &[String],
        destination_name: N,
        process: impl Fn() -> P,
        cancel: &CancellationToken,
    ) -> Result<JobReport>
    where
        P: Process<Input = GroupedFlow>,
        P::Output: InsertRows,
        N: Fn(&TableName) -> Result<String>,
    {
        let mut report = JobReport::default();
        for table in tables {
            let name = TableName::parse(table)?;
            if name.table_type() != TableType::Results {
                return Err(JobError::WrongTableType {
                    table: table.clone(),
                    expected: TableType::Results.as_str(),
                });
            }
            let dest = destination_name(&name)?;
            self.source_info(table).await?;

            self.lifecycle
                .prepare(
                    &dest,
                    <P::Output as InsertRows>::KIND,
                    Expectation::Rebuild,
                    self.settings.force_reset,
                )
                .await?;

            let pipeline = Pipeline::new(
                format!("{job}:{dest}"),
                self.pipeline_config(),
                FlowIngest::new(Arc::clone(&self.source), vec![table.clone()]),
                process(),
                InsertEgress::<P::Output>::new(
                    Arc::clone(&self.destination),
                    dest.clone(),
                    self.settings.upload_chunk_size,
                ),
            );
            let metrics = pipeline.start(cancel)?.wait().await?;

            info!(
                job = job,
                source = %table,
                table = %dest,
                flows = metrics.items_processed,
                rows = metrics.rows_written,
                "destination computed"
            );
            report.metrics += metrics;
            report.record(dest, TableStatus::Written);
        }
        Ok(report)
    }
}

impl fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
