//! Job errors

use mpat_pipeline::PipelineError;
use mpat_protocol::{Classify, ErrorKind, NameError, TableKind};
use mpat_sources::IngestError;
use mpat_store::StoreError;
use thiserror::Error;

/// Errors from running a job
#[derive(Debug, Error)]
pub enum JobError {
    /// Table name rejected by the name algebra
    #[error(transparent)]
    Name(#[from] NameError),

    /// Store call made outside a pipeline failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Listing or opening warts sources failed
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// A pipeline stage failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Source table does not exist
    #[error("source table {0} does not exist")]
    MissingTable(String),

    /// Table is not of the type the job reads
    #[error("{table} is not a {expected} table")]
    WrongTableType {
        table: String,
        expected: &'static str,
    },

    /// Destination row count differs from the source after a copy
    #[error("{table} has {actual} rows after the copy, expected {expected}")]
    RowCountMismatch {
        table: String,
        expected: u64,
        actual: u64,
    },

    /// Table still has the wrong shape or content after preparation
    #[error("table {table} is not an empty {kind} table after preparation")]
    NotPrepared { table: String, kind: TableKind },
}

impl Classify for JobError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Name(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Ingest(e) => e.kind(),
            Self::Pipeline(e) => e.kind(),
            Self::MissingTable(_) => ErrorKind::Other,
            Self::WrongTableType { .. } => ErrorKind::UnknownTableType,
            Self::RowCountMismatch { .. } => ErrorKind::Other,
            Self::NotPrepared { .. } => ErrorKind::TableShapeMismatch,
        }
    }
}

/// Result type for jobs
pub type Result<T> = std::result::Result<T, JobError>;
