//! Pipeline error types
//!
//! Stage code returns [`TaskError`]; the runtime tags it with the stage that
//! failed and publishes it as a [`PipelineError`].

use std::fmt;

use mpat_protocol::{Classify, ErrorKind};
use thiserror::Error;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Process,
    Egress,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Process => "process",
            Self::Egress => "egress",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by stage code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{target}: {message}")]
pub struct TaskError {
    /// Table, chunk or flow-id the stage was working on
    pub target: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind,
            message: message.into(),
        }
    }

    /// Wrap a classified error
    pub fn from_error<E>(target: impl Into<String>, error: &E) -> Self
    where
        E: Classify + fmt::Display,
    {
        Self::new(error.kind(), target, error.to_string())
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "", "cancelled")
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl Classify for TaskError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Pipeline errors
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A stage failed after its retry budget
    #[error("{stage} failed on {target}: {message} [{kind}]")]
    Stage {
        stage: Stage,
        target: String,
        kind: ErrorKind,
        message: String,
    },

    /// A worker panicked
    #[error("{stage} worker panicked: {message}")]
    WorkerPanicked { stage: Stage, message: String },

    /// The pipeline was cancelled from outside
    #[error("pipeline cancelled")]
    Cancelled,

    /// Invalid runtime configuration
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn stage(stage: Stage, err: TaskError) -> Self {
        Self::Stage {
            stage,
            target: err.target,
            kind: err.kind,
            message: err.message,
        }
    }
}

impl Classify for PipelineError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Stage { kind, .. } => *kind,
            Self::WorkerPanicked { .. } => ErrorKind::Other,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Other,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
