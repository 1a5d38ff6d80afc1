//! MPAT - Jobs
//!
//! The work the CLI commands run, each one a pipeline (or a sequence of
//! pipelines) over the [`mpat_pipeline`] runtime:
//!
//! | Job | Ingest | Process | Egress |
//! |-----|--------|---------|--------|
//! | [`copy`](JobRunner::copy) | chunk windows | passthrough | native download + upload |
//! | [`compute_routes`](JobRunner::compute_routes) | grouped flows | [`links`] | insert `RouteRow` |
//! | [`compute_forwarding_decisions`](JobRunner::compute_forwarding_decisions) | grouped flows | [`decisions`] | insert `ForwardingDecisionRow` |
//! | [`download_ark`](JobRunner::download_ark) / [`upload_iris_results`](JobRunner::upload_iris_results) | warts through the converter | passthrough | insert `ProbeRecord` |
//!
//! Every destination goes through the [`Lifecycle`] manager first, which
//! leaves it either untouched (already coherent) or existing and empty.
//!
//! # Example
//!
//! ```ignore
//! use mpat_jobs::{JobRunner, JobSettings};
//!
//! let runner = JobRunner::new(source, destination, JobSettings::default());
//! let report = runner.copy(&tables, &cancel).await?;
//! ```

mod copy;
mod decisions;
mod error;
mod flows;
mod insert;
mod lifecycle;
mod routes;
mod runner;
mod settings;
mod warts;

pub use copy::{ChunkIngest, ChunkTransfer, CopyChunk};
pub use decisions::{DecisionsProcess, decisions};
pub use error::{JobError, Result};
pub use flows::{FlowIngest, Hop, adjacent, hops};
pub use insert::{InsertEgress, InsertRows};
pub use lifecycle::{Decision, Expectation, Lifecycle, decide};
pub use routes::{RoutesProcess, links};
pub use runner::{JobReport, JobRunner, TableCheck, TableOutcome, TableStatus};
pub use settings::{DEFAULT_CHUNK_SIZE, DEFAULT_UPLOAD_CHUNK_SIZE, JobSettings};
pub use warts::WartsIngest;
