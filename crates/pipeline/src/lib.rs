//! MPAT Pipeline - Staged worker pools over bounded channels
//!
//! Every MPAT job (copy, routes, forwarding decisions, warts upload) runs on
//! this runtime.
//!
//! # Architecture
//!
//! ```text
//! [Ingest × N_i] ──bounded mpmc──► [Process × N_p] ──bounded mpmc──► [Egress × N_e]
//!        │                                │                                 │
//!        └──────── fatal error ───────────┴──► error channel + cancel ◄─────┘
//! ```
//!
//! # Key Design
//!
//! - **Typed edges**: the item type may differ on each channel
//! - **Cancellation**: one `CancellationToken` per pipeline, selected on at
//!   every send and receive
//! - **Close protocol**: a channel closes when the last worker of the stage
//!   feeding it exits
//! - **Retries**: [`RetryPolicy`] retries only retryable error kinds, with
//!   exponential backoff capped at 10 s
//! - **Rate limiting**: a [`RateLimiter`] shared by the egress pool releases
//!   one token per batch
//!
//! # Example
//!
//! ```ignore
//! use mpat_pipeline::{Passthrough, Pipeline, PipelineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let handle = Pipeline::new("copy", PipelineConfig::default(), ingest, Passthrough::new(), egress)
//!     .start(&cancel)?;
//! let snapshot = handle.wait().await?;
//! ```

mod config;
mod error;
mod metrics;
mod progress;
mod rate_limit;
mod retry;
mod runtime;
mod stage;

pub use config::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_WORKERS, MIN_CHANNEL_CAPACITY, PipelineConfig};
pub use error::{PipelineError, Result, Stage, TaskError};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use progress::ProgressReporter;
pub use rate_limit::RateLimiter;
pub use retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY, MAX_RETRY_DELAY, RetryPolicy};
pub use runtime::{Pipeline, PipelineHandle};
pub use stage::{Egress, Emitter, Ingest, Passthrough, Process, StageContext};
