//! MPAT - Sources
//!
//! Warts ingestion: where raw traceroute files come from and how they turn
//! into [`ProbeRecord`](mpat_protocol::ProbeRecord)s.
//!
//! # Components
//!
//! - **Ark** - lists the `.gz` warts files of a daily Ark cycle
//! - **Warts reader** - streams a URL or local file through gzip and the
//!   external converter, yielding records line by line
//! - **Formats** - the converter's `iris` and `flat` JSON line formats
//!
//! # Example
//!
//! ```ignore
//! use mpat_sources::{ArkClient, ConverterConfig, WartsReader, WartsSource, build_client};
//!
//! let http = build_client(DEFAULT_HTTP_TIMEOUT)?;
//! let ark = ArkClient::new(http.clone(), base_url, None);
//! let reader = WartsReader::new(http, None, ConverterConfig::default());
//!
//! for url in ark.list_cycle(date).await? {
//!     let mut stream = reader.open(&WartsSource::Url(url)).await?;
//!     while let Some(records) = stream.next_records().await? {
//!         // ...
//!     }
//!     stream.finish().await?;
//! }
//! ```

mod ark;
mod error;
mod format;
mod http;
mod warts;

pub use ark::{ArkClient, DEFAULT_ARK_BASE_URL, cycle_url, extract_links, parse_cycle_date};
pub use error::{IngestError, Result};
pub use format::OutputFormat;
pub use http::{Credentials, DEFAULT_HTTP_TIMEOUT, build_client};
pub use warts::{
    CONVERTER_INPUT_FORMAT, ConverterConfig, DEFAULT_CONVERTER, WartsReader, WartsSource,
    WartsStream, WartsSummary,
};
