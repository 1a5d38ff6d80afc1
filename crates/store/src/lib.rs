//! MPAT Store - Column store access
//!
//! The pipelines talk to a store through the [`Store`] trait. Two
//! implementations exist:
//!
//! | Store | Purpose |
//! |-------|---------|
//! | [`ClickHouseStore`] | ClickHouse over HTTP: typed rows via the `clickhouse` client, native byte streams via `reqwest` |
//! | [`memory::MemoryStore`] | In-memory tables with fault injection, for tests |
//!
//! Queries are built by [`queries`]; every builder returns a single-line
//! string.
//!
//! # Example
//!
//! ```ignore
//! use mpat_store::{ClickHouseStore, Store, StoreConfig};
//!
//! let store = ClickHouseStore::connect(StoreConfig::from_dsn(dsn)?).await?;
//! let info = store.info(&["results__...".into()]).await?;
//! ```

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use mpat_protocol::{ForwardingDecisionRow, GroupedFlow, ProbeRecord, RouteRow, TableKind};

mod clickhouse;
mod config;
mod error;
pub mod memory;
pub mod queries;
pub mod rows;
pub mod test_utils;

pub use crate::clickhouse::ClickHouseStore;
pub use config::{DEFAULT_DATABASE, DEFAULT_TIMEOUT, StoreConfig, redact};
pub use error::StoreError;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Stream of bytes in the store's native format
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Stream of grouped flows
pub type FlowStream = Pin<Box<dyn Stream<Item = Result<GroupedFlow>> + Send>>;

// =============================================================================
// Table info
// =============================================================================

/// Metadata of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub table: String,
    pub exists: bool,
    pub num_rows: u64,
    pub num_bytes: u64,
    pub columns: Vec<String>,
}

impl TableInfo {
    /// Info of a table the store does not have
    pub fn missing(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            exists: false,
            num_rows: 0,
            num_bytes: 0,
            columns: Vec::new(),
        }
    }

    /// `exists && num_rows == source.num_rows`
    pub fn is_coherent_with(&self, source: &TableInfo) -> bool {
        self.exists && self.num_rows == source.num_rows
    }
}

impl fmt::Display for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exists {
            write!(
                f,
                "{} rows={} bytes={} columns={}",
                self.table,
                self.num_rows,
                self.num_bytes,
                self.columns.len()
            )
        } else {
            write!(f, "{} (missing)", self.table)
        }
    }
}

// =============================================================================
// Chunks
// =============================================================================

/// A `(table, offset, limit)` window of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub table: String,
    pub offset: u64,
    pub limit: u64,
}

impl Chunk {
    /// Windows covering `num_rows` rows, `ceil(num_rows / chunk_size)` of them
    pub fn plan(table: &str, num_rows: u64, chunk_size: u64) -> Vec<Chunk> {
        let chunk_size = chunk_size.max(1);
        (0..num_rows.div_ceil(chunk_size))
            .map(|i| Chunk {
                table: table.to_string(),
                offset: i * chunk_size,
                limit: chunk_size,
            })
            .collect()
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..+{}]", self.table, self.offset, self.limit)
    }
}

// =============================================================================
// Store trait
// =============================================================================

/// Operations the pipelines need from a column store
///
/// Implementations are shared by every worker of a pipeline and must be safe
/// for concurrent use.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check the store is reachable
    async fn ping(&self) -> Result<()>;

    /// `SELECT count()` of one table
    async fn count(&self, table: &str) -> Result<u64>;

    /// Metadata per table; missing tables report `exists = false`
    async fn info(&self, tables: &[String]) -> Result<Vec<TableInfo>>;

    /// `DROP TABLE IF EXISTS`
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// `TRUNCATE TABLE IF EXISTS`
    async fn truncate_table(&self, table: &str) -> Result<()>;

    /// `CREATE TABLE IF NOT EXISTS` with the schema of `kind`
    async fn create_table(&self, table: &str, kind: TableKind) -> Result<()>;

    /// Stream one chunk in the native format
    async fn download_chunk(&self, chunk: &Chunk) -> Result<ByteStream>;

    /// Insert a native-format stream into a table
    async fn upload_native(&self, table: &str, body: ByteStream) -> Result<()>;

    /// Stream the grouped-flow relation over the union of `tables`
    async fn grouped_flows(&self, tables: &[String]) -> Result<FlowStream>;

    /// Insert probe records (base columns); returns rows written
    async fn insert_records(&self, table: &str, rows: &[ProbeRecord]) -> Result<u64>;

    /// Insert route links; returns rows written
    async fn insert_routes(&self, table: &str, rows: &[RouteRow]) -> Result<u64>;

    /// Insert forwarding decisions; returns rows written
    async fn insert_decisions(&self, table: &str, rows: &[ForwardingDecisionRow]) -> Result<u64>;
}


#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;


#[cfg(test)]
#[path = "rows_test.rs"]
mod rows_test;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_plan() {
        let chunks = Chunk::plan("t", 3, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].offset, chunks[1].offset), (0, 2));
        assert!(chunks.iter().all(|c| c.limit == 2));

        assert!(Chunk::plan("t", 0, 2).is_empty());
        assert_eq!(Chunk::plan("t", 4, 2).len(), 2);
        assert_eq!(Chunk::plan("t", 5, 0).len(), 5);
    }

    #[test]
    fn test_coherence() {
        let source = TableInfo {
            table: "t".into(),
            exists: true,
            num_rows: 3,
            num_bytes: 10,
            columns: vec![],
        };
        let mut dest = source.clone();
        assert!(dest.is_coherent_with(&source));
        dest.num_rows = 2;
        assert!(!dest.is_coherent_with(&source));
        assert!(!TableInfo::missing("t").is_coherent_with(&TableInfo::missing("t")));
    }

    #[test]
    fn test_display() {
        assert_eq!(TableInfo::missing("t").to_string(), "t (missing)");
        let chunk = Chunk {
            table: "t".into(),
            offset: 4,
            limit: 2,
        };
        assert_eq!(chunk.to_string(), "t[4..+2]");
    }
}
