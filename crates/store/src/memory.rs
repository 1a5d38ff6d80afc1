//! In-memory store
//!
//! Tables live in a map guarded by a lock. The "native" stream format is one
//! JSON object per line, so a chunk downloaded from one `MemoryStore` can be
//! uploaded into another the same way ClickHouse streams `FORMAT Native`.
//!
//! Fault injection hooks let tests exercise retry and cancellation paths:
//! transient failures on the next N calls of an operation (optionally after
//! an upload has applied its rows) and a fixed delay before every upload
//! completes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::{StreamExt, TryStreamExt, stream};
use mpat_protocol::{ForwardingDecisionRow, GroupedFlow, ProbeRecord, RouteRow, TableKind};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StoreError;
use crate::{ByteStream, Chunk, FlowStream, Result, Store, TableInfo};

/// One table: its column names and rows as JSON objects
#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Value>,
}

/// Operation a fault can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Download,
    /// Upload fails before any row is applied
    Upload,
    /// Upload applies its rows, then reports a failure
    UploadCommitted,
    Insert,
    GroupedFlows,
}

/// In-memory [`Store`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
    failures: Mutex<HashMap<Op, u32>>,
    upload_delay: Mutex<Option<Duration>>,
    downloads: Mutex<Vec<(String, u64)>>,
    uploads: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, as the pipelines take it
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // -------------------------------------------------------------------------
    // Seeding and inspection
    // -------------------------------------------------------------------------

    /// Create `table` with the schema of `kind` and the given rows
    pub fn seed<T: Serialize>(&self, table: &str, kind: TableKind, rows: &[T]) -> Result<()> {
        let rows = rows.iter().map(to_value).collect::<Result<Vec<_>>>()?;
        self.tables.write().insert(
            table.to_string(),
            MemoryTable {
                columns: kind_columns(kind),
                rows,
            },
        );
        Ok(())
    }

    /// Create a table with arbitrary column names and no rows
    pub fn seed_columns(&self, table: &str, columns: &[&str]) {
        self.tables.write().insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    /// Decode all rows of a table
    pub fn rows<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        t.rows.iter().map(|v| from_value(v.clone())).collect()
    }

    pub fn exists(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// `(table, offset)` of every chunk downloaded so far, in call order
    pub fn downloaded_chunks(&self) -> Vec<(String, u64)> {
        self.downloads.lock().clone()
    }

    /// Number of uploads that completed
    pub fn completed_uploads(&self) -> u32 {
        self.uploads.load(Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Fail the next `count` calls of `op` with a transient error
    pub fn fail_next(&self, op: Op, count: u32) {
        *self.failures.lock().entry(op).or_default() += count;
    }

    /// Delay every upload by `delay` before it is applied
    pub fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.lock() = Some(delay);
    }

    fn inject(&self, op: Op) -> Result<()> {
        let mut failures = self.failures.lock();
        match failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Transient(format!("injected {op:?} failure")))
            }
            _ => Ok(()),
        }
    }

    fn append(&self, table: &str, rows: Vec<Value>) -> Result<u64> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let count = rows.len() as u64;
        t.rows.extend(rows);
        Ok(count)
    }

    fn insert_typed<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<u64> {
        self.inject(Op::Insert)?;
        let rows = rows.iter().map(to_value).collect::<Result<Vec<_>>>()?;
        self.append(table, rows)
    }
}

fn kind_columns(kind: TableKind) -> Vec<String> {
    kind.columns().iter().map(|c| c.name.to_string()).collect()
}

fn to_value<T: Serialize>(row: &T) -> Result<Value> {
    serde_json::to_value(row).map_err(|e| StoreError::Codec(e.to_string()))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Encode rows as one JSON object per line
fn encode_lines(rows: &[Value]) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    for row in rows {
        let line = serde_json::to_vec(row).map_err(|e| StoreError::Codec(e.to_string()))?;
        buf.put_slice(&line);
        buf.put_u8(b'\n');
    }
    Ok(buf.freeze())
}

fn decode_lines(body: &[u8]) -> Result<Vec<Value>> {
    body.split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).map_err(|e| StoreError::Codec(e.to_string())))
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    async fn info(&self, tables: &[String]) -> Result<Vec<TableInfo>> {
        let map = self.tables.read();
        tables
            .iter()
            .map(|name| match map.get(name) {
                Some(t) => Ok(TableInfo {
                    table: name.clone(),
                    exists: true,
                    num_rows: t.rows.len() as u64,
                    num_bytes: encode_lines(&t.rows)?.len() as u64,
                    columns: t.columns.clone(),
                }),
                None => Ok(TableInfo::missing(name.clone())),
            })
            .collect()
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.tables.write().remove(table);
        Ok(())
    }

    async fn truncate_table(&self, table: &str) -> Result<()> {
        if let Some(t) = self.tables.write().get_mut(table) {
            t.rows.clear();
        }
        Ok(())
    }

    async fn create_table(&self, table: &str, kind: TableKind) -> Result<()> {
        self.tables
            .write()
            .entry(table.to_string())
            .or_insert_with(|| MemoryTable {
                columns: kind_columns(kind),
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn download_chunk(&self, chunk: &Chunk) -> Result<ByteStream> {
        self.inject(Op::Download)?;
        let body = {
            let tables = self.tables.read();
            let t = tables
                .get(&chunk.table)
                .ok_or_else(|| StoreError::TableNotFound(chunk.table.clone()))?;
            let start = (chunk.offset as usize).min(t.rows.len());
            let end = start.saturating_add(chunk.limit as usize).min(t.rows.len());
            encode_lines(&t.rows[start..end])?
        };
        self.downloads
            .lock()
            .push((chunk.table.clone(), chunk.offset));

        // Split the body in two frames so consumers see a real stream
        let mid = body.len() / 2;
        let frames = vec![Ok(body.slice(..mid)), Ok(body.slice(mid..))];
        Ok(stream::iter(frames).boxed())
    }

    async fn upload_native(&self, table: &str, body: ByteStream) -> Result<()> {
        self.inject(Op::Upload)?;
        let frames: Vec<Bytes> = body.try_collect().await?;
        let delay = *self.upload_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let rows = decode_lines(&frames.concat())?;
        self.append(table, rows)?;
        self.inject(Op::UploadCommitted)?;
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn grouped_flows(&self, tables: &[String]) -> Result<FlowStream> {
        self.inject(Op::GroupedFlows)?;
        let mut records = Vec::new();
        for table in tables {
            records.extend(self.rows::<ProbeRecord>(table)?);
        }
        let flows: Vec<Result<GroupedFlow>> =
            GroupedFlow::group(&records).into_iter().map(Ok).collect();
        Ok(stream::iter(flows).boxed())
    }

    async fn insert_records(&self, table: &str, rows: &[ProbeRecord]) -> Result<u64> {
        self.insert_typed(table, rows)
    }

    async fn insert_routes(&self, table: &str, rows: &[RouteRow]) -> Result<u64> {
        self.insert_typed(table, rows)
    }

    async fn insert_decisions(&self, table: &str, rows: &[ForwardingDecisionRow]) -> Result<u64> {
        self.insert_typed(table, rows)
    }
}
