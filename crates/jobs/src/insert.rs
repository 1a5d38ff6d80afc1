//! Typed insert egress
//!
//! Routes, forwarding decisions and probe records all end the same way: rows
//! are batched to `upload_chunk_size` and written with one insert per batch.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use mpat_pipeline::{Egress, StageContext, TaskError};
use mpat_protocol::{ForwardingDecisionRow, ProbeRecord, RouteRow, TableKind};
use mpat_store::Store;
use tracing::debug;

/// A row type with a typed insert path
#[async_trait]
pub trait InsertRows: Sized + Send + Sync + Unpin + 'static {
    /// Schema of the tables these rows go into
    const KIND: TableKind;

    async fn insert(store: &dyn Store, table: &str, rows: &[Self]) -> mpat_store::Result<u64>;
}

#[async_trait]
impl InsertRows for ProbeRecord {
    const KIND: TableKind = TableKind::Results;

    async fn insert(store: &dyn Store, table: &str, rows: &[Self]) -> mpat_store::Result<u64> {
        store.insert_records(table, rows).await
    }
}

#[async_trait]
impl InsertRows for RouteRow {
    const KIND: TableKind = TableKind::Routes;

    async fn insert(store: &dyn Store, table: &str, rows: &[Self]) -> mpat_store::Result<u64> {
        store.insert_routes(table, rows).await
    }
}

#[async_trait]
impl InsertRows for ForwardingDecisionRow {
    const KIND: TableKind = TableKind::ForwardingDecisions;

    async fn insert(store: &dyn Store, table: &str, rows: &[Self]) -> mpat_store::Result<u64> {
        store.insert_decisions(table, rows).await
    }
}

/// Inserts batches of `R` into one table
pub struct InsertEgress<R> {
    store: Arc<dyn Store>,
    table: String,
    batch_size: usize,
    _rows: PhantomData<fn(R)>,
}

impl<R: InsertRows> InsertEgress<R> {
    pub fn new(store: Arc<dyn Store>, table: impl Into<String>, batch_size: usize) -> Self {
        Self {
            store,
            table: table.into(),
            batch_size: batch_size.max(1),
            _rows: PhantomData,
        }
    }
}

#[async_trait]
impl<R: InsertRows> Egress for InsertEgress<R> {
    type Input = R;

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn flush(&self, ctx: &StageContext, batch: Vec<R>) -> Result<u64, TaskError> {
        let store = self.store.as_ref();
        let table = self.table.as_str();
        let rows = batch.as_slice();

        let written = ctx
            .retry(table, |_| async move {
                R::insert(store, table, rows)
                    .await
                    .map_err(|e| TaskError::from_error(table, &e))
            })
            .await?;

        debug!(table = table, worker = ctx.worker(), rows = written, "inserted batch");
        Ok(written)
    }
}
