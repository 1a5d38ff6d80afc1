//! ClickHouse store
//!
//! Typed reads and inserts go through the `clickhouse` client (RowBinary).
//! Native-format byte streams go through `reqwest` against the HTTP interface,
//! with the query passed as a URL parameter and the body streamed in either
//! direction.

use async_trait::async_trait;
use clickhouse::Client;
use clickhouse::insert::Insert;
use clickhouse::query::RowCursor;
use futures_util::future::try_join_all;
use futures_util::{StreamExt, TryStreamExt, stream};
use mpat_protocol::{ForwardingDecisionRow, GroupedFlow, ProbeRecord, RouteRow, TableKind};
use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::queries;
use crate::rows::{DecisionsRow, GroupedFlowRow, ResultsRow, RoutesRow, TableStatsRow};
use crate::{ByteStream, Chunk, FlowStream, Result, Store, TableInfo};

/// ClickHouse-backed [`Store`]
#[derive(Clone)]
pub struct ClickHouseStore {
    config: StoreConfig,
    client: Client,
    http: reqwest::Client,
}

impl std::fmt::Debug for ClickHouseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseStore")
            .field("dsn", &self.config.display_dsn())
            .finish()
    }
}

impl ClickHouseStore {
    /// Create a store without contacting the server
    pub fn new(config: StoreConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client(),
            http: config.build_http()?,
            config,
        })
    }

    /// Create a store and check the server answers
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let store = Self::new(config)?;
        store.ping().await?;
        tracing::debug!(dsn = %store.config.display_dsn(), "connected to store");
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Execute a statement without result
    pub async fn execute(&self, sql: &str) -> Result<()> {
        tracing::debug!(sql = %truncate_sql(sql), "execute");
        self.client.query(sql).execute().await?;
        Ok(())
    }

    /// Typed streaming cursor over a query
    pub fn query_rows<T>(&self, sql: &str) -> Result<RowCursor<T>>
    where
        T: clickhouse::RowOwned + clickhouse::RowRead,
    {
        Ok(self.client.query(sql).fetch::<T>()?)
    }

    /// Insert typed rows in one request; returns rows written
    pub async fn exec_insert<T>(&self, table: &str, rows: &[T]) -> Result<u64>
    where
        T: clickhouse::Row + Serialize + Send + Sync + 'static,
        for<'a> T: clickhouse::Row<Value<'a> = T>,
    {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut insert: Insert<T> = self.client.insert(table).await?;
        for row in rows {
            insert.write(row).await?;
        }
        insert.end().await?;
        Ok(rows.len() as u64)
    }

    /// Stream the result of a query in the native format
    pub async fn download_native(&self, sql: &str) -> Result<ByteStream> {
        tracing::debug!(sql = %truncate_sql(sql), "download");
        let response = self.request(self.http.get(self.build_url(sql))).send().await?;
        let response = check_status(response).await?;
        Ok(Box::pin(response.bytes_stream().map_err(StoreError::from)))
    }

    /// Stream a native-format body into `INSERT .. FORMAT Native`
    pub async fn upload_native_sql(&self, sql: &str, body: ByteStream) -> Result<()> {
        tracing::debug!(sql = %truncate_sql(sql), "upload");
        let response = self
            .request(self.http.post(self.build_url(sql)))
            .header("Content-Type", "application/octet-stream")
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn table_info(&self, table: &str) -> Result<TableInfo> {
        let database = &self.config.database;
        let stats = self
            .client
            .query(&queries::select_table_stats(database, table))
            .fetch_optional::<TableStatsRow>()
            .await?;

        let Some(stats) = stats else {
            return Ok(TableInfo::missing(table));
        };

        let columns = self
            .client
            .query(&queries::select_columns(database, table))
            .fetch_all::<String>()
            .await?;

        Ok(TableInfo {
            table: table.to_string(),
            exists: true,
            num_rows: stats.total_rows,
            num_bytes: stats.total_bytes,
            columns,
        })
    }

    /// Build the query URL with parameters
    fn build_url(&self, query: &str) -> String {
        format!(
            "{}/?database={}&query={}",
            self.config.url,
            urlencoding::encode(&self.config.database),
            urlencoding::encode(query)
        )
    }

    fn request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.username {
            Some(username) => request.basic_auth(username, self.config.password.as_ref()),
            None => request,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::status(status.as_u16(), &body))
}

/// First line of a query, capped for logs
fn truncate_sql(sql: &str) -> &str {
    let first_line = sql.lines().next().unwrap_or(sql);
    match first_line.char_indices().nth(120) {
        Some((idx, _)) => &first_line[..idx],
        None => first_line,
    }
}

#[async_trait]
impl Store for ClickHouseStore {
    async fn ping(&self) -> Result<()> {
        self.execute("SELECT 1").await
    }

    async fn count(&self, table: &str) -> Result<u64> {
        Ok(self
            .client
            .query(&queries::select_count(table))
            .fetch_one::<u64>()
            .await?)
    }

    async fn info(&self, tables: &[String]) -> Result<Vec<TableInfo>> {
        try_join_all(tables.iter().map(|t| self.table_info(t))).await
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.execute(&queries::drop_table(table, true)).await
    }

    async fn truncate_table(&self, table: &str) -> Result<()> {
        self.execute(&queries::truncate_table(table, true)).await
    }

    async fn create_table(&self, table: &str, kind: TableKind) -> Result<()> {
        self.execute(&queries::create_table(table, kind, true)).await
    }

    async fn download_chunk(&self, chunk: &Chunk) -> Result<ByteStream> {
        let sql = queries::select_limit_offset_format(
            &chunk.table,
            &queries::chunk_order(&chunk.table),
            chunk.limit,
            chunk.offset,
            "Native",
        );
        self.download_native(&sql).await
    }

    async fn upload_native(&self, table: &str, body: ByteStream) -> Result<()> {
        self.upload_native_sql(&queries::insert_format(table, "Native"), body)
            .await
    }

    async fn grouped_flows(&self, tables: &[String]) -> Result<FlowStream> {
        let tables: Vec<&str> = tables.iter().map(String::as_str).collect();
        let sql = queries::select_grouped_by_flow(&self.config.database, &tables);
        tracing::debug!(sql = %truncate_sql(&sql), "grouped select");

        let cursor = self.query_rows::<GroupedFlowRow>(&sql)?;
        let flows = stream::try_unfold(cursor, |mut cursor| async move {
            let row: Option<GroupedFlowRow> = cursor.next().await?;
            Ok::<_, StoreError>(row.map(|row| (GroupedFlow::from(row), cursor)))
        });
        Ok(flows.boxed())
    }

    async fn insert_records(&self, table: &str, rows: &[ProbeRecord]) -> Result<u64> {
        let rows: Vec<ResultsRow> = rows.iter().map(ResultsRow::from).collect();
        self.exec_insert(table, &rows).await
    }

    async fn insert_routes(&self, table: &str, rows: &[RouteRow]) -> Result<u64> {
        let rows: Vec<RoutesRow> = rows.iter().map(RoutesRow::from).collect();
        self.exec_insert(table, &rows).await
    }

    async fn insert_decisions(&self, table: &str, rows: &[ForwardingDecisionRow]) -> Result<u64> {
        let rows: Vec<DecisionsRow> = rows.iter().map(DecisionsRow::from).collect();
        self.exec_insert(table, &rows).await
    }
}
