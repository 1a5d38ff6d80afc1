//! Query builder
//!
//! Every builder takes scalar parameters and returns a single-line query. The
//! HTTP endpoint receives queries as a URL parameter, so no builder may emit a
//! newline.

use std::fmt::Write;

use mpat_protocol::{ColumnDef, Derivation, RESERVED_RANGES, TableKind, TableType, table_type};

/// `SELECT count() FROM t`
pub fn select_count(table: &str) -> String {
    format!("SELECT count() FROM {table}")
}

/// `SELECT * FROM t [ORDER BY ..] LIMIT l OFFSET o FORMAT f`
///
/// `SELECT *` leaves out materialized columns, so the result can be fed to
/// `INSERT .. FORMAT` on a table with the same schema.
pub fn select_limit_offset_format(
    table: &str,
    order_by: &[&str],
    limit: u64,
    offset: u64,
    format: &str,
) -> String {
    let mut sql = format!("SELECT * FROM {table}");
    if !order_by.is_empty() {
        let _ = write!(sql, " ORDER BY {}", order_by.join(", "));
    }
    let _ = write!(sql, " LIMIT {limit} OFFSET {offset} FORMAT {format}");
    sql
}

/// Ordering that makes `LIMIT/OFFSET` windows of a table deterministic
pub fn chunk_order(table: &str) -> Vec<&'static str> {
    match table_type(table) {
        TableType::Results => TableKind::Results.total_order(),
        TableType::Routes => TableKind::Routes.total_order(),
        TableType::Unknown => Vec::new(),
    }
}

/// `INSERT INTO t FORMAT f`
pub fn insert_format(table: &str, format: &str) -> String {
    format!("INSERT INTO {table} FORMAT {format}")
}

pub fn drop_table(table: &str, if_exists: bool) -> String {
    if if_exists {
        format!("DROP TABLE IF EXISTS {table}")
    } else {
        format!("DROP TABLE {table}")
    }
}

pub fn truncate_table(table: &str, if_exists: bool) -> String {
    if if_exists {
        format!("TRUNCATE TABLE IF EXISTS {table}")
    } else {
        format!("TRUNCATE TABLE {table}")
    }
}

pub fn create_results_table(table: &str, if_not_exists: bool) -> String {
    create_table(table, TableKind::Results, if_not_exists)
}

pub fn create_routes_table(table: &str, if_not_exists: bool) -> String {
    create_table(table, TableKind::Routes, if_not_exists)
}

pub fn create_forwarding_decisions_table(table: &str, if_not_exists: bool) -> String {
    create_table(table, TableKind::ForwardingDecisions, if_not_exists)
}

/// DDL for a table kind, generated from the column registry
pub fn create_table(table: &str, kind: TableKind, if_not_exists: bool) -> String {
    let columns: Vec<String> = kind.columns().iter().map(column_ddl).collect();

    let mut sql = String::from("CREATE TABLE ");
    if if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    let _ = write!(sql, "{table} ({}) ENGINE MergeTree", columns.join(", "));
    if let Some(key) = kind.primary_key() {
        let _ = write!(sql, " PRIMARY KEY ({})", key.join(", "));
    }
    let _ = write!(sql, " ORDER BY ({})", kind.order_by().join(", "));
    sql
}

fn column_ddl(column: &ColumnDef) -> String {
    let mut ddl = format!("{} {}", column.name, column.sql_type);
    match column.derivation {
        Derivation::Base => {}
        Derivation::Expr(expr) => {
            let _ = write!(ddl, " MATERIALIZED {expr}");
        }
        Derivation::Reserved(source) => {
            let _ = write!(ddl, " MATERIALIZED {}", reserved_predicate(source));
        }
    }
    if let Some(codec) = column.codec {
        let _ = write!(ddl, " CODEC({codec})");
    }
    ddl
}

/// `(col >= toIPv6('a') AND col <= toIPv6('b')) OR ..` over every reserved range
pub fn reserved_predicate(column: &str) -> String {
    let terms: Vec<String> = RESERVED_RANGES
        .iter()
        .map(|r| {
            format!(
                "({column} >= toIPv6('{}') AND {column} <= toIPv6('{}'))",
                r.start, r.end
            )
        })
        .collect();
    format!("({})", terms.join(" OR "))
}

/// Grouped select over one or more results tables
///
/// One row per (flow-id, probe_dst_prefix), with the replies packed into an
/// array of tuples sorted by `probe_ttl`.
pub fn select_grouped_by_flow(database: &str, tables: &[&str]) -> String {
    const INNER: &str = "probe_protocol, probe_src_addr, probe_dst_prefix, probe_dst_addr, \
        probe_src_port, probe_dst_port, probe_ttl, reply_src_addr, capture_timestamp, \
        reply_protocol, reply_icmp_type, reply_icmp_code, reply_size, rtt, round";
    const KEY: &str = "probe_protocol, probe_src_addr, probe_dst_prefix, probe_dst_addr, \
        probe_src_port, probe_dst_port";

    let union: Vec<String> = tables
        .iter()
        .map(|t| format!("SELECT {INNER} FROM {database}.{t}"))
        .collect();

    format!(
        "SELECT {KEY}, arraySort(x -> x.1, groupArray((probe_ttl, reply_src_addr, \
         toUnixTimestamp(capture_timestamp), reply_protocol, reply_icmp_type, reply_icmp_code, \
         reply_size, rtt, round))) AS replies FROM ({}) GROUP BY ({KEY})",
        union.join(" UNION ALL ")
    )
}

/// Row count and size of one table from `system.tables`
pub fn select_table_stats(database: &str, table: &str) -> String {
    format!(
        "SELECT ifNull(total_rows, 0) AS total_rows, ifNull(total_bytes, 0) AS total_bytes \
         FROM system.tables WHERE database = {} AND name = {}",
        quote(database),
        quote(table)
    )
}

/// Column names of one table, in declaration order
pub fn select_columns(database: &str, table: &str) -> String {
    format!(
        "SELECT name FROM system.columns WHERE database = {} AND table = {} ORDER BY position",
        quote(database),
        quote(table)
    )
}

/// Quote a string literal
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
