//! MPAT Protocol - Core types shared by every MPAT crate
//!
//! This crate provides the foundational types that flow through the pipelines:
//! - `TableName` - Strict table-name grammar and `results`/`routes` conversions
//! - `ProbeRecord` - One raw traceroute reply (results table row)
//! - `GroupedFlow` - One flow of the grouped-select relation
//! - `RouteRow`, `ForwardingDecisionRow` - Derived relation rows
//! - `ColumnDef` - Declarative column registry per table kind
//! - `ErrorKind` - Error categories shared by all crates
//!
//! # Design Principles
//!
//! - **Pure**: No I/O. Everything here is a value or a pure function.
//! - **Registry-driven**: Insert column order, JSON field order and DDL come
//!   from one column list per row type.
//! - **IPv6 everywhere**: IPv4 addresses are carried as `::ffff:a.b.c.d`.

mod addr;
mod error;
mod names;
mod records;
mod schema;

pub use addr::{
    PROTOCOL_ICMP, PROTOCOL_ICMPV6, PROTOCOL_UDP, RESERVED_RANGES, ReservedRange, is_null_addr,
    is_reserved, prefix_of, to_ipv6,
};
pub use error::{Classify, ErrorKind};
pub use names::{
    NameError, Platform, TableName, TableType, convert, forwarding_decisions_name, platform,
    table_type, to_results, to_routes,
};
pub use records::{
    FlowId, FlowReply, ForwardingDecisionRow, GroupedFlow, MplsLabel, ProbeRecord, RouteRow,
    time_exceeded,
};
pub use schema::{
    ColumnDef, Derivation, FORWARDING_DECISIONS_COLUMNS, RESULTS_COLUMNS, ROUTES_COLUMNS,
    TableKind,
};

/// Result type for name operations
pub type Result<T> = std::result::Result<T, NameError>;

// Test modules - only compiled during testing
#[cfg(test)]
mod addr_test;
#[cfg(test)]
mod names_test;
#[cfg(test)]
mod schema_test;
