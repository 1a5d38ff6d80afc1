//! Declarative column registry
//!
//! One column list per table kind. The registry is the single source of truth
//! for DDL, insert column order, and the shape check the lifecycle manager
//! runs against an existing table.

/// How a column gets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Written by inserts
    Base,
    /// `MATERIALIZED <expr>`
    Expr(&'static str),
    /// `MATERIALIZED` membership test of the named column in the reserved ranges
    Reserved(&'static str),
}

/// One column of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub codec: Option<&'static str>,
    pub derivation: Derivation,
}

impl ColumnDef {
    const fn base(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            codec: None,
            derivation: Derivation::Base,
        }
    }

    const fn codec(mut self, codec: &'static str) -> Self {
        self.codec = Some(codec);
        self
    }

    const fn materialized(name: &'static str, sql_type: &'static str, expr: &'static str) -> Self {
        Self {
            name,
            sql_type,
            codec: None,
            derivation: Derivation::Expr(expr),
        }
    }

    const fn reserved(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            sql_type: "UInt8",
            codec: None,
            derivation: Derivation::Reserved(column),
        }
    }

    /// Whether inserts carry this column
    #[inline]
    pub const fn insertable(&self) -> bool {
        matches!(self.derivation, Derivation::Base)
    }
}

// =============================================================================
// Column lists
// =============================================================================

pub const RESULTS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::base("capture_timestamp", "DateTime").codec("T64, ZSTD(1)"),
    ColumnDef::base("probe_protocol", "UInt8"),
    ColumnDef::base("probe_src_addr", "IPv6"),
    ColumnDef::base("probe_dst_addr", "IPv6"),
    ColumnDef::base("probe_src_port", "UInt16"),
    ColumnDef::base("probe_dst_port", "UInt16"),
    ColumnDef::base("probe_ttl", "UInt8"),
    ColumnDef::base("quoted_ttl", "UInt8"),
    ColumnDef::base("reply_src_addr", "IPv6"),
    ColumnDef::base("reply_protocol", "UInt8"),
    ColumnDef::base("reply_icmp_type", "UInt8"),
    ColumnDef::base("reply_icmp_code", "UInt8"),
    ColumnDef::base("reply_ttl", "UInt8"),
    ColumnDef::base("reply_size", "UInt16"),
    ColumnDef::base("reply_mpls_labels", "Array(Tuple(UInt32, UInt8, UInt8, UInt8))"),
    ColumnDef::base("rtt", "UInt16").codec("T64, ZSTD(1)"),
    ColumnDef::base("round", "UInt8"),
    ColumnDef::materialized(
        "probe_dst_prefix",
        "IPv6",
        "toIPv6(cutIPv6(probe_dst_addr, 8, 1))",
    ),
    ColumnDef::materialized(
        "reply_src_prefix",
        "IPv6",
        "toIPv6(cutIPv6(probe_dst_addr, 8, 1))",
    ),
    ColumnDef::reserved("private_probe_dst_prefix", "probe_dst_prefix"),
    ColumnDef::reserved("private_reply_src_addr", "reply_src_addr"),
    ColumnDef::materialized(
        "destination_host_reply",
        "UInt8",
        "probe_dst_addr = reply_src_addr",
    ),
    ColumnDef::materialized(
        "destination_prefix_reply",
        "UInt8",
        "probe_dst_prefix = reply_src_prefix",
    ),
    ColumnDef::materialized(
        "valid_probe_protocol",
        "UInt8",
        "probe_protocol IN [1, 17, 58]",
    ),
    ColumnDef::materialized(
        "time_exceeded_reply",
        "UInt8",
        "(reply_protocol = 1 AND reply_icmp_type = 11) OR (reply_protocol = 58 AND reply_icmp_type = 3)",
    ),
];

pub const ROUTES_COLUMNS: &[ColumnDef] = &[
    ColumnDef::base("ip_addr", "IPv6"),
    ColumnDef::base("dst_prefix", "IPv6"),
    ColumnDef::base("next_addr", "IPv6"),
    ColumnDef::base("first_capture_timestamp", "DateTime"),
    ColumnDef::base("probe_protocol", "UInt8"),
    ColumnDef::base("probe_src_addr", "IPv6"),
    ColumnDef::base("probe_dst_addr", "IPv6"),
    ColumnDef::base("probe_src_port", "UInt16"),
    ColumnDef::base("probe_dst_port", "UInt16"),
    ColumnDef::base("reply_icmp_type", "UInt8"),
    ColumnDef::base("reply_icmp_code", "UInt8"),
    ColumnDef::base("reply_size", "UInt16"),
    ColumnDef::base("rtt", "UInt16"),
    ColumnDef::base("time_exceeded_reply", "UInt8"),
];

pub const FORWARDING_DECISIONS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::base("near_round", "UInt8"),
    ColumnDef::base("near_addr", "IPv6"),
    ColumnDef::base("near_probe_ttl", "UInt8"),
    ColumnDef::base("far_round", "UInt8"),
    ColumnDef::base("far_addr", "IPv6"),
    ColumnDef::base("far_probe_ttl", "UInt8"),
    ColumnDef::base("probe_protocol", "UInt8"),
    ColumnDef::base("probe_src_addr", "IPv6"),
    ColumnDef::base("probe_dst_prefix", "IPv6"),
    ColumnDef::base("probe_dst_addr", "IPv6"),
    ColumnDef::base("probe_src_port", "UInt16"),
    ColumnDef::base("probe_dst_port", "UInt16"),
];

// =============================================================================
// Table kind
// =============================================================================

/// Schema family of a destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Results,
    Routes,
    ForwardingDecisions,
}

impl TableKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Results => "results",
            Self::Routes => "routes",
            Self::ForwardingDecisions => "forwarding_decisions",
        }
    }

    /// Full column list, materialized columns included
    pub const fn columns(self) -> &'static [ColumnDef] {
        match self {
            Self::Results => RESULTS_COLUMNS,
            Self::Routes => ROUTES_COLUMNS,
            Self::ForwardingDecisions => FORWARDING_DECISIONS_COLUMNS,
        }
    }

    /// Column names an insert carries, in insert order
    pub fn insert_columns(self) -> impl Iterator<Item = &'static str> {
        self.columns()
            .iter()
            .filter(|c| c.insertable())
            .map(|c| c.name)
    }

    /// `PRIMARY KEY` columns, if the table declares one
    pub const fn primary_key(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Results => None,
            Self::Routes => Some(&["ip_addr", "dst_prefix", "next_addr"]),
            Self::ForwardingDecisions => None,
        }
    }

    /// `ORDER BY` columns
    pub const fn order_by(self) -> &'static [&'static str] {
        match self {
            Self::Results => &[
                "probe_protocol",
                "probe_src_addr",
                "probe_dst_prefix",
                "probe_dst_addr",
                "probe_src_port",
                "probe_dst_port",
                "probe_ttl",
            ],
            Self::Routes => &["ip_addr", "dst_prefix", "next_addr"],
            Self::ForwardingDecisions => &["probe_dst_prefix", "near_addr", "far_addr"],
        }
    }

    /// `ORDER BY` columns followed by every other inserted column
    ///
    /// Rows that tie on the table's sort key still get a total order, so
    /// `LIMIT/OFFSET` windows over the same data never overlap.
    pub fn total_order(self) -> Vec<&'static str> {
        let key = self.order_by();
        let mut columns = key.to_vec();
        columns.extend(self.insert_columns().filter(|c| !key.contains(c)));
        columns
    }

    /// Whether an existing table's column names match this kind, in order
    pub fn matches_columns<S: AsRef<str>>(self, columns: &[S]) -> bool {
        let expected = self.columns();
        expected.len() == columns.len()
            && expected
                .iter()
                .zip(columns)
                .all(|(def, actual)| def.name == actual.as_ref())
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
