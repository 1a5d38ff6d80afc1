//! Fixtures shared by store and pipeline tests

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, TimeZone, Utc};
use mpat_protocol::ProbeRecord;

/// Iris results table name used across tests
pub const RESULTS_TABLE: &str =
    "results__ab01cd23_4567_89ef_0123_456789abcdef__cd45ef67_89ab_cdef_0123_456789abcdef";

/// `::ffff:a.b.c.d`
pub fn mapped(a: u8, b: u8, c: u8, d: u8) -> Ipv6Addr {
    Ipv4Addr::new(a, b, c, d).to_ipv6_mapped()
}

/// Capture time `secs` seconds after 2024-01-01T00:00:00Z
pub fn at(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
        + chrono::Duration::seconds(i64::from(secs))
}

/// An ICMP time-exceeded reply from `reply` at `ttl`, on a flow towards
/// 8.8.8.8 identified by `src_port`
pub fn probe_record(src_port: u16, ttl: u8, reply: Ipv6Addr) -> ProbeRecord {
    ProbeRecord {
        capture_timestamp: at(u32::from(ttl)),
        probe_protocol: 1,
        probe_src_addr: mapped(192, 0, 2, 1),
        probe_dst_addr: mapped(8, 8, 8, 8),
        probe_src_port: src_port,
        probe_dst_port: 0,
        probe_ttl: ttl,
        quoted_ttl: 1,
        reply_src_addr: reply,
        reply_protocol: 1,
        reply_icmp_type: 11,
        reply_icmp_code: 0,
        reply_ttl: 250,
        reply_size: 56,
        reply_mpls_labels: Vec::new(),
        rtt: 100 + u16::from(ttl),
        round: 1,
    }
}
