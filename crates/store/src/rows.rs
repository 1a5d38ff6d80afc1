//! ClickHouse row types
//!
//! RowBinary mirrors of the protocol rows. `DateTime` columns travel as
//! seconds since epoch (`u32`), MPLS labels and grouped replies as tuples.
//! Field names and order must match the columns the query selects.

use std::net::Ipv6Addr;

use chrono::{DateTime, Utc};
use clickhouse::Row;
use mpat_protocol::{
    FlowId, FlowReply, ForwardingDecisionRow, GroupedFlow, MplsLabel, ProbeRecord, RouteRow,
};
use serde::{Deserialize, Serialize};

pub(crate) fn to_seconds(ts: DateTime<Utc>) -> u32 {
    ts.timestamp().clamp(0, i64::from(u32::MAX)) as u32
}

pub(crate) fn from_seconds(secs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
}

/// Base columns of a results table
///
/// ```sql
/// capture_timestamp DateTime, probe_protocol UInt8, probe_src_addr IPv6,
/// probe_dst_addr IPv6, probe_src_port UInt16, probe_dst_port UInt16,
/// probe_ttl UInt8, quoted_ttl UInt8, reply_src_addr IPv6, reply_protocol UInt8,
/// reply_icmp_type UInt8, reply_icmp_code UInt8, reply_ttl UInt8,
/// reply_size UInt16, reply_mpls_labels Array(Tuple(UInt32, UInt8, UInt8, UInt8)),
/// rtt UInt16, round UInt8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Row, Serialize, Deserialize)]
pub struct ResultsRow {
    pub capture_timestamp: u32,
    pub probe_protocol: u8,
    pub probe_src_addr: Ipv6Addr,
    pub probe_dst_addr: Ipv6Addr,
    pub probe_src_port: u16,
    pub probe_dst_port: u16,
    pub probe_ttl: u8,
    pub quoted_ttl: u8,
    pub reply_src_addr: Ipv6Addr,
    pub reply_protocol: u8,
    pub reply_icmp_type: u8,
    pub reply_icmp_code: u8,
    pub reply_ttl: u8,
    pub reply_size: u16,
    pub reply_mpls_labels: Vec<(u32, u8, u8, u8)>,
    pub rtt: u16,
    pub round: u8,
}

impl From<&ProbeRecord> for ResultsRow {
    fn from(r: &ProbeRecord) -> Self {
        Self {
            capture_timestamp: to_seconds(r.capture_timestamp),
            probe_protocol: r.probe_protocol,
            probe_src_addr: r.probe_src_addr,
            probe_dst_addr: r.probe_dst_addr,
            probe_src_port: r.probe_src_port,
            probe_dst_port: r.probe_dst_port,
            probe_ttl: r.probe_ttl,
            quoted_ttl: r.quoted_ttl,
            reply_src_addr: r.reply_src_addr,
            reply_protocol: r.reply_protocol,
            reply_icmp_type: r.reply_icmp_type,
            reply_icmp_code: r.reply_icmp_code,
            reply_ttl: r.reply_ttl,
            reply_size: r.reply_size,
            reply_mpls_labels: r.reply_mpls_labels.iter().map(|&l| l.into()).collect(),
            rtt: r.rtt,
            round: r.round,
        }
    }
}

impl From<ResultsRow> for ProbeRecord {
    fn from(r: ResultsRow) -> Self {
        Self {
            capture_timestamp: from_seconds(r.capture_timestamp),
            probe_protocol: r.probe_protocol,
            probe_src_addr: r.probe_src_addr,
            probe_dst_addr: r.probe_dst_addr,
            probe_src_port: r.probe_src_port,
            probe_dst_port: r.probe_dst_port,
            probe_ttl: r.probe_ttl,
            quoted_ttl: r.quoted_ttl,
            reply_src_addr: r.reply_src_addr,
            reply_protocol: r.reply_protocol,
            reply_icmp_type: r.reply_icmp_type,
            reply_icmp_code: r.reply_icmp_code,
            reply_ttl: r.reply_ttl,
            reply_size: r.reply_size,
            reply_mpls_labels: r.reply_mpls_labels.into_iter().map(MplsLabel::from).collect(),
            rtt: r.rtt,
            round: r.round,
        }
    }
}

/// Row of a routes table
#[derive(Debug, Clone, PartialEq, Eq, Row, Serialize, Deserialize)]
pub struct RoutesRow {
    pub ip_addr: Ipv6Addr,
    pub dst_prefix: Ipv6Addr,
    pub next_addr: Ipv6Addr,
    pub first_capture_timestamp: u32,
    pub probe_protocol: u8,
    pub probe_src_addr: Ipv6Addr,
    pub probe_dst_addr: Ipv6Addr,
    pub probe_src_port: u16,
    pub probe_dst_port: u16,
    pub reply_icmp_type: u8,
    pub reply_icmp_code: u8,
    pub reply_size: u16,
    pub rtt: u16,
    pub time_exceeded_reply: u8,
}

impl From<&RouteRow> for RoutesRow {
    fn from(r: &RouteRow) -> Self {
        Self {
            ip_addr: r.ip_addr,
            dst_prefix: r.dst_prefix,
            next_addr: r.next_addr,
            first_capture_timestamp: to_seconds(r.first_capture_timestamp),
            probe_protocol: r.probe_protocol,
            probe_src_addr: r.probe_src_addr,
            probe_dst_addr: r.probe_dst_addr,
            probe_src_port: r.probe_src_port,
            probe_dst_port: r.probe_dst_port,
            reply_icmp_type: r.reply_icmp_type,
            reply_icmp_code: r.reply_icmp_code,
            reply_size: r.reply_size,
            rtt: r.rtt,
            time_exceeded_reply: r.time_exceeded_reply,
        }
    }
}

/// Row of a forwarding-decisions table; same layout as the protocol row
#[derive(Debug, Clone, PartialEq, Eq, Row, Serialize, Deserialize)]
pub struct DecisionsRow {
    pub near_round: u8,
    pub near_addr: Ipv6Addr,
    pub near_probe_ttl: u8,
    pub far_round: u8,
    pub far_addr: Ipv6Addr,
    pub far_probe_ttl: u8,
    pub probe_protocol: u8,
    pub probe_src_addr: Ipv6Addr,
    pub probe_dst_prefix: Ipv6Addr,
    pub probe_dst_addr: Ipv6Addr,
    pub probe_src_port: u16,
    pub probe_dst_port: u16,
}

impl From<&ForwardingDecisionRow> for DecisionsRow {
    fn from(r: &ForwardingDecisionRow) -> Self {
        Self {
            near_round: r.near_round,
            near_addr: r.near_addr,
            near_probe_ttl: r.near_probe_ttl,
            far_round: r.far_round,
            far_addr: r.far_addr,
            far_probe_ttl: r.far_probe_ttl,
            probe_protocol: r.probe_protocol,
            probe_src_addr: r.probe_src_addr,
            probe_dst_prefix: r.probe_dst_prefix,
            probe_dst_addr: r.probe_dst_addr,
            probe_src_port: r.probe_src_port,
            probe_dst_port: r.probe_dst_port,
        }
    }
}

/// (probe_ttl, reply_src_addr, capture_timestamp, reply_protocol,
/// reply_icmp_type, reply_icmp_code, reply_size, rtt, round)
pub type ReplyTuple = (u8, Ipv6Addr, u32, u8, u8, u8, u16, u16, u8);

/// One row of [`select_grouped_by_flow`](crate::queries::select_grouped_by_flow)
#[derive(Debug, Clone, Row, Deserialize)]
pub struct GroupedFlowRow {
    pub probe_protocol: u8,
    pub probe_src_addr: Ipv6Addr,
    pub probe_dst_prefix: Ipv6Addr,
    pub probe_dst_addr: Ipv6Addr,
    pub probe_src_port: u16,
    pub probe_dst_port: u16,
    pub replies: Vec<ReplyTuple>,
}

impl From<GroupedFlowRow> for GroupedFlow {
    fn from(row: GroupedFlowRow) -> Self {
        let flow = FlowId {
            probe_protocol: row.probe_protocol,
            probe_src_addr: row.probe_src_addr,
            probe_dst_addr: row.probe_dst_addr,
            probe_src_port: row.probe_src_port,
            probe_dst_port: row.probe_dst_port,
        };
        let replies = row
            .replies
            .into_iter()
            .map(
                |(probe_ttl, reply_src_addr, ts, reply_protocol, reply_icmp_type, reply_icmp_code, reply_size, rtt, round)| {
                    FlowReply {
                        probe_ttl,
                        reply_src_addr,
                        capture_timestamp: from_seconds(ts),
                        reply_protocol,
                        reply_icmp_type,
                        reply_icmp_code,
                        reply_size,
                        rtt,
                        round,
                    }
                },
            )
            .collect();
        // The store already sorted the replies; `new` keeps that order.
        let mut flow = GroupedFlow::new(flow, replies);
        flow.probe_dst_prefix = row.probe_dst_prefix;
        flow
    }
}

/// Row of the table statistics query
#[derive(Debug, Clone, Row, Deserialize)]
pub struct TableStatsRow {
    pub total_rows: u64,
    pub total_bytes: u64,
}
