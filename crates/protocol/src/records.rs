//! Row types
//!
//! `ProbeRecord` is one raw reply as stored in a results table. The derived
//! accessors compute the same values as the materialized columns of the
//! results DDL; they are never written.
//!
//! `GroupedFlow` is one row of the grouped select: a flow-id with its replies
//! sorted by `probe_ttl`. `RouteRow` and `ForwardingDecisionRow` are the rows
//! written by the derivation pipelines.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::addr::{PROTOCOL_ICMP, PROTOCOL_ICMPV6, PROTOCOL_UDP, is_reserved, prefix_of};

// =============================================================================
// MPLS
// =============================================================================

/// One MPLS label stack entry, stored as `Tuple(UInt32, UInt8, UInt8, UInt8)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MplsLabel {
    pub label: u32,
    pub exp: u8,
    pub bos: u8,
    pub ttl: u8,
}

impl From<(u32, u8, u8, u8)> for MplsLabel {
    fn from((label, exp, bos, ttl): (u32, u8, u8, u8)) -> Self {
        Self { label, exp, bos, ttl }
    }
}

impl From<MplsLabel> for (u32, u8, u8, u8) {
    fn from(l: MplsLabel) -> Self {
        (l.label, l.exp, l.bos, l.ttl)
    }
}

// =============================================================================
// Flow id
// =============================================================================

/// (probe_protocol, probe_src_addr, probe_dst_addr, probe_src_port, probe_dst_port)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId {
    pub probe_protocol: u8,
    pub probe_src_addr: Ipv6Addr,
    pub probe_dst_addr: Ipv6Addr,
    pub probe_src_port: u16,
    pub probe_dst_port: u16,
}

impl FlowId {
    /// `/64` (IPv6) or `/24` (IPv4) of the destination
    #[inline]
    pub fn dst_prefix(&self) -> Ipv6Addr {
        prefix_of(self.probe_dst_addr)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:[{}]:{}->[{}]:{}",
            self.probe_protocol,
            self.probe_src_addr,
            self.probe_src_port,
            self.probe_dst_addr,
            self.probe_dst_port
        )
    }
}

// =============================================================================
// Probe record
// =============================================================================

/// One reply row of a results table (base columns only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub capture_timestamp: DateTime<Utc>,
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
    #[serde(default)]
    pub reply_mpls_labels: Vec<MplsLabel>,
    pub rtt: u16,
    pub round: u8,
}

impl ProbeRecord {
    pub fn flow_id(&self) -> FlowId {
        FlowId {
            probe_protocol: self.probe_protocol,
            probe_src_addr: self.probe_src_addr,
            probe_dst_addr: self.probe_dst_addr,
            probe_src_port: self.probe_src_port,
            probe_dst_port: self.probe_dst_port,
        }
    }

    /// Materialized `probe_dst_prefix`
    #[inline]
    pub fn probe_dst_prefix(&self) -> Ipv6Addr {
        prefix_of(self.probe_dst_addr)
    }

    /// Materialized `reply_src_prefix`. Derived from `probe_dst_addr`, as
    /// the results DDL defines it.
    #[inline]
    pub fn reply_src_prefix(&self) -> Ipv6Addr {
        prefix_of(self.probe_dst_addr)
    }

    #[inline]
    pub fn private_probe_dst_prefix(&self) -> bool {
        is_reserved(self.probe_dst_prefix())
    }

    #[inline]
    pub fn private_reply_src_addr(&self) -> bool {
        is_reserved(self.reply_src_addr)
    }

    #[inline]
    pub fn destination_host_reply(&self) -> bool {
        self.probe_dst_addr == self.reply_src_addr
    }

    #[inline]
    pub fn destination_prefix_reply(&self) -> bool {
        self.probe_dst_prefix() == self.reply_src_prefix()
    }

    #[inline]
    pub fn valid_probe_protocol(&self) -> bool {
        matches!(
            self.probe_protocol,
            PROTOCOL_ICMP | PROTOCOL_UDP | PROTOCOL_ICMPV6
        )
    }

    #[inline]
    pub fn time_exceeded_reply(&self) -> bool {
        time_exceeded(self.reply_protocol, self.reply_icmp_type)
    }

    fn flow_reply(&self) -> FlowReply {
        FlowReply {
            probe_ttl: self.probe_ttl,
            reply_src_addr: self.reply_src_addr,
            capture_timestamp: self.capture_timestamp,
            reply_protocol: self.reply_protocol,
            reply_icmp_type: self.reply_icmp_type,
            reply_icmp_code: self.reply_icmp_code,
            reply_size: self.reply_size,
            rtt: self.rtt,
            round: self.round,
        }
    }
}

/// ICMP time exceeded (type 11) or ICMPv6 time exceeded (type 3)
#[inline]
pub fn time_exceeded(reply_protocol: u8, reply_icmp_type: u8) -> bool {
    (reply_protocol == PROTOCOL_ICMP && reply_icmp_type == 11)
        || (reply_protocol == PROTOCOL_ICMPV6 && reply_icmp_type == 3)
}

// =============================================================================
// Grouped flow
// =============================================================================

/// One element of a grouped flow's reply array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReply {
    pub probe_ttl: u8,
    pub reply_src_addr: Ipv6Addr,
    pub capture_timestamp: DateTime<Utc>,
    pub reply_protocol: u8,
    pub reply_icmp_type: u8,
    pub reply_icmp_code: u8,
    pub reply_size: u16,
    pub rtt: u16,
    pub round: u8,
}

impl FlowReply {
    #[inline]
    pub fn time_exceeded_reply(&self) -> bool {
        time_exceeded(self.reply_protocol, self.reply_icmp_type)
    }
}

/// All replies of one flow, sorted by `probe_ttl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedFlow {
    pub flow: FlowId,
    pub probe_dst_prefix: Ipv6Addr,
    pub replies: Vec<FlowReply>,
}

impl GroupedFlow {
    /// Build a flow, sorting replies by TTL. The sort is stable, so replies
    /// at the same TTL keep their input order.
    pub fn new(flow: FlowId, mut replies: Vec<FlowReply>) -> Self {
        replies.sort_by_key(|r| r.probe_ttl);
        Self {
            probe_dst_prefix: flow.dst_prefix(),
            flow,
            replies,
        }
    }

    /// Group raw records by flow-id, in flow-id order
    pub fn group(records: &[ProbeRecord]) -> Vec<Self> {
        let mut flows: BTreeMap<FlowId, Vec<FlowReply>> = BTreeMap::new();
        for record in records {
            flows
                .entry(record.flow_id())
                .or_default()
                .push(record.flow_reply());
        }
        flows
            .into_iter()
            .map(|(flow, replies)| Self::new(flow, replies))
            .collect()
    }
}

// =============================================================================
// Derived rows
// =============================================================================

/// One link of a routes table. Key: (ip_addr, dst_prefix, next_addr)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRow {
    pub ip_addr: Ipv6Addr,
    pub dst_prefix: Ipv6Addr,
    pub next_addr: Ipv6Addr,
    pub first_capture_timestamp: DateTime<Utc>,
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

impl RouteRow {
    #[inline]
    pub fn key(&self) -> (Ipv6Addr, Ipv6Addr, Ipv6Addr) {
        (self.ip_addr, self.dst_prefix, self.next_addr)
    }
}

/// One near/far hop pair. Key: (probe_dst_prefix, near_addr, far_addr)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingDecisionRow {
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

impl ForwardingDecisionRow {
    #[inline]
    pub fn key(&self) -> (Ipv6Addr, Ipv6Addr, Ipv6Addr) {
        (self.probe_dst_prefix, self.near_addr, self.far_addr)
    }
}
