//! Converter output formats
//!
//! The converter prints one JSON object per line:
//!
//! - `iris`: one object per flow, carrying the flow-id, the round and a
//!   `replies` array with one entry per TTL reply.
//! - `flat`: one object per reply with every base column.
//!
//! Addresses may be IPv4 or IPv6 text; IPv4 is stored IPv4-mapped.
//! Timestamps may be unix seconds or RFC 3339 text.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mpat_protocol::{MplsLabel, ProbeRecord, to_ipv6};
use serde::{Deserialize, Deserializer, Serialize};

/// Converter output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per flow
    #[default]
    Iris,
    /// One line per reply
    Flat,
}

impl OutputFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iris => "iris",
            Self::Flat => "flat",
        }
    }

    /// Parse one output line into zero or more records
    pub fn parse_line(self, line: &str) -> Result<Vec<ProbeRecord>, serde_json::Error> {
        match self {
            Self::Iris => {
                let flow: IrisFlow = serde_json::from_str(line)?;
                Ok(flow.into_records())
            }
            Self::Flat => {
                let reply: FlatReply = serde_json::from_str(line)?;
                Ok(vec![reply.into()])
            }
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iris" => Ok(Self::Iris),
            "flat" => Ok(Self::Flat),
            other => Err(format!("unknown converter format '{other}', expected iris or flat")),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct IrisFlow {
    probe_protocol: u8,
    probe_src_addr: IpAddr,
    probe_dst_addr: IpAddr,
    probe_src_port: u16,
    probe_dst_port: u16,
    #[serde(default)]
    round: u8,
    #[serde(default)]
    replies: Vec<IrisReply>,
}

#[derive(Debug, Deserialize)]
struct IrisReply {
    #[serde(deserialize_with = "timestamp")]
    capture_timestamp: DateTime<Utc>,
    probe_ttl: u8,
    quoted_ttl: u8,
    reply_src_addr: IpAddr,
    reply_protocol: u8,
    reply_icmp_type: u8,
    reply_icmp_code: u8,
    reply_ttl: u8,
    reply_size: u16,
    #[serde(default)]
    reply_mpls_labels: Vec<MplsLabel>,
    rtt: u16,
}

impl IrisFlow {
    fn into_records(self) -> Vec<ProbeRecord> {
        let probe_src_addr = to_ipv6(self.probe_src_addr);
        let probe_dst_addr = to_ipv6(self.probe_dst_addr);

        self.replies
            .into_iter()
            .map(|reply| ProbeRecord {
                capture_timestamp: reply.capture_timestamp,
                probe_protocol: self.probe_protocol,
                probe_src_addr,
                probe_dst_addr,
                probe_src_port: self.probe_src_port,
                probe_dst_port: self.probe_dst_port,
                probe_ttl: reply.probe_ttl,
                quoted_ttl: reply.quoted_ttl,
                reply_src_addr: to_ipv6(reply.reply_src_addr),
                reply_protocol: reply.reply_protocol,
                reply_icmp_type: reply.reply_icmp_type,
                reply_icmp_code: reply.reply_icmp_code,
                reply_ttl: reply.reply_ttl,
                reply_size: reply.reply_size,
                reply_mpls_labels: reply.reply_mpls_labels,
                rtt: reply.rtt,
                round: self.round,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct FlatReply {
    #[serde(deserialize_with = "timestamp")]
    capture_timestamp: DateTime<Utc>,
    probe_protocol: u8,
    probe_src_addr: IpAddr,
    probe_dst_addr: IpAddr,
    probe_src_port: u16,
    probe_dst_port: u16,
    probe_ttl: u8,
    quoted_ttl: u8,
    reply_src_addr: IpAddr,
    reply_protocol: u8,
    reply_icmp_type: u8,
    reply_icmp_code: u8,
    reply_ttl: u8,
    reply_size: u16,
    #[serde(default)]
    reply_mpls_labels: Vec<MplsLabel>,
    rtt: u16,
    #[serde(default)]
    round: u8,
}

impl From<FlatReply> for ProbeRecord {
    fn from(r: FlatReply) -> Self {
        Self {
            capture_timestamp: r.capture_timestamp,
            probe_protocol: r.probe_protocol,
            probe_src_addr: to_ipv6(r.probe_src_addr),
            probe_dst_addr: to_ipv6(r.probe_dst_addr),
            probe_src_port: r.probe_src_port,
            probe_dst_port: r.probe_dst_port,
            probe_ttl: r.probe_ttl,
            quoted_ttl: r.quoted_ttl,
            reply_src_addr: to_ipv6(r.reply_src_addr),
            reply_protocol: r.reply_protocol,
            reply_icmp_type: r.reply_icmp_type,
            reply_icmp_code: r.reply_icmp_code,
            reply_ttl: r.reply_ttl,
            reply_size: r.reply_size,
            reply_mpls_labels: r.reply_mpls_labels,
            rtt: r.rtt,
            round: r.round,
        }
    }
}

/// Unix seconds or RFC 3339
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Seconds(i64),
        Text(DateTime<Utc>),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Seconds(secs) => DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp {secs} out of range"))),
        Timestamp::Text(ts) => Ok(ts),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    const IRIS_LINE: &str = r#"{"probe_protocol":1,"probe_src_addr":"192.0.2.1","probe_dst_addr":"8.8.8.8","probe_src_port":24000,"probe_dst_port":0,"round":1,"replies":[{"capture_timestamp":1704067201,"probe_ttl":1,"quoted_ttl":1,"reply_src_addr":"10.0.0.1","reply_protocol":1,"reply_icmp_type":11,"reply_icmp_code":0,"reply_ttl":254,"reply_size":56,"reply_mpls_labels":[{"label":16,"exp":0,"bos":1,"ttl":1}],"rtt":12},{"capture_timestamp":"2024-01-01T00:00:02Z","probe_ttl":2,"quoted_ttl":1,"reply_src_addr":"2001:db8::1","reply_protocol":1,"reply_icmp_type":11,"reply_icmp_code":0,"reply_ttl":253,"reply_size":56,"rtt":20}]}"#;

    #[test]
    fn test_iris_line_enumerates_replies() {
        let records = OutputFormat::Iris.parse_line(IRIS_LINE).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.probe_dst_addr, Ipv4Addr::new(8, 8, 8, 8).to_ipv6_mapped());
        assert_eq!(first.reply_src_addr, Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped());
        assert_eq!(first.capture_timestamp.timestamp(), 1_704_067_201);
        assert_eq!(first.reply_mpls_labels.len(), 1);
        assert_eq!(first.round, 1);

        let second = &records[1];
        assert_eq!(second.probe_ttl, 2);
        assert_eq!(second.reply_src_addr, "2001:db8::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(second.capture_timestamp.timestamp(), 1_704_067_202);
        assert!(second.reply_mpls_labels.is_empty());
    }

    #[test]
    fn test_iris_flow_without_replies() {
        let line = r#"{"probe_protocol":17,"probe_src_addr":"::1","probe_dst_addr":"::2","probe_src_port":1,"probe_dst_port":2,"replies":[]}"#;
        assert!(OutputFormat::Iris.parse_line(line).unwrap().is_empty());
    }

    #[test]
    fn test_flat_line() {
        let line = r#"{"capture_timestamp":0,"probe_protocol":17,"probe_src_addr":"2001:db8::a","probe_dst_addr":"2001:db8::b","probe_src_port":24000,"probe_dst_port":33434,"probe_ttl":3,"quoted_ttl":1,"reply_src_addr":"2001:db8::c","reply_protocol":58,"reply_icmp_type":3,"reply_icmp_code":0,"reply_ttl":60,"reply_size":80,"rtt":5,"round":2}"#;
        let records = OutputFormat::Flat.parse_line(line).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].time_exceeded_reply());
        assert_eq!(records[0].round, 2);
    }

    #[test]
    fn test_malformed_lines() {
        assert!(OutputFormat::Iris.parse_line("not json").is_err());
        assert!(OutputFormat::Flat.parse_line(r#"{"probe_protocol":1}"#).is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("flat".parse::<OutputFormat>(), Ok(OutputFormat::Flat));
        assert!("json".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default().to_string(), "iris");
    }
}
