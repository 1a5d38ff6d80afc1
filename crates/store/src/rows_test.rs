use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{TimeZone, Utc};
use mpat_protocol::{GroupedFlow, MplsLabel, ProbeRecord};

use crate::rows::{GroupedFlowRow, ResultsRow, from_seconds, to_seconds};

fn mapped(a: u8, b: u8, c: u8, d: u8) -> Ipv6Addr {
    Ipv4Addr::new(a, b, c, d).to_ipv6_mapped()
}

#[test]
fn test_seconds_conversion() {
    let ts = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
    assert_eq!(to_seconds(ts), 1_706_702_400);
    assert_eq!(from_seconds(1_706_702_400), ts);

    let before_epoch = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(to_seconds(before_epoch), 0);
}

#[test]
fn test_results_row_carries_mpls_labels_as_tuples() {
    let record = ProbeRecord {
        capture_timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap(),
        probe_protocol: 17,
        probe_src_addr: mapped(192, 0, 2, 1),
        probe_dst_addr: mapped(8, 8, 8, 8),
        probe_src_port: 24000,
        probe_dst_port: 33434,
        probe_ttl: 5,
        quoted_ttl: 1,
        reply_src_addr: mapped(10, 0, 0, 1),
        reply_protocol: 1,
        reply_icmp_type: 11,
        reply_icmp_code: 0,
        reply_ttl: 250,
        reply_size: 56,
        reply_mpls_labels: vec![MplsLabel {
            label: 24001,
            exp: 0,
            bos: 1,
            ttl: 254,
        }],
        rtt: 1230,
        round: 2,
    };

    let row = ResultsRow::from(&record);
    assert_eq!(row.reply_mpls_labels, vec![(24001, 0, 1, 254)]);
    assert_eq!(ProbeRecord::from(row), record);
}

#[test]
fn test_grouped_row_keeps_store_prefix_and_order() {
    let row = GroupedFlowRow {
        probe_protocol: 1,
        probe_src_addr: mapped(192, 0, 2, 1),
        probe_dst_prefix: mapped(8, 8, 8, 0),
        probe_dst_addr: mapped(8, 8, 8, 8),
        probe_src_port: 24000,
        probe_dst_port: 0,
        replies: vec![
            (1, mapped(1, 1, 1, 1), 10, 1, 11, 0, 56, 100, 1),
            (2, mapped(2, 2, 2, 2), 11, 1, 11, 0, 56, 200, 1),
        ],
    };

    let flow = GroupedFlow::from(row);
    assert_eq!(flow.probe_dst_prefix, mapped(8, 8, 8, 0));
    assert_eq!(flow.flow.probe_dst_addr, mapped(8, 8, 8, 8));
    assert_eq!(flow.replies.len(), 2);
    assert_eq!(flow.replies[0].reply_src_addr, mapped(1, 1, 1, 1));
    assert_eq!(flow.replies[1].capture_timestamp, from_seconds(11));
    assert!(flow.replies[1].time_exceeded_reply());
}
