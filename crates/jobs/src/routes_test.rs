use std::collections::BTreeSet;
use std::net::Ipv6Addr;

use mpat_protocol::{GroupedFlow, ProbeRecord};
use mpat_store::test_utils::{at, mapped, probe_record};

use super::*;

fn flow(records: &[ProbeRecord]) -> GroupedFlow {
    let mut flows = GroupedFlow::group(records);
    assert_eq!(flows.len(), 1, "fixture must hold a single flow");
    flows.remove(0)
}

fn triples(rows: &[RouteRow]) -> BTreeSet<(Ipv6Addr, Ipv6Addr, Ipv6Addr)> {
    rows.iter().map(RouteRow::key).collect()
}

fn a() -> Ipv6Addr {
    mapped(10, 0, 0, 1)
}

fn b() -> Ipv6Addr {
    mapped(10, 0, 0, 2)
}

fn c() -> Ipv6Addr {
    mapped(10, 0, 0, 3)
}

/// Prefix of the fixture destination 8.8.8.8
fn p() -> Ipv6Addr {
    mapped(8, 8, 8, 0)
}

#[test]
fn test_single_flow() {
    let flow = flow(&[
        probe_record(24000, 1, a()),
        probe_record(24000, 2, b()),
        probe_record(24000, 3, c()),
    ]);

    let rows = links(&flow);
    assert_eq!(rows.len(), 2);
    assert_eq!(
        triples(&rows),
        BTreeSet::from([(a(), p(), b()), (b(), p(), c())])
    );
}

#[test]
fn test_duplicate_replies_collapse() {
    let flow = flow(&[
        probe_record(24000, 1, a()),
        probe_record(24000, 1, a()),
        probe_record(24000, 2, b()),
    ]);

    let rows = links(&flow);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key(), (a(), p(), b()));
}

#[test]
fn test_first_capture_timestamp_is_kept() {
    let mut late = probe_record(24000, 1, a());
    late.capture_timestamp = at(50);
    late.rtt = 900;
    let mut early = probe_record(24000, 1, a());
    early.capture_timestamp = at(10);
    early.rtt = 300;

    let flow = flow(&[late, early, probe_record(24000, 2, b())]);
    let rows = links(&flow);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].first_capture_timestamp, at(10));
    assert_eq!(rows[0].rtt, 300);
}

#[test]
fn test_every_pair_of_adjacent_hops_is_linked() {
    let d = mapped(10, 0, 0, 4);
    let flow = flow(&[
        probe_record(24000, 1, a()),
        probe_record(24000, 2, b()),
        probe_record(24000, 2, c()),
        probe_record(24000, 3, d),
    ]);

    assert_eq!(
        triples(&links(&flow)),
        BTreeSet::from([
            (a(), p(), b()),
            (a(), p(), c()),
            (b(), p(), d),
            (c(), p(), d),
        ])
    );
}

#[test]
fn test_null_replies_break_links() {
    let flow = flow(&[
        probe_record(24000, 1, a()),
        probe_record(24000, 2, Ipv6Addr::UNSPECIFIED),
        probe_record(24000, 3, c()),
    ]);

    assert!(links(&flow).is_empty());
}

#[test]
fn test_destination_prefix_is_not_a_hop() {
    let flow = flow(&[
        probe_record(24000, 1, a()),
        probe_record(24000, 2, p()),
        probe_record(24000, 2, b()),
    ]);

    assert_eq!(triples(&links(&flow)), BTreeSet::from([(a(), p(), b())]));
}

#[test]
fn test_ttl_gap_yields_nothing() {
    let flow = flow(&[probe_record(24000, 1, a()), probe_record(24000, 3, c())]);
    assert!(links(&flow).is_empty());
}

#[test]
fn test_flow_metadata_is_carried() {
    let flow = flow(&[probe_record(24000, 1, a()), probe_record(24000, 2, b())]);
    let row = &links(&flow)[0];

    assert_eq!(row.probe_protocol, 1);
    assert_eq!(row.probe_src_port, 24000);
    assert_eq!(row.probe_dst_addr, mapped(8, 8, 8, 8));
    assert_eq!(row.first_capture_timestamp, at(1));
    assert_eq!(row.reply_icmp_type, 11);
    assert_eq!(row.time_exceeded_reply, 1);
}

#[test]
fn test_process_stage_extends_output() {
    let flow = flow(&[probe_record(24000, 1, a()), probe_record(24000, 2, b())]);
    let ctx = StageContext::standalone(mpat_pipeline::Stage::Process);

    let mut out = Vec::new();
    RoutesProcess.process(&ctx, flow, &mut out).unwrap();
    assert_eq!(out.len(), 1);
}
