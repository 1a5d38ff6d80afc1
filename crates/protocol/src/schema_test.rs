//! Tests for the column registry

use crate::schema::{Derivation, RESULTS_COLUMNS, TableKind};

#[test]
fn test_results_insert_columns_exclude_materialized() {
    let columns: Vec<&str> = TableKind::Results.insert_columns().collect();
    assert_eq!(columns.len(), 17);
    assert_eq!(columns.first(), Some(&"capture_timestamp"));
    assert_eq!(columns.last(), Some(&"round"));
    assert!(!columns.contains(&"probe_dst_prefix"));
    assert!(!columns.contains(&"time_exceeded_reply"));
}

#[test]
fn test_results_materialized_columns() {
    let materialized: Vec<&str> = RESULTS_COLUMNS
        .iter()
        .filter(|c| !c.insertable())
        .map(|c| c.name)
        .collect();
    assert_eq!(
        materialized,
        vec![
            "probe_dst_prefix",
            "reply_src_prefix",
            "private_probe_dst_prefix",
            "private_reply_src_addr",
            "destination_host_reply",
            "destination_prefix_reply",
            "valid_probe_protocol",
            "time_exceeded_reply",
        ]
    );
}

#[test]
fn test_reply_src_prefix_derives_from_probe_dst_addr() {
    let column = RESULTS_COLUMNS
        .iter()
        .find(|c| c.name == "reply_src_prefix")
        .unwrap();
    assert_eq!(
        column.derivation,
        Derivation::Expr("toIPv6(cutIPv6(probe_dst_addr, 8, 1))")
    );
}

#[test]
fn test_routes_and_decisions_are_all_insertable() {
    assert!(TableKind::Routes.columns().iter().all(|c| c.insertable()));
    assert!(
        TableKind::ForwardingDecisions
            .columns()
            .iter()
            .all(|c| c.insertable())
    );
    assert_eq!(
        TableKind::Routes.primary_key(),
        Some(&["ip_addr", "dst_prefix", "next_addr"][..])
    );
}

#[test]
fn test_matches_columns() {
    let names: Vec<String> = TableKind::Routes
        .columns()
        .iter()
        .map(|c| c.name.to_string())
        .collect();
    assert!(TableKind::Routes.matches_columns(&names));
    assert!(!TableKind::Results.matches_columns(&names));
    assert!(!TableKind::Routes.matches_columns(&names[1..]));

    let mut reordered = names.clone();
    reordered.swap(0, 1);
    assert!(!TableKind::Routes.matches_columns(&reordered));
}

#[test]
fn test_total_order_extends_sort_key_without_duplicates() {
    for kind in [
        TableKind::Results,
        TableKind::Routes,
        TableKind::ForwardingDecisions,
    ] {
        let order = kind.total_order();
        assert!(order.starts_with(kind.order_by()));
        let mut deduped = order.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), order.len(), "{kind}: {order:?}");
        assert!(kind.insert_columns().all(|c| order.contains(&c)));
    }
    assert_eq!(
        TableKind::Routes.total_order()[..4],
        ["ip_addr", "dst_prefix", "next_addr", "first_capture_timestamp"]
    );
}
