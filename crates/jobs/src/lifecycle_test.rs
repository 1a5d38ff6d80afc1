use std::sync::Arc;

use mpat_protocol::{ProbeRecord, TableKind};
use mpat_store::memory::MemoryStore;
use mpat_store::test_utils::{RESULTS_TABLE, mapped, probe_record};
use mpat_store::{Store, TableInfo};

use super::*;

fn records(n: u16) -> Vec<ProbeRecord> {
    (1..=n)
        .map(|ttl| probe_record(24000, ttl as u8, mapped(10, 0, 0, ttl as u8)))
        .collect()
}

fn existing(rows: u64, kind: TableKind) -> TableInfo {
    TableInfo {
        table: "t".into(),
        exists: true,
        num_rows: rows,
        num_bytes: rows * 100,
        columns: kind.columns().iter().map(|c| c.name.to_string()).collect(),
    }
}

// =============================================================================
// decide
// =============================================================================

#[test]
fn test_decide_missing_table_is_created() {
    let missing = TableInfo::missing("t");
    assert_eq!(
        decide(&missing, TableKind::Results, Expectation::Rows(3), false),
        Decision::Recreate
    );
    assert_eq!(
        decide(&missing, TableKind::Routes, Expectation::Rebuild, false),
        Decision::Recreate
    );
}

#[test]
fn test_decide_coherent_table_is_skipped() {
    let dest = existing(3, TableKind::Results);
    assert_eq!(
        decide(&dest, TableKind::Results, Expectation::Rows(3), false),
        Decision::Skip
    );
}

#[test]
fn test_decide_derived_table_is_never_skipped() {
    let partial = existing(1, TableKind::Routes);
    assert_eq!(
        decide(&partial, TableKind::Routes, Expectation::Rebuild, false),
        Decision::Truncate
    );
}

#[test]
fn test_decide_stale_table_is_truncated() {
    let dest = existing(2, TableKind::Results);
    assert_eq!(
        decide(&dest, TableKind::Results, Expectation::Rows(3), false),
        Decision::Truncate
    );

    let empty = existing(0, TableKind::Routes);
    assert_eq!(
        decide(&empty, TableKind::Routes, Expectation::Rebuild, false),
        Decision::Truncate
    );
}

#[test]
fn test_decide_wrong_shape_is_recreated() {
    let dest = existing(2, TableKind::Routes);
    assert_eq!(
        decide(&dest, TableKind::Results, Expectation::Rows(3), false),
        Decision::Recreate
    );
}

#[test]
fn test_decide_force_always_recreates() {
    let dest = existing(3, TableKind::Results);
    assert_eq!(
        decide(&dest, TableKind::Results, Expectation::Rows(3), true),
        Decision::Recreate
    );
}

// =============================================================================
// prepare
// =============================================================================

fn lifecycle(store: &Arc<MemoryStore>) -> Lifecycle {
    Lifecycle::new(Arc::clone(store) as Arc<dyn Store>)
}

#[tokio::test]
async fn test_prepare_creates_missing_table() {
    let store = MemoryStore::shared();
    let decision = lifecycle(&store)
        .prepare(RESULTS_TABLE, TableKind::Results, Expectation::Rows(3), false)
        .await
        .unwrap();

    assert_eq!(decision, Decision::Recreate);
    assert!(store.exists(RESULTS_TABLE));
    assert_eq!(store.count(RESULTS_TABLE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_prepare_truncates_stale_table() {
    let store = MemoryStore::shared();
    store.seed(RESULTS_TABLE, TableKind::Results, &records(2)).unwrap();

    let decision = lifecycle(&store)
        .prepare(RESULTS_TABLE, TableKind::Results, Expectation::Rows(3), false)
        .await
        .unwrap();

    assert_eq!(decision, Decision::Truncate);
    assert_eq!(store.count(RESULTS_TABLE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_prepare_skips_coherent_table() {
    let store = MemoryStore::shared();
    store.seed(RESULTS_TABLE, TableKind::Results, &records(3)).unwrap();

    let decision = lifecycle(&store)
        .prepare(RESULTS_TABLE, TableKind::Results, Expectation::Rows(3), false)
        .await
        .unwrap();

    assert_eq!(decision, Decision::Skip);
    assert_eq!(store.count(RESULTS_TABLE).await.unwrap(), 3);
}

#[tokio::test]
async fn test_prepare_recreates_foreign_shape() {
    let store = MemoryStore::shared();
    store.seed_columns(RESULTS_TABLE, &["id", "payload"]);

    let decision = lifecycle(&store)
        .prepare(RESULTS_TABLE, TableKind::Results, Expectation::Rows(3), false)
        .await
        .unwrap();

    assert_eq!(decision, Decision::Recreate);
    let info = store.info(&[RESULTS_TABLE.to_string()]).await.unwrap();
    assert!(TableKind::Results.matches_columns(&info[0].columns));
}

#[tokio::test]
async fn test_prepare_is_idempotent() {
    let store = MemoryStore::shared();
    store.seed(RESULTS_TABLE, TableKind::Results, &records(5)).unwrap();
    let lifecycle = lifecycle(&store);

    let first = lifecycle
        .prepare(RESULTS_TABLE, TableKind::Results, Expectation::Rows(3), false)
        .await
        .unwrap();
    let after_first = store.info(&[RESULTS_TABLE.to_string()]).await.unwrap();

    let second = lifecycle
        .prepare(RESULTS_TABLE, TableKind::Results, Expectation::Rows(3), false)
        .await
        .unwrap();
    let after_second = store.info(&[RESULTS_TABLE.to_string()]).await.unwrap();

    assert_eq!(first, Decision::Truncate);
    assert_eq!(second, Decision::Truncate);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_prepare_empties_filled_derived_table() {
    let store = MemoryStore::shared();
    store.seed(RESULTS_TABLE, TableKind::Results, &records(2)).unwrap();

    let decision = lifecycle(&store)
        .prepare(RESULTS_TABLE, TableKind::Results, Expectation::Rebuild, false)
        .await
        .unwrap();

    assert_eq!(decision, Decision::Truncate);
    assert_eq!(store.count(RESULTS_TABLE).await.unwrap(), 0);
}
