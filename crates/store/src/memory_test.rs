use futures_util::TryStreamExt;
use mpat_protocol::{ProbeRecord, TableKind};

use crate::memory::{MemoryStore, Op};
use crate::test_utils::{RESULTS_TABLE, mapped, probe_record};
use crate::{Chunk, Store, StoreError};

fn three_records() -> Vec<ProbeRecord> {
    vec![
        probe_record(24000, 1, mapped(1, 1, 1, 1)),
        probe_record(24000, 2, mapped(2, 2, 2, 2)),
        probe_record(24000, 3, mapped(3, 3, 3, 3)),
    ]
}

#[tokio::test]
async fn test_info_reports_missing_and_existing() {
    let store = MemoryStore::new();
    store.seed(RESULTS_TABLE, TableKind::Results, &three_records()).unwrap();

    let info = store
        .info(&[RESULTS_TABLE.to_string(), "nope".to_string()])
        .await
        .unwrap();
    assert!(info[0].exists);
    assert_eq!(info[0].num_rows, 3);
    assert!(info[0].num_bytes > 0);
    assert!(TableKind::Results.matches_columns(&info[0].columns));
    assert!(!info[1].exists);
    assert_eq!(info[1].num_rows, 0);
}

#[tokio::test]
async fn test_chunk_stream_round_trips_between_stores() {
    let source = MemoryStore::new();
    source.seed(RESULTS_TABLE, TableKind::Results, &three_records()).unwrap();
    let dest = MemoryStore::new();
    dest.create_table(RESULTS_TABLE, TableKind::Results).await.unwrap();

    for chunk in Chunk::plan(RESULTS_TABLE, 3, 2) {
        let body = source.download_chunk(&chunk).await.unwrap();
        dest.upload_native(RESULTS_TABLE, body).await.unwrap();
    }

    assert_eq!(dest.count(RESULTS_TABLE).await.unwrap(), 3);
    assert_eq!(dest.rows::<ProbeRecord>(RESULTS_TABLE).unwrap(), three_records());
    assert_eq!(
        source.downloaded_chunks(),
        vec![(RESULTS_TABLE.to_string(), 0), (RESULTS_TABLE.to_string(), 2)]
    );
    assert_eq!(dest.completed_uploads(), 2);
}

#[tokio::test]
async fn test_create_is_idempotent_and_truncate_keeps_table() {
    let store = MemoryStore::new();
    store.seed(RESULTS_TABLE, TableKind::Results, &three_records()).unwrap();

    store.create_table(RESULTS_TABLE, TableKind::Results).await.unwrap();
    assert_eq!(store.count(RESULTS_TABLE).await.unwrap(), 3);

    store.truncate_table(RESULTS_TABLE).await.unwrap();
    assert!(store.exists(RESULTS_TABLE));
    assert_eq!(store.count(RESULTS_TABLE).await.unwrap(), 0);

    store.drop_table(RESULTS_TABLE).await.unwrap();
    store.drop_table(RESULTS_TABLE).await.unwrap();
    assert!(!store.exists(RESULTS_TABLE));
    assert!(matches!(
        store.count(RESULTS_TABLE).await,
        Err(StoreError::TableNotFound(_))
    ));
}

#[tokio::test]
async fn test_injected_failures_are_transient_and_consumed() {
    let store = MemoryStore::new();
    store.seed(RESULTS_TABLE, TableKind::Results, &three_records()).unwrap();
    store.fail_next(Op::Download, 1);

    let chunk = Chunk {
        table: RESULTS_TABLE.into(),
        offset: 0,
        limit: 10,
    };
    let err = store.download_chunk(&chunk).await.err().unwrap();
    assert!(mpat_protocol::Classify::is_retryable(&err));
    assert!(store.download_chunk(&chunk).await.is_ok());
}

#[tokio::test]
async fn test_committed_upload_failure_keeps_rows() {
    let source = MemoryStore::new();
    source.seed(RESULTS_TABLE, TableKind::Results, &three_records()).unwrap();
    let dest = MemoryStore::new();
    dest.create_table(RESULTS_TABLE, TableKind::Results).await.unwrap();
    dest.fail_next(Op::UploadCommitted, 1);

    let chunk = Chunk {
        table: RESULTS_TABLE.into(),
        offset: 0,
        limit: 10,
    };
    let body = source.download_chunk(&chunk).await.unwrap();
    let err = dest.upload_native(RESULTS_TABLE, body).await.unwrap_err();

    assert!(mpat_protocol::Classify::is_retryable(&err));
    assert_eq!(dest.count(RESULTS_TABLE).await.unwrap(), 3);
    assert_eq!(dest.completed_uploads(), 0);
}

#[tokio::test]
async fn test_grouped_flows_over_union() {
    let store = MemoryStore::new();
    store.seed("t1", TableKind::Results, &three_records()).unwrap();
    store
        .seed("t2", TableKind::Results, &[probe_record(24001, 1, mapped(9, 9, 9, 9))])
        .unwrap();

    let flows: Vec<_> = store
        .grouped_flows(&["t1".to_string(), "t2".to_string()])
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0].replies.len(), 3);
    assert_eq!(flows[1].flow.probe_src_port, 24001);
}

#[tokio::test]
async fn test_insert_into_missing_table_fails() {
    let store = MemoryStore::new();
    let err = store
        .insert_records("missing", &three_records())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TableNotFound(_)));
}
