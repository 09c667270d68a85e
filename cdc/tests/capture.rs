use std::sync::Arc;
use std::time::Duration;

use cdc::builder::{MsSqlChangeBuilder, PostgresChangeBuilder, TracingDiagnostics};
use cdc::concurrency::shutdown::create_shutdown_channel;
use cdc::conversions::numeric::PgNumeric;
use cdc::decoding::{LogicalDecodingParser, NoTableMetadata};
use cdc::destination::memory::MemoryDestination;
use cdc::error::{CdcResult, ErrorKind};
use cdc::partition::partition_source_config;
use cdc::source::memory::MemoryRecordSource;
use cdc::test_utils::clock::FixedClock;
use cdc::test_utils::diagnostics::RecordingDiagnostics;
use cdc::test_utils::record::{records_from_lines, transaction_lines};
use cdc::test_utils::source::ChannelRecordSource;
use cdc::types::{
    Cell, ChangeEvent, ChangeTrackingRow, ChangeType, ColumnValue, LogicalDecodingRecord,
    LogicalType, LogicalTypeKind, PgLsn, SourcePosition,
};
use cdc::workers::base::CaptureStats;
use cdc::workers::capture::{CaptureExit, CaptureWorker};
use cdc::workers::pool::CaptureWorkerPool;
use cdc_config::shared::{DecodingDialect, SourceConfig};
use cdc_telemetry::tracing::init_test_tracing;

type TestBuilder =
    PostgresChangeBuilder<NoTableMetadata, Arc<FixedClock>, Arc<RecordingDiagnostics>>;

fn compact_builder(diagnostics: Arc<RecordingDiagnostics>) -> TestBuilder {
    PostgresChangeBuilder::new(
        "bank",
        "bank_slot",
        LogicalDecodingParser::new(DecodingDialect::Compact, NoTableMetadata),
        Arc::new(FixedClock::new(1_700_000_000_000)),
        diagnostics,
    )
}

fn source_config(tables: &[&str], worker_count: u16) -> SourceConfig {
    serde_json::from_value(serde_json::json!({
        "database_name": "bank",
        "slot_name": "bank_slot",
        "dialect": "compact",
        "tables": tables,
        "worker_count": worker_count,
        "connection": {"host": "localhost", "port": 5432, "name": "bank", "username": "capture"}
    }))
    .unwrap()
}

fn change_tracking_row(table_name: &str, change_version: i64, id: i64) -> ChangeTrackingRow {
    let id = ColumnValue::new(
        "id",
        LogicalType::optional(LogicalTypeKind::Int64),
        Cell::I64(id),
    );
    ChangeTrackingRow {
        schema_name: "dbo".to_owned(),
        table_name: table_name.to_owned(),
        change_version,
        operation: "I".to_owned(),
        key_columns: vec![id.clone()],
        value_columns: vec![id],
    }
}

async fn panicking_worker() -> CdcResult<(CaptureExit, CaptureStats)> {
    panic!("worker blew up")
}

#[tokio::test(flavor = "multi_thread")]
async fn transaction_is_captured_and_committed_in_order() {
    init_test_tracing();

    let lines = transaction_lines(
        501,
        &[
            "public.accounts INSERT id[int4]:5, balance[numeric]:100.00",
            "public.accounts UPDATE id[int4]:5, balance[numeric]:80.00",
            "public.accounts DELETE id[int4]:5",
        ],
    );
    let records = records_from_lines(0x100, 501, lines.iter().map(String::as_str));
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let destination = MemoryDestination::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        MemoryRecordSource::new(records.clone()),
        compact_builder(diagnostics.clone()),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    );
    let (exit, stats) = worker.run().await.unwrap();

    assert_eq!(exit, CaptureExit::SourceExhausted);
    assert_eq!(stats.records_read, 5);
    assert_eq!(stats.changes_written, 3);
    assert_eq!(stats.records_skipped, 2);
    assert_eq!(stats.last_committed, Some(SourcePosition::Lsn(records[3].location)));

    let changes = destination.changes().await;
    let change_types = changes.iter().map(|c| c.change_type()).collect::<Vec<_>>();
    assert_eq!(
        change_types,
        vec![ChangeType::Insert, ChangeType::Update, ChangeType::Delete]
    );

    let insert = &changes[0];
    assert_eq!(insert.schema_name(), "public");
    assert_eq!(insert.table_name(), "accounts");
    let values = insert.value_columns();
    assert_eq!(values[0].column_name(), "id");
    assert_eq!(values[0].logical_type().kind, LogicalTypeKind::Int32);
    assert_eq!(values[0].value(), &Cell::I32(5));
    assert_eq!(values[1].column_name(), "balance");
    assert_eq!(values[1].logical_type().kind, LogicalTypeKind::Decimal);
    assert_eq!(
        values[1].value(),
        &Cell::Numeric("100.00".parse::<PgNumeric>().unwrap())
    );

    let delete = &changes[2];
    assert!(delete.value_columns().is_empty());
    assert_eq!(delete.key_columns()[0].value(), &Cell::I32(5));

    // Only emitted changes are committed, the markers are skipped.
    let commits = destination.commits().await;
    assert_eq!(commits.len(), 3);
    assert!(commits.windows(2).all(|pair| pair[0].0 < pair[1].0));
    assert_eq!(commits[0].1["location"], serde_json::json!("0/108"));

    assert_eq!(diagnostics.count(cdc::builder::DiagnosticLevel::Debug), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn position_behind_last_commit_aborts_worker() {
    init_test_tracing();

    let records = vec![LogicalDecodingRecord::new(
        PgLsn::from(0x50),
        7,
        "public.accounts INSERT id[int4]:1",
    )];
    let destination = MemoryDestination::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        MemoryRecordSource::new(records),
        compact_builder(Arc::default()),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    )
    .with_last_committed(SourcePosition::Lsn(PgLsn::from(0x80)));

    let err = worker.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OffsetOrderViolation);
    assert!(destination.changes().await.is_empty());
    assert!(destination.commits().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_position_aborts_worker() {
    init_test_tracing();

    let record =
        LogicalDecodingRecord::new(PgLsn::from(0x50), 7, "public.accounts INSERT id[int4]:1");
    let destination = MemoryDestination::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        MemoryRecordSource::new([record.clone(), record]),
        compact_builder(Arc::default()),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    );

    let err = worker.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OffsetOrderViolation);
    assert_eq!(destination.changes().await.len(), 1);
    assert_eq!(destination.commits().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn parse_error_aborts_worker_without_commit() {
    init_test_tracing();

    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let records = records_from_lines(
        0x10,
        3,
        [
            "public.accounts INSERT id[int4]:1",
            "public.accounts INSERT id[int4]:not-a-number",
            "public.accounts INSERT id[int4]:3",
        ],
    );
    let destination = MemoryDestination::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        MemoryRecordSource::new(records.clone()),
        compact_builder(diagnostics.clone()),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    );

    let err = worker.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert_eq!(
        destination.last_committed().await,
        Some(SourcePosition::Lsn(records[0].location))
    );
    let reports = diagnostics.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].position, SourcePosition::Lsn(records[1].location));
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_idle_worker() {
    init_test_tracing();

    let (record_tx, source) = ChannelRecordSource::new();
    let destination = MemoryDestination::new();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        source,
        compact_builder(Arc::default()),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    );
    let handle = tokio::spawn(worker.run());

    record_tx
        .send(LogicalDecodingRecord::new(
            PgLsn::from(0x20),
            9,
            "public.accounts INSERT id[int4]:1",
        ))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        while destination.commits().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(()).unwrap();
    let (exit, stats) = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(exit, CaptureExit::Shutdown);
    assert_eq!(stats.changes_written, 1);
    assert_eq!(stats.last_committed, Some(SourcePosition::Lsn(PgLsn::from(0x20))));
}

#[tokio::test(flavor = "multi_thread")]
async fn pool_workers_capture_disjoint_tables() {
    init_test_tracing();

    let config = source_config(&["public.a", "public.b", "public.c"], 2);
    let worker_configs = partition_source_config(&config).unwrap();
    assert_eq!(worker_configs.len(), 2);

    let records = records_from_lines(
        0x1000,
        11,
        [
            "public.a INSERT id[int4]:1",
            "public.b INSERT id[int4]:2",
            "public.c INSERT id[int4]:3",
            "public.d INSERT id[int4]:4",
            "public.a UPDATE id[int4]:1",
        ],
    );

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let destinations = worker_configs
        .iter()
        .map(|_| MemoryDestination::new())
        .collect::<Vec<_>>();

    let mut pool = CaptureWorkerPool::new();
    for (worker_id, (worker_config, destination)) in
        worker_configs.iter().zip(&destinations).enumerate()
    {
        let builder = PostgresChangeBuilder::from_config(worker_config, NoTableMetadata).unwrap();
        let worker = CaptureWorker::new(
            worker_id,
            MemoryRecordSource::new(records.clone()),
            builder,
            destination.clone(),
            destination.clone(),
            shutdown_rx.clone(),
        );
        pool.spawn(worker_id, worker.run());
    }
    assert_eq!(pool.len(), 2);

    let stats = pool.wait_all().await.unwrap();
    assert_eq!(stats[&0].changes_written, 3);
    assert_eq!(stats[&1].changes_written, 1);

    let first = destinations[0].changes().await;
    assert!(first.iter().all(|c| c.table_name() == "a" || c.table_name() == "b"));
    assert!(first.iter().all(|c| c.source_partition()["slot"] == "bank_slot_0"));

    let second = destinations[1].changes().await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].table_name(), "c");
    assert_eq!(second[0].source_partition()["slot"], "bank_slot_1");
}

#[tokio::test(flavor = "multi_thread")]
async fn pool_reports_every_failed_worker() {
    init_test_tracing();

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let mut pool = CaptureWorkerPool::new();

    for worker_id in 0..2 {
        let destination = MemoryDestination::new();
        let worker = CaptureWorker::new(
            worker_id,
            MemoryRecordSource::new(records_from_lines(0x10, 1, ["public.a INSERT"])),
            compact_builder(Arc::default()),
            destination.clone(),
            destination,
            shutdown_rx.clone(),
        );
        pool.spawn(worker_id, worker.run());
    }
    pool.spawn(2, panicking_worker());

    let err = pool.wait_all().await.unwrap_err();
    let mut kinds = err.kinds();
    kinds.sort_by_key(|kind| format!("{kind:?}"));

    assert_eq!(
        kinds,
        vec![
            ErrorKind::CaptureWorkerPanic,
            ErrorKind::ParseError,
            ErrorKind::ParseError
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn change_tracking_rows_sharing_a_version_are_all_committed() {
    init_test_tracing();

    // Two rows of one transaction on `orders`, then an older version of another table.
    let rows = vec![
        change_tracking_row("orders", 120, 1),
        change_tracking_row("orders", 120, 2),
        change_tracking_row("customers", 118, 7),
        change_tracking_row("orders", 121, 3),
    ];
    let destination = MemoryDestination::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        MemoryRecordSource::new(rows),
        MsSqlChangeBuilder::new("sales", Arc::new(FixedClock::new(7)), TracingDiagnostics),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    );
    let (exit, stats) = worker.run().await.unwrap();

    assert_eq!(exit, CaptureExit::SourceExhausted);
    assert_eq!(stats.changes_written, 4);
    assert_eq!(stats.last_committed, Some(SourcePosition::ChangeVersion(121)));

    let committed_versions = destination
        .commits()
        .await
        .into_iter()
        .map(|(_, offset)| offset["sys_change_version"].clone())
        .collect::<Vec<_>>();
    assert_eq!(
        committed_versions,
        vec![
            serde_json::json!(120),
            serde_json::json!(120),
            serde_json::json!(118),
            serde_json::json!(121)
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn change_version_going_back_within_a_table_aborts_worker() {
    init_test_tracing();

    let rows = vec![
        change_tracking_row("orders", 120, 1),
        change_tracking_row("customers", 125, 7),
        change_tracking_row("orders", 119, 2),
    ];
    let destination = MemoryDestination::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        MemoryRecordSource::new(rows),
        MsSqlChangeBuilder::new("sales", Arc::new(FixedClock::new(7)), TracingDiagnostics),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    );
    let err = worker.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OffsetOrderViolation);
    assert_eq!(destination.changes().await.len(), 2);
    assert_eq!(
        destination.last_committed().await,
        Some(SourcePosition::ChangeVersion(125))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn resumed_change_tracking_worker_accepts_the_resumed_version() {
    init_test_tracing();

    let rows = vec![
        change_tracking_row("orders", 118, 2),
        change_tracking_row("orders", 119, 3),
    ];
    let destination = MemoryDestination::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        MemoryRecordSource::new(rows),
        MsSqlChangeBuilder::new("sales", Arc::new(FixedClock::new(7)), TracingDiagnostics),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    )
    .with_last_committed(SourcePosition::ChangeVersion(118));

    let (_, stats) = worker.run().await.unwrap();

    assert_eq!(stats.changes_written, 2);
    assert_eq!(
        destination.last_committed().await,
        Some(SourcePosition::ChangeVersion(119))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn resumed_change_tracking_worker_rejects_older_versions_of_any_table() {
    init_test_tracing();

    let rows = vec![change_tracking_row("customers", 117, 1)];
    let destination = MemoryDestination::new();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let worker = CaptureWorker::new(
        0,
        MemoryRecordSource::new(rows),
        MsSqlChangeBuilder::new("sales", Arc::new(FixedClock::new(7)), TracingDiagnostics),
        destination.clone(),
        destination.clone(),
        shutdown_rx,
    )
    .with_last_committed(SourcePosition::ChangeVersion(118));

    let err = worker.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OffsetOrderViolation);
    assert!(destination.commits().await.is_empty());
}
