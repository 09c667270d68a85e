use std::sync::Arc;

use cdc::builder::{ChangeBuilder, DiagnosticLevel, MsSqlChangeBuilder, PostgresChangeBuilder};
use cdc::decoding::{
    LogicalDecodingParser, NoTableMetadata, StaticTableMetadata, TableMetadata, quote_identifier,
    quote_literal,
};
use cdc::error::ErrorKind;
use cdc::test_utils::clock::FixedClock;
use cdc::test_utils::diagnostics::RecordingDiagnostics;
use cdc::types::{
    Cell, ChangeEvent, ChangeTrackingRow, ChangeType, ColumnValue, LogicalDecodingRecord,
    LogicalType, LogicalTypeKind, PgLsn, SourcePosition, TableRef,
};
use cdc_config::shared::DecodingDialect;
use cdc_telemetry::tracing::init_test_tracing;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const QUOTING_ALPHABET: &[char] = &['a', 'Z', '0', ' ', ',', ':', '\'', '"', '[', ']', '.', 'é'];

fn random_text(rng: &mut StdRng, alphabet: &[char], max_len: usize) -> String {
    let len = rng.gen_range(0..=max_len);
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

fn recording_builder(
    dialect: DecodingDialect,
    metadata: StaticTableMetadata,
) -> (
    PostgresChangeBuilder<StaticTableMetadata, Arc<FixedClock>, Arc<RecordingDiagnostics>>,
    Arc<RecordingDiagnostics>,
) {
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let builder = PostgresChangeBuilder::new(
        "shop",
        "shop_slot",
        LogicalDecodingParser::new(dialect, metadata),
        Arc::new(FixedClock::new(42)),
        diagnostics.clone(),
    );

    (builder, diagnostics)
}

#[test]
fn quoted_values_round_trip_through_the_parser() {
    init_test_tracing();

    let parser = LogicalDecodingParser::new(DecodingDialect::Compact, NoTableMetadata);
    let mut rng = StdRng::seed_from_u64(1234);

    for _ in 0..500 {
        let text = random_text(&mut rng, QUOTING_ALPHABET, 24);
        let record = format!("public.notes INSERT body[text]:{}", quote_literal(&text));

        let draft = parser.parse_change(&record).unwrap().unwrap();

        assert_eq!(draft.value_columns[0].value(), &Cell::String(text));
    }
}

#[test]
fn quoted_identifiers_round_trip_through_the_parser() {
    init_test_tracing();

    let parser = LogicalDecodingParser::new(DecodingDialect::TestDecoding, NoTableMetadata);
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..500 {
        let schema = format!("s{}", random_text(&mut rng, QUOTING_ALPHABET, 12));
        let table = format!("t{}", random_text(&mut rng, QUOTING_ALPHABET, 12));
        let column = format!("c{}", random_text(&mut rng, QUOTING_ALPHABET, 12));
        let record = format!(
            "table {}.{}: INSERT: {}[integer]:1",
            quote_identifier(&schema),
            quote_identifier(&table),
            quote_identifier(&column)
        );

        let draft = parser.parse_change(&record).unwrap().unwrap();

        assert_eq!(draft.schema_name, schema);
        assert_eq!(draft.table_name, table);
        assert_eq!(draft.value_columns[0].column_name(), column);
    }
}

#[test]
fn begin_marker_builds_nothing() {
    init_test_tracing();

    let (builder, diagnostics) =
        recording_builder(DecodingDialect::Compact, StaticTableMetadata::new());
    let record = LogicalDecodingRecord::new(PgLsn::from(0x501), 501, "BEGIN 501");

    assert_eq!(builder.build(&record).unwrap(), None);
    assert_eq!(diagnostics.levels(), vec![DiagnosticLevel::Debug]);
}

#[test]
fn control_markers_never_fail_in_either_dialect() {
    init_test_tracing();

    for dialect in [DecodingDialect::Compact, DecodingDialect::TestDecoding] {
        let (builder, diagnostics) = recording_builder(dialect, StaticTableMetadata::new());

        for data in ["BEGIN", "BEGIN 501", "COMMIT", "COMMIT 501"] {
            let record = LogicalDecodingRecord::new(PgLsn::from(1), 501, data);
            assert_eq!(builder.build(&record).unwrap(), None, "{data}");
        }

        assert_eq!(diagnostics.count(DiagnosticLevel::Error), 0);
    }
}

#[test]
fn test_decoding_update_uses_metadata_for_keys_and_nullability() {
    init_test_tracing();

    let metadata = StaticTableMetadata::new().with_table(
        TableRef::new("public", "orders"),
        TableMetadata::with_key_columns(["id"]).non_nullable(["status"]),
    );
    let (builder, diagnostics) = recording_builder(DecodingDialect::TestDecoding, metadata);
    let record = LogicalDecodingRecord::new(
        PgLsn::from(0x2000),
        77,
        "table public.orders: UPDATE: id[integer]:10 status[text]:'shipped' note[text]:null",
    );

    let change = builder.build(&record).unwrap().unwrap();

    assert_eq!(change.change_type(), ChangeType::Update);
    assert_eq!(change.timestamp(), 42);
    assert_eq!(
        change.key_columns(),
        &[ColumnValue::new(
            "id",
            LogicalType::required(LogicalTypeKind::Int32),
            Cell::I32(10)
        )]
    );

    let values = change.value_columns();
    assert_eq!(values.len(), 3);
    assert!(!values[1].logical_type().nullable);
    assert!(values[2].logical_type().nullable);
    assert_eq!(values[2].value(), &Cell::Null);
    assert!(diagnostics.reports().is_empty());
}

#[test]
fn null_in_key_column_is_rejected() {
    init_test_tracing();

    let metadata = StaticTableMetadata::new().with_table(
        TableRef::new("public", "orders"),
        TableMetadata::with_key_columns(["id"]),
    );
    let (builder, diagnostics) = recording_builder(DecodingDialect::Compact, metadata);
    let record = LogicalDecodingRecord::new(
        PgLsn::from(0x10),
        1,
        "public.orders INSERT id[int4]:null, status[text]:'new'",
    );

    let err = builder.build(&record).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ParseError);
    let reports = diagnostics.reports();
    assert_eq!(reports[0].level, DiagnosticLevel::Error);
    assert_eq!(reports[0].position, SourcePosition::Lsn(PgLsn::from(0x10)));
}

#[test]
fn truncate_is_skipped_with_a_warning() {
    init_test_tracing();

    let (builder, diagnostics) =
        recording_builder(DecodingDialect::TestDecoding, StaticTableMetadata::new());
    let record = LogicalDecodingRecord::new(
        PgLsn::from(0x30),
        5,
        "table public.orders, public.items: TRUNCATE: (no-flags)",
    );

    assert_eq!(builder.build(&record).unwrap(), None);

    let reports = diagnostics.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].level, DiagnosticLevel::Warn);
    assert!(reports[0].message.contains("public.orders, public.items"));
}

#[test]
fn change_tracking_rows_build_ms_sql_changes() {
    init_test_tracing();

    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let builder =
        MsSqlChangeBuilder::new("sales", Arc::new(FixedClock::new(7)), diagnostics.clone());
    let row = ChangeTrackingRow {
        schema_name: "dbo".to_owned(),
        table_name: "customers".to_owned(),
        change_version: 1201,
        operation: "U".to_owned(),
        key_columns: vec![ColumnValue::new(
            "id",
            LogicalType::optional(LogicalTypeKind::Int64),
            Cell::I64(3),
        )],
        value_columns: vec![ColumnValue::new(
            "name",
            LogicalType::optional(LogicalTypeKind::String),
            Cell::String("Ada".to_owned()),
        )],
    };

    let change = builder.build(&row).unwrap().unwrap();

    assert_eq!(change.change_type(), ChangeType::Update);
    assert_eq!(change.position(), SourcePosition::ChangeVersion(1201));
    assert_eq!(change.source_offset()["sys_change_version"], serde_json::json!(1201));
    assert_eq!(change.source_partition()["table"], serde_json::json!("customers"));
    assert!(!change.key_columns()[0].logical_type().nullable);

    let json = serde_json::to_value(&change).unwrap();
    assert_eq!(json["source"], "ms_sql");

    let bad_row = ChangeTrackingRow {
        operation: "X".to_owned(),
        ..row
    };
    assert_eq!(builder.build(&bad_row).unwrap_err().kind(), ErrorKind::ParseError);
    assert_eq!(diagnostics.levels(), vec![DiagnosticLevel::Error]);
}
