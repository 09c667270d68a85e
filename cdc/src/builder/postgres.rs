use std::collections::{BTreeMap, HashSet};

use cdc_config::shared::SourceConfig;

use crate::builder::{
    ChangeBuilder, Clock, DiagnosticLevel, DiagnosticSink, SystemClock, TracingDiagnostics,
};
use crate::decoding::{DecodedRecord, LogicalDecodingParser, TableMetadataProvider};
use crate::error::CdcResult;
use crate::types::{
    Change, ChangeMetadata, LogicalDecodingRecord, PostgresChange, SourceOffset,
    SourcePartition, SourcePosition, TableRef,
};

/// Metadata key holding the LSN of the change.
pub const LOCATION_KEY: &str = "location";
/// Metadata key holding the transaction id of the change.
pub const XID_KEY: &str = "xid";
/// Partition key holding the replication slot name.
pub const SLOT_KEY: &str = "slot";
/// Metadata key listing columns that were left out because their value did not change.
pub const UNCHANGED_TOAST_COLUMNS_KEY: &str = "unchanged_toast_columns";

/// Builds [`Change::Postgres`] values from logical decoding records of one replication slot.
#[derive(Debug, Clone)]
pub struct PostgresChangeBuilder<M, C = SystemClock, D = TracingDiagnostics> {
    database_name: String,
    slot_name: String,
    parser: LogicalDecodingParser<M>,
    tracked_tables: Option<HashSet<TableRef>>,
    clock: C,
    diagnostics: D,
}

impl<M> PostgresChangeBuilder<M>
where
    M: TableMetadataProvider,
{
    /// Creates a builder for the slot and tables of `config`, stamping changes with the system
    /// time and reporting through `tracing`.
    pub fn from_config(config: &SourceConfig, metadata: M) -> CdcResult<Self> {
        let tracked_tables = config
            .tables
            .iter()
            .map(|table| table.parse::<TableRef>())
            .collect::<CdcResult<Vec<_>>>()?;

        let builder = Self::new(
            config.database_name.clone(),
            config.slot_name.clone(),
            LogicalDecodingParser::new(config.dialect, metadata),
            SystemClock,
            TracingDiagnostics,
        )
        .with_tracked_tables(tracked_tables);

        Ok(builder)
    }
}

impl<M, C, D> PostgresChangeBuilder<M, C, D>
where
    M: TableMetadataProvider,
    C: Clock,
    D: DiagnosticSink,
{
    pub fn new(
        database_name: impl Into<String>,
        slot_name: impl Into<String>,
        parser: LogicalDecodingParser<M>,
        clock: C,
        diagnostics: D,
    ) -> Self {
        Self {
            database_name: database_name.into(),
            slot_name: slot_name.into(),
            parser,
            tracked_tables: None,
            clock,
            diagnostics,
        }
    }

    /// Restricts the builder to `tables`; changes of any other table build nothing.
    ///
    /// Without a restriction every table of the slot is captured.
    pub fn with_tracked_tables(mut self, tables: impl IntoIterator<Item = TableRef>) -> Self {
        self.tracked_tables = Some(tables.into_iter().collect());
        self
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    fn is_tracked(&self, schema_name: &str, table_name: &str) -> bool {
        self.tracked_tables
            .as_ref()
            .is_none_or(|tables| tables.contains(&TableRef::new(schema_name, table_name)))
    }

    fn source_partition(&self) -> SourcePartition {
        BTreeMap::from([(
            SLOT_KEY.to_owned(),
            serde_json::Value::String(self.slot_name.clone()),
        )])
    }
}

impl<M, C, D> ChangeBuilder<LogicalDecodingRecord> for PostgresChangeBuilder<M, C, D>
where
    M: TableMetadataProvider,
    C: Clock,
    D: DiagnosticSink,
{
    fn build(&self, record: &LogicalDecodingRecord) -> CdcResult<Option<Change>> {
        let position = self.position(record);

        let draft = match self.parser.parse(&record.data) {
            Ok(DecodedRecord::Row(draft)) => draft,
            Ok(DecodedRecord::Control(marker)) => {
                self.diagnostics.report(
                    DiagnosticLevel::Debug,
                    position,
                    &format!("skipping transaction marker {marker:?}"),
                );
                return Ok(None);
            }
            Ok(DecodedRecord::Truncate(tables)) => {
                let tables = tables
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                self.diagnostics.report(
                    DiagnosticLevel::Warn,
                    position,
                    &format!("skipping truncate of {tables}, truncates are not captured"),
                );
                return Ok(None);
            }
            Err(err) => {
                self.diagnostics.report(
                    DiagnosticLevel::Error,
                    position,
                    &format!("rejected logical decoding record: {err}"),
                );
                return Err(err);
            }
        };

        if !self.is_tracked(&draft.schema_name, &draft.table_name) {
            self.diagnostics.report(
                DiagnosticLevel::Debug,
                position,
                &format!(
                    "skipping change of untracked table {}.{}",
                    draft.schema_name, draft.table_name
                ),
            );
            return Ok(None);
        }

        let location = record.location.to_string();
        let mut metadata = ChangeMetadata::new();
        metadata.insert(LOCATION_KEY.to_owned(), location.clone());
        metadata.insert(XID_KEY.to_owned(), record.xid.to_string());
        if !draft.unchanged_columns.is_empty() {
            metadata.insert(
                UNCHANGED_TOAST_COLUMNS_KEY.to_owned(),
                draft.unchanged_columns.join(","),
            );
        }

        let source_offset: SourceOffset =
            BTreeMap::from([(LOCATION_KEY.to_owned(), serde_json::Value::String(location))]);

        Ok(Some(Change::Postgres(PostgresChange {
            database_name: self.database_name.clone(),
            schema_name: draft.schema_name,
            table_name: draft.table_name,
            change_type: draft.change_type,
            key_columns: draft.key_columns,
            value_columns: draft.value_columns,
            source_partition: self.source_partition(),
            source_offset,
            metadata,
            timestamp: self.clock.now_millis(),
            location: record.location,
            xid: record.xid,
        })))
    }

    fn position(&self, record: &LogicalDecodingRecord) -> SourcePosition {
        SourcePosition::Lsn(record.location)
    }
}
