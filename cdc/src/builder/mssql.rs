use std::collections::BTreeMap;

use crate::builder::{
    ChangeBuilder, Clock, DiagnosticLevel, DiagnosticSink, SystemClock, TracingDiagnostics,
};
use crate::error::{CdcError, CdcResult, ErrorKind};
use crate::types::{
    Change, ChangeMetadata, ChangeTrackingRow, ChangeType, MsSqlChange, SourceOffset,
    SourcePartition, SourcePosition,
};
use crate::{bail, cdc_error};

pub const SYS_CHANGE_VERSION_KEY: &str = "sys_change_version";
pub const SYS_CHANGE_OPERATION_KEY: &str = "sys_change_operation";

/// Maps a `SYS_CHANGE_OPERATION` letter to its change type.
pub fn parse_change_operation(operation: &str) -> CdcResult<ChangeType> {
    match operation.trim() {
        "I" => Ok(ChangeType::Insert),
        "U" => Ok(ChangeType::Update),
        "D" => Ok(ChangeType::Delete),
        other => bail!(
            ErrorKind::ParseError,
            "Unknown change tracking operation",
            format!("SYS_CHANGE_OPERATION `{other}` is not one of I, U or D")
        ),
    }
}

/// Builds [`Change::MsSql`] values from polled change tracking rows.
#[derive(Debug, Clone)]
pub struct MsSqlChangeBuilder<C = SystemClock, D = TracingDiagnostics> {
    database_name: String,
    clock: C,
    diagnostics: D,
}

impl MsSqlChangeBuilder {
    pub fn with_defaults(database_name: impl Into<String>) -> Self {
        Self::new(database_name, SystemClock, TracingDiagnostics)
    }
}

impl<C, D> MsSqlChangeBuilder<C, D>
where
    C: Clock,
    D: DiagnosticSink,
{
    pub fn new(database_name: impl Into<String>, clock: C, diagnostics: D) -> Self {
        Self {
            database_name: database_name.into(),
            clock,
            diagnostics,
        }
    }

    fn reject(&self, row: &ChangeTrackingRow, err: CdcError) -> CdcError {
        self.diagnostics.report(
            DiagnosticLevel::Error,
            self.position(row),
            &format!("rejected change tracking row: {err}"),
        );
        err
    }
}

impl<C, D> ChangeBuilder<ChangeTrackingRow> for MsSqlChangeBuilder<C, D>
where
    C: Clock,
    D: DiagnosticSink,
{
    fn build(&self, row: &ChangeTrackingRow) -> CdcResult<Option<Change>> {
        let change_type =
            parse_change_operation(&row.operation).map_err(|err| self.reject(row, err))?;

        if change_type != ChangeType::Delete && row.value_columns.is_empty() {
            let err = cdc_error!(
                ErrorKind::ParseError,
                "Missing column values",
                format!(
                    "{change_type} on {}.{} at version {} has no column values",
                    row.schema_name, row.table_name, row.change_version
                )
            );
            return Err(self.reject(row, err));
        }

        let source_partition: SourcePartition = BTreeMap::from([
            ("database".to_owned(), self.database_name.clone().into()),
            ("schema".to_owned(), row.schema_name.clone().into()),
            ("table".to_owned(), row.table_name.clone().into()),
        ]);
        let source_offset: SourceOffset = BTreeMap::from([(
            SYS_CHANGE_VERSION_KEY.to_owned(),
            row.change_version.into(),
        )]);
        let metadata: ChangeMetadata = BTreeMap::from([
            (
                SYS_CHANGE_VERSION_KEY.to_owned(),
                row.change_version.to_string(),
            ),
            (
                SYS_CHANGE_OPERATION_KEY.to_owned(),
                row.operation.trim().to_owned(),
            ),
        ]);

        let key_columns = row
            .key_columns
            .iter()
            .cloned()
            .map(|column| column.with_nullable(false))
            .collect();

        Ok(Some(Change::MsSql(MsSqlChange {
            database_name: self.database_name.clone(),
            schema_name: row.schema_name.clone(),
            table_name: row.table_name.clone(),
            change_type,
            key_columns,
            value_columns: row.value_columns.clone(),
            source_partition,
            source_offset,
            metadata,
            timestamp: self.clock.now_millis(),
            change_version: row.change_version,
        })))
    }

    fn position(&self, row: &ChangeTrackingRow) -> SourcePosition {
        SourcePosition::ChangeVersion(row.change_version)
    }
}
