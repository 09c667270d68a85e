use tokio_postgres::types::PgLsn;

use crate::types::ColumnValue;

/// One row returned by peeking a logical replication slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalDecodingRecord {
    /// LSN at which the record was written.
    pub location: PgLsn,
    /// Id of the transaction the record belongs to.
    pub xid: u32,
    /// Text produced by the output plugin.
    pub data: String,
}

impl LogicalDecodingRecord {
    pub fn new(location: PgLsn, xid: u32, data: impl Into<String>) -> Self {
        Self {
            location,
            xid,
            data: data.into(),
        }
    }
}

/// One row polled from `CHANGETABLE(CHANGES ...)` joined with the current table contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeTrackingRow {
    pub schema_name: String,
    pub table_name: String,
    /// `SYS_CHANGE_VERSION` of the change.
    pub change_version: i64,
    /// `SYS_CHANGE_OPERATION`, one of `I`, `U` or `D`.
    pub operation: String,
    pub key_columns: Vec<ColumnValue>,
    pub value_columns: Vec<ColumnValue>,
}
