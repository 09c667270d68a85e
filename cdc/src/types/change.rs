use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tokio_postgres::types::PgLsn;

use crate::types::ColumnValue;

/// Identity of the stream a change came from, e.g. `{"slot": "orders_slot"}`.
pub type SourcePartition = BTreeMap<String, serde_json::Value>;

/// Position within a stream that is sufficient to resume after a change.
pub type SourceOffset = BTreeMap<String, serde_json::Value>;

/// Auxiliary provenance of a change that is not needed for resumption.
pub type ChangeMetadata = BTreeMap<String, String>;

/// Kind of row mutation carried by a [`Change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Typed, ordered view of a [`SourceOffset`].
///
/// Positions of different sources are not comparable with each other, so [`PartialOrd`] returns
/// [`None`] across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePosition {
    /// Log sequence number of a logical decoding record.
    Lsn(PgLsn),
    /// Change tracking version of a polled row.
    ChangeVersion(i64),
}

impl PartialOrd for SourcePosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Lsn(a), Self::Lsn(b)) => Some(a.cmp(b)),
            (Self::ChangeVersion(a), Self::ChangeVersion(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl SourcePosition {
    /// Returns whether a change at this position may be committed after one at `last` of the
    /// same source partition.
    ///
    /// LSNs must strictly increase. Every row of a change tracking transaction carries the same
    /// version, so versions only must not decrease.
    pub fn follows(&self, last: &SourcePosition) -> bool {
        match (self, last) {
            (Self::Lsn(position), Self::Lsn(last)) => position > last,
            (Self::ChangeVersion(version), Self::ChangeVersion(last)) => version >= last,
            _ => false,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lsn(lsn) => write!(f, "{lsn}"),
            Self::ChangeVersion(version) => write!(f, "{version}"),
        }
    }
}

/// Row mutation as produced by the decoding parser, before provenance is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeDraft {
    pub schema_name: String,
    pub table_name: String,
    pub change_type: ChangeType,
    pub key_columns: Vec<ColumnValue>,
    pub value_columns: Vec<ColumnValue>,
    /// Columns whose value the source did not send because it was unchanged and stored
    /// out of line.
    pub unchanged_columns: Vec<String>,
}

/// Capability shared by every change representation.
///
/// The delivery side consumes changes only through this trait, regardless of the source
/// dialect.
pub trait ChangeEvent {
    fn database_name(&self) -> &str;

    fn schema_name(&self) -> &str;

    fn table_name(&self) -> &str;

    fn change_type(&self) -> ChangeType;

    /// Columns identifying the row, in source order.
    fn key_columns(&self) -> &[ColumnValue];

    /// Post-change values of all captured columns, in source order.
    fn value_columns(&self) -> &[ColumnValue];

    fn source_partition(&self) -> &SourcePartition;

    fn source_offset(&self) -> &SourceOffset;

    fn metadata(&self) -> &ChangeMetadata;

    /// Capture time in milliseconds since the unix epoch.
    fn timestamp(&self) -> i64;

    /// Typed stream position matching [`ChangeEvent::source_offset`].
    fn position(&self) -> SourcePosition;
}

/// Change decoded from a Postgres logical decoding record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostgresChange {
    pub(crate) database_name: String,
    pub(crate) schema_name: String,
    pub(crate) table_name: String,
    pub(crate) change_type: ChangeType,
    pub(crate) key_columns: Vec<ColumnValue>,
    pub(crate) value_columns: Vec<ColumnValue>,
    pub(crate) source_partition: SourcePartition,
    pub(crate) source_offset: SourceOffset,
    pub(crate) metadata: ChangeMetadata,
    pub(crate) timestamp: i64,
    #[serde(skip)]
    pub(crate) location: PgLsn,
    #[serde(skip)]
    pub(crate) xid: u32,
}

impl PostgresChange {
    /// LSN of the record this change was decoded from.
    pub fn location(&self) -> PgLsn {
        self.location
    }

    /// Id of the transaction that produced this change.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

/// Change read from a SQL Server change tracking table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MsSqlChange {
    pub(crate) database_name: String,
    pub(crate) schema_name: String,
    pub(crate) table_name: String,
    pub(crate) change_type: ChangeType,
    pub(crate) key_columns: Vec<ColumnValue>,
    pub(crate) value_columns: Vec<ColumnValue>,
    pub(crate) source_partition: SourcePartition,
    pub(crate) source_offset: SourceOffset,
    pub(crate) metadata: ChangeMetadata,
    pub(crate) timestamp: i64,
    #[serde(skip)]
    pub(crate) change_version: i64,
}

impl MsSqlChange {
    /// `SYS_CHANGE_VERSION` of the polled row.
    pub fn change_version(&self) -> i64 {
        self.change_version
    }
}

/// A captured row mutation, tagged by the source it was captured from.
///
/// A [`Change`] is finalised once by a builder and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Change {
    Postgres(PostgresChange),
    MsSql(MsSqlChange),
}

/// Forwards a [`ChangeEvent`] accessor to the fields shared by every variant.
macro_rules! shared_field {
    ($self:ident, $field:ident) => {
        match $self {
            Change::Postgres(change) => &change.$field,
            Change::MsSql(change) => &change.$field,
        }
    };
}

impl ChangeEvent for Change {
    fn database_name(&self) -> &str {
        shared_field!(self, database_name)
    }

    fn schema_name(&self) -> &str {
        shared_field!(self, schema_name)
    }

    fn table_name(&self) -> &str {
        shared_field!(self, table_name)
    }

    fn change_type(&self) -> ChangeType {
        *shared_field!(self, change_type)
    }

    fn key_columns(&self) -> &[ColumnValue] {
        shared_field!(self, key_columns)
    }

    fn value_columns(&self) -> &[ColumnValue] {
        shared_field!(self, value_columns)
    }

    fn source_partition(&self) -> &SourcePartition {
        shared_field!(self, source_partition)
    }

    fn source_offset(&self) -> &SourceOffset {
        shared_field!(self, source_offset)
    }

    fn metadata(&self) -> &ChangeMetadata {
        shared_field!(self, metadata)
    }

    fn timestamp(&self) -> i64 {
        *shared_field!(self, timestamp)
    }

    fn position(&self) -> SourcePosition {
        match self {
            Change::Postgres(change) => SourcePosition::Lsn(change.location),
            Change::MsSql(change) => SourcePosition::ChangeVersion(change.change_version),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{} @ {}",
            self.change_type(),
            self.schema_name(),
            self.table_name(),
            self.position()
        )
    }
}
