use serde::Serialize;
use std::fmt;

use crate::types::Cell;

/// Semantic kind of a captured column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalTypeKind {
    Boolean,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    String,
    Bytes,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
}

impl fmt::Display for LogicalTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "BOOLEAN",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::Decimal => "DECIMAL",
            Self::String => "STRING",
            Self::Bytes => "BYTES",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampTz => "TIMESTAMPTZ",
            Self::Uuid => "UUID",
            Self::Json => "JSON",
        };

        f.write_str(name)
    }
}

/// Logical type of a column: its kind and whether null is an admissible value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LogicalType {
    pub kind: LogicalTypeKind,
    pub nullable: bool,
}

impl LogicalType {
    /// Creates a logical type that admits null values.
    pub fn optional(kind: LogicalTypeKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    /// Creates a logical type that does not admit null values.
    pub fn required(kind: LogicalTypeKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }
}

/// One named, typed column value of a captured row.
///
/// Two [`ColumnValue`]s are equal when their name, type kind, nullability and value are all
/// equal. Values are compared structurally through [`Cell`]'s equality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnValue {
    column_name: String,
    logical_type: LogicalType,
    value: Cell,
}

impl ColumnValue {
    pub fn new(column_name: impl Into<String>, logical_type: LogicalType, value: Cell) -> Self {
        Self {
            column_name: column_name.into(),
            logical_type,
            value,
        }
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    pub fn value(&self) -> &Cell {
        &self.value
    }

    /// Returns a copy of this column with the nullability flag replaced.
    pub(crate) fn with_nullable(mut self, nullable: bool) -> Self {
        self.logical_type.nullable = nullable;
        self
    }
}
