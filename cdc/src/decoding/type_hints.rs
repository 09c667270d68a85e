use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::LogicalTypeKind;

/// Maps a column type hint to its logical kind.
///
/// Hints are matched case-insensitively after removing a trailing type modifier such as
/// `(255)` or `(10,2)`. Arrays, domains and every other unlisted type are rejected.
pub fn lookup_type_hint(hint: &str) -> CdcResult<LogicalTypeKind> {
    let normalized = strip_type_modifier(hint).to_ascii_lowercase();

    let kind = match normalized.as_str() {
        "bool" | "boolean" => LogicalTypeKind::Boolean,
        "int2" | "smallint" => LogicalTypeKind::Int16,
        "int4" | "int" | "integer" | "serial" => LogicalTypeKind::Int32,
        "int8" | "bigint" | "bigserial" => LogicalTypeKind::Int64,
        "float4" | "real" => LogicalTypeKind::Float32,
        "float8" | "double precision" => LogicalTypeKind::Float64,
        "numeric" | "decimal" => LogicalTypeKind::Decimal,
        "text" | "varchar" | "character varying" | "char" | "character" | "bpchar" | "name" => {
            LogicalTypeKind::String
        }
        "bytea" => LogicalTypeKind::Bytes,
        "date" => LogicalTypeKind::Date,
        "time" | "time without time zone" => LogicalTypeKind::Time,
        "timestamp" | "timestamp without time zone" => LogicalTypeKind::Timestamp,
        "timestamptz" | "timestamp with time zone" => LogicalTypeKind::TimestampTz,
        "uuid" => LogicalTypeKind::Uuid,
        "json" | "jsonb" => LogicalTypeKind::Json,
        _ => bail!(
            ErrorKind::ParseError,
            "Unknown column type hint",
            format!("The type hint `{hint}` has no logical type mapping")
        ),
    };

    Ok(kind)
}

/// Removes a `(...)` modifier, which Postgres prints either at the end (`numeric(10,2)`) or
/// before a trailing qualifier (`timestamp(3) with time zone`).
fn strip_type_modifier(hint: &str) -> String {
    let hint = hint.trim();
    let (Some(open), Some(close)) = (hint.find('('), hint.find(')')) else {
        return hint.to_owned();
    };
    if close < open {
        return hint.to_owned();
    }

    let before = hint[..open].trim_end();
    let after = hint[close + 1..].trim_start();
    if after.is_empty() {
        before.to_owned()
    } else {
        format!("{before} {after}")
    }
}
