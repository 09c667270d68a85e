use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::str::FromStr;
use uuid::Uuid;

use crate::conversions::bool::parse_bool;
use crate::conversions::hex::parse_bytea_hex;
use crate::conversions::numeric::PgNumeric;
use crate::error::CdcResult;
use crate::types::{Cell, LogicalTypeKind};

/// Postgres date output format (`DateStyle = ISO`).
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format with optional fractional seconds.
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Timestamp format with optional fractional seconds.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Timestamp with an offset that may omit minutes (`+00`, `+0530`).
const TIMESTAMPTZ_FORMAT_HHMM: &str = "%Y-%m-%d %H:%M:%S%.f%#z";

/// Timestamp with an offset in `+HH:MM` form.
const TIMESTAMPTZ_FORMAT_HH_MM: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Converts the unquoted text form of a value into a [`Cell`] of the given kind.
pub fn parse_cell_from_text(kind: LogicalTypeKind, text: &str) -> CdcResult<Cell> {
    let cell = match kind {
        LogicalTypeKind::Boolean => Cell::Bool(parse_bool(text)?),
        LogicalTypeKind::Int16 => Cell::I16(text.parse()?),
        LogicalTypeKind::Int32 => Cell::I32(text.parse()?),
        LogicalTypeKind::Int64 => Cell::I64(text.parse()?),
        LogicalTypeKind::Float32 => Cell::F32(text.parse()?),
        LogicalTypeKind::Float64 => Cell::F64(text.parse()?),
        LogicalTypeKind::Decimal => Cell::Numeric(PgNumeric::from_str(text)?),
        LogicalTypeKind::String => Cell::String(text.to_owned()),
        LogicalTypeKind::Bytes => Cell::Bytes(parse_bytea_hex(text)?),
        LogicalTypeKind::Date => Cell::Date(NaiveDate::parse_from_str(text, DATE_FORMAT)?),
        LogicalTypeKind::Time => Cell::Time(NaiveTime::parse_from_str(text, TIME_FORMAT)?),
        LogicalTypeKind::Timestamp => {
            Cell::Timestamp(NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)?)
        }
        LogicalTypeKind::TimestampTz => Cell::TimestampTz(parse_timestamptz(text)?),
        LogicalTypeKind::Uuid => Cell::Uuid(Uuid::parse_str(text)?),
        LogicalTypeKind::Json => Cell::Json(serde_json::from_str(text)?),
    };

    Ok(cell)
}

fn parse_timestamptz(text: &str) -> CdcResult<DateTime<Utc>> {
    let parsed = match DateTime::<FixedOffset>::parse_from_str(text, TIMESTAMPTZ_FORMAT_HHMM) {
        Ok(parsed) => parsed,
        Err(_) => DateTime::<FixedOffset>::parse_from_str(text, TIMESTAMPTZ_FORMAT_HH_MM)?,
    };

    Ok(parsed.with_timezone(&Utc))
}
