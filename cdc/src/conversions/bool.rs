use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Parses a boolean in either the long (`true`/`false`) or short (`t`/`f`) Postgres text form.
pub fn parse_bool(s: &str) -> CdcResult<bool> {
    match s {
        "t" | "true" => Ok(true),
        "f" | "false" => Ok(false),
        _ => bail!(
            ErrorKind::ConversionError,
            "Invalid boolean value",
            format!("Boolean value must be one of 't', 'f', 'true', 'false' (received: {s})")
        ),
    }
}
