use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Converts a Postgres bytea hex string (`\x` followed by hex digit pairs) to bytes.
pub fn parse_bytea_hex(bytea_hex_string: &str) -> CdcResult<Vec<u8>> {
    let Some(digits) = bytea_hex_string.strip_prefix("\\x") else {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert from bytea hex string to byte array",
            "The prefix '\\x' is missing"
        );
    };

    if digits.len() % 2 != 0 {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert from bytea hex string to byte array",
            "The number of digits is odd"
        );
    }

    let mut result = Vec::with_capacity(digits.len() / 2);
    for i in (0..digits.len()).step_by(2) {
        let Some(pair) = digits.get(i..i + 2) else {
            bail!(
                ErrorKind::ConversionError,
                "Could not convert from bytea hex string to byte array",
                "The hex digits are not valid ascii"
            );
        };
        // `from_str_radix` accepts a leading sign, so "+1" would pass as a pair.
        if !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
            bail!(
                ErrorKind::ConversionError,
                "Could not convert from bytea hex string to byte array",
                format!("'{pair}' is not a pair of hex digits")
            );
        }
        result.push(u8::from_str_radix(pair, 16)?);
    }

    Ok(result)
}
