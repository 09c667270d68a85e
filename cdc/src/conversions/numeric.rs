use bigdecimal::{BigDecimal, ParseBigDecimalError};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A rust variant of the Postgres numeric type.
///
/// Finite values are held as an exact [`BigDecimal`] so no precision is lost between the text
/// emitted by the source and the value handed to the sink.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Clone)]
pub enum PgNumeric {
    NaN,
    PositiveInf,
    NegativeInf,
    Value(BigDecimal),
}

impl FromStr for PgNumeric {
    type Err = ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match BigDecimal::from_str(s) {
            Ok(n) => Ok(PgNumeric::Value(n)),
            Err(e) => match s.to_lowercase().as_str() {
                "infinity" => Ok(PgNumeric::PositiveInf),
                "-infinity" => Ok(PgNumeric::NegativeInf),
                "nan" => Ok(PgNumeric::NaN),
                _ => Err(e),
            },
        }
    }
}

impl fmt::Display for PgNumeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgNumeric::NaN => write!(f, "NaN"),
            PgNumeric::PositiveInf => write!(f, "Infinity"),
            PgNumeric::NegativeInf => write!(f, "-Infinity"),
            PgNumeric::Value(n) => write!(f, "{n}"),
        }
    }
}

/// Numerics are serialized as their textual form to keep full precision in json output.
impl Serialize for PgNumeric {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
