use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::bail;
use crate::error::{CdcError, ErrorKind};

/// Reference to a tracked table by schema and name.
///
/// The schema is empty for sources without a schema concept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableRef {
    /// The schema name containing the table.
    pub schema: String,
    /// The name of the table within the schema.
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableRef {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.schema, self.name)
        }
    }
}

/// Parses `schema.table` or a bare `table`.
///
/// Only the first dot separates the schema from the name.
impl FromStr for TableRef {
    type Err = CdcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (schema, name) = match s.split_once('.') {
            Some((schema, name)) => (schema, name),
            None => ("", s),
        };

        if name.is_empty() || (s.contains('.') && schema.is_empty()) {
            bail!(
                ErrorKind::InvalidConfiguration,
                "Invalid table reference",
                format!("Expected `schema.table` or `table` but got `{s}`")
            );
        }

        Ok(TableRef::new(schema, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_qualified_table() {
        let table: TableRef = "dbo.orders".parse().unwrap();
        assert_eq!(table, TableRef::new("dbo", "orders"));
        assert_eq!(table.to_string(), "dbo.orders");
    }

    #[test]
    fn parse_bare_table() {
        let table: TableRef = "orders".parse().unwrap();
        assert_eq!(table.schema, "");
        assert_eq!(table.to_string(), "orders");
    }

    #[test]
    fn parse_rejects_empty_parts() {
        assert!("".parse::<TableRef>().is_err());
        assert!(".orders".parse::<TableRef>().is_err());
        assert!("dbo.".parse::<TableRef>().is_err());
    }
}
