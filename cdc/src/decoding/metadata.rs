use std::collections::{HashMap, HashSet};

use crate::types::TableRef;

/// Known structure of a tracked table that the text protocol does not carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMetadata {
    key_columns: Vec<String>,
    non_nullable_columns: HashSet<String>,
}

impl TableMetadata {
    /// Creates metadata with the given primary key columns, in key order.
    ///
    /// Key columns are implicitly non-nullable.
    pub fn with_key_columns<I, S>(key_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_columns: Vec<String> = key_columns.into_iter().map(Into::into).collect();
        let non_nullable_columns = key_columns.iter().cloned().collect();

        Self {
            key_columns,
            non_nullable_columns,
        }
    }

    /// Marks additional columns as non-nullable.
    pub fn non_nullable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_nullable_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn is_nullable(&self, column_name: &str) -> bool {
        !self.non_nullable_columns.contains(column_name)
    }
}

/// Source of [`TableMetadata`] consulted while decoding records.
pub trait TableMetadataProvider {
    /// Returns the metadata of a table, or [`None`] if nothing is known about it.
    fn table_metadata(&self, schema_name: &str, table_name: &str) -> Option<&TableMetadata>;
}

/// Provider that knows nothing about any table.
///
/// Every column is treated as nullable and key columns only come from the record itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTableMetadata;

impl TableMetadataProvider for NoTableMetadata {
    fn table_metadata(&self, _schema_name: &str, _table_name: &str) -> Option<&TableMetadata> {
        None
    }
}

/// Fixed in-memory metadata keyed by table.
#[derive(Debug, Clone, Default)]
pub struct StaticTableMetadata {
    tables: HashMap<TableRef, TableMetadata>,
}

impl StaticTableMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: TableRef, metadata: TableMetadata) {
        self.tables.insert(table, metadata);
    }

    pub fn with_table(mut self, table: TableRef, metadata: TableMetadata) -> Self {
        self.insert(table, metadata);
        self
    }
}

impl TableMetadataProvider for StaticTableMetadata {
    fn table_metadata(&self, schema_name: &str, table_name: &str) -> Option<&TableMetadata> {
        self.tables.get(&TableRef::new(schema_name, table_name))
    }
}

impl<P> TableMetadataProvider for &P
where
    P: TableMetadataProvider + ?Sized,
{
    fn table_metadata(&self, schema_name: &str, table_name: &str) -> Option<&TableMetadata> {
        (**self).table_metadata(schema_name, table_name)
    }
}
