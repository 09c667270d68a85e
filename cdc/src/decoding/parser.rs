use std::collections::HashSet;

use cdc_config::shared::DecodingDialect;

use crate::conversions::text::parse_cell_from_text;
use crate::decoding::metadata::{TableMetadata, TableMetadataProvider};
use crate::decoding::scanner::{RawValue, Scanner};
use crate::decoding::type_hints::lookup_type_hint;
use crate::error::{CdcResult, ErrorKind};
use crate::types::{Cell, ChangeDraft, ChangeType, ColumnValue, LogicalType, TableRef};
use crate::{bail, cdc_error};

/// Value printed in place of an out-of-line column that was not modified.
const UNCHANGED_TOAST_DATUM: &str = "unchanged-toast-datum";

/// Body printed for a row operation without any column data.
const NO_TUPLE_DATA: &str = "(no-tuple-data)";

const OLD_KEY_MARKER: &str = "old-key: ";
const NEW_TUPLE_MARKER: &str = "new-tuple: ";

/// Transaction boundary emitted by the decoder between row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMarker {
    Begin { xid: Option<u32> },
    Commit { xid: Option<u32> },
}

/// Recognizes a `BEGIN` or `COMMIT` line.
///
/// The keyword must be the whole record or be followed by a space, so a table called
/// `BEGIN_audit` is not mistaken for a marker. The transaction id is only available when the
/// decoder was asked to include it.
pub fn parse_control_marker(data: &str) -> Option<ControlMarker> {
    let (keyword, rest) = match data.split_once(' ') {
        Some((keyword, rest)) => (keyword, rest),
        None => (data, ""),
    };
    let xid = rest
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok());

    match keyword {
        "BEGIN" => Some(ControlMarker::Begin { xid }),
        "COMMIT" => Some(ControlMarker::Commit { xid }),
        _ => None,
    }
}

/// Outcome of decoding a single record.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    /// A transaction boundary.
    Control(ControlMarker),
    /// A truncation of one or more tables, which carries no row data.
    Truncate(Vec<TableRef>),
    /// A row mutation.
    Row(ChangeDraft),
}

#[derive(Debug)]
struct RawColumn {
    name: String,
    type_hint: String,
    value: RawValue,
}

#[derive(Debug)]
struct RawRow {
    table: TableRef,
    change_type: ChangeType,
    old_key: Option<Vec<RawColumn>>,
    columns: Vec<RawColumn>,
}

#[derive(Debug)]
enum RawRecord {
    Row(RawRow),
    Truncate(Vec<TableRef>),
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Row(ChangeType),
    Truncate,
}

/// Parser for the text records of a logical decoding output plugin.
///
/// The parser holds no mutable state, so the same instance can decode any number of records and
/// re-decoding a record always yields the same result.
#[derive(Debug, Clone)]
pub struct LogicalDecodingParser<M> {
    dialect: DecodingDialect,
    metadata: M,
}

impl<M> LogicalDecodingParser<M>
where
    M: TableMetadataProvider,
{
    pub fn new(dialect: DecodingDialect, metadata: M) -> Self {
        Self { dialect, metadata }
    }

    pub fn dialect(&self) -> DecodingDialect {
        self.dialect
    }

    /// Decodes one record.
    ///
    /// Any deviation from the grammar fails the whole record with [`ErrorKind::ParseError`].
    pub fn parse(&self, data: &str) -> CdcResult<DecodedRecord> {
        if let Some(marker) = parse_control_marker(data) {
            return Ok(DecodedRecord::Control(marker));
        }

        let mut scanner = Scanner::new(data);
        let record = match self.dialect {
            DecodingDialect::Compact => parse_compact(&mut scanner)?,
            DecodingDialect::TestDecoding => parse_test_decoding(&mut scanner)?,
        };

        match record {
            RawRecord::Truncate(tables) => Ok(DecodedRecord::Truncate(tables)),
            RawRecord::Row(row) => self.assemble(row).map(DecodedRecord::Row),
        }
    }

    /// Decodes one record, keeping only row mutations.
    pub fn parse_change(&self, data: &str) -> CdcResult<Option<ChangeDraft>> {
        match self.parse(data)? {
            DecodedRecord::Row(draft) => Ok(Some(draft)),
            DecodedRecord::Control(_) | DecodedRecord::Truncate(_) => Ok(None),
        }
    }

    fn assemble(&self, row: RawRow) -> CdcResult<ChangeDraft> {
        let metadata = self
            .metadata
            .table_metadata(&row.table.schema, &row.table.name);

        let mut unchanged_columns = Vec::new();
        let columns = convert_columns(row.columns, metadata, &mut unchanged_columns)?;
        let old_key = match row.old_key {
            Some(old_key) => Some(convert_columns(old_key, metadata, &mut unchanged_columns)?),
            None => None,
        };

        let (key_columns, value_columns) = match (row.change_type, old_key) {
            (ChangeType::Insert, Some(_)) => bail!(
                ErrorKind::ParseError,
                "Malformed logical decoding record",
                format!("INSERT on {} carries an old key section", row.table)
            ),
            (ChangeType::Insert, None) => (derive_key_columns(&columns, metadata), columns),
            (ChangeType::Update, Some(old_key)) => (old_key, columns),
            (ChangeType::Update, None) => (derive_key_columns(&columns, metadata), columns),
            (ChangeType::Delete, Some(old_key)) => {
                if !columns.is_empty() {
                    bail!(
                        ErrorKind::ParseError,
                        "Malformed logical decoding record",
                        format!("DELETE on {} carries a new tuple section", row.table)
                    );
                }
                (old_key, columns)
            }
            (ChangeType::Delete, None) => (deleted_row_key(columns, metadata), Vec::new()),
        };

        if row.change_type != ChangeType::Delete && value_columns.is_empty() {
            bail!(
                ErrorKind::ParseError,
                "Missing column values",
                format!("{} on {} has no column values", row.change_type, row.table)
            );
        }

        let key_columns = key_columns
            .into_iter()
            .map(|column| column.with_nullable(false))
            .collect::<Vec<_>>();
        if let Some(column) = key_columns.iter().find(|column| column.value().is_null()) {
            bail!(
                ErrorKind::ParseError,
                "Null value in non-nullable column",
                format!(
                    "Key column `{}` of {} is null",
                    column.column_name(),
                    row.table
                )
            );
        }

        Ok(ChangeDraft {
            schema_name: row.table.schema,
            table_name: row.table.name,
            change_type: row.change_type,
            key_columns,
            value_columns,
            unchanged_columns,
        })
    }
}

fn parse_compact(scanner: &mut Scanner<'_>) -> CdcResult<RawRecord> {
    let table = qualified_table(scanner)?;
    if scanner.skip_whitespace() == 0 {
        return Err(scanner.error("Expected whitespace after the table name"));
    }

    let change_type = match operation(scanner)? {
        Operation::Row(change_type) => change_type,
        Operation::Truncate => {
            scanner.skip_whitespace();
            if !scanner.is_at_end() {
                return Err(scanner.error("Unexpected data after TRUNCATE"));
            }
            return Ok(RawRecord::Truncate(vec![table]));
        }
    };

    let separated = scanner.skip_whitespace() > 0;
    let mut columns = Vec::new();
    if !scanner.is_at_end() {
        if !separated {
            return Err(scanner.error("Expected whitespace after the operation"));
        }

        loop {
            columns.push(column(scanner)?);
            scanner.skip_whitespace();
            if scanner.is_at_end() {
                break;
            }
            scanner.expect(',')?;
            scanner.skip_whitespace();
        }
    }

    Ok(RawRecord::Row(RawRow {
        table,
        change_type,
        old_key: None,
        columns,
    }))
}

fn parse_test_decoding(scanner: &mut Scanner<'_>) -> CdcResult<RawRecord> {
    scanner.expect_str("table ")?;
    let mut tables = vec![qualified_table(scanner)?];
    while scanner.eat_str(", ") {
        tables.push(qualified_table(scanner)?);
    }
    scanner.expect_str(": ")?;

    let operation = operation(scanner)?;
    scanner.expect(':')?;

    let change_type = match operation {
        // Truncate flags such as `cascade` or `(no-flags)` are not needed downstream.
        Operation::Truncate => return Ok(RawRecord::Truncate(tables)),
        Operation::Row(change_type) => change_type,
    };
    if tables.len() > 1 {
        return Err(scanner.error("Only TRUNCATE records may name several tables"));
    }
    let table = tables.swap_remove(0);

    if scanner.is_at_end() {
        return Ok(RawRecord::Row(RawRow {
            table,
            change_type,
            old_key: None,
            columns: Vec::new(),
        }));
    }
    scanner.expect(' ')?;

    if scanner.eat_str(NO_TUPLE_DATA) {
        if !scanner.is_at_end() {
            return Err(scanner.error("Unexpected data after the empty tuple marker"));
        }
        return Ok(RawRecord::Row(RawRow {
            table,
            change_type,
            old_key: None,
            columns: Vec::new(),
        }));
    }

    let old_key = if scanner.eat_str(OLD_KEY_MARKER) {
        Some(space_separated_columns(scanner, true)?)
    } else {
        None
    };

    let columns = match old_key {
        Some(_) if scanner.is_at_end() => Vec::new(),
        Some(_) => {
            scanner.expect(' ')?;
            scanner.expect_str(NEW_TUPLE_MARKER)?;
            space_separated_columns(scanner, false)?
        }
        None => {
            scanner.eat_str(NEW_TUPLE_MARKER);
            space_separated_columns(scanner, false)?
        }
    };

    Ok(RawRecord::Row(RawRow {
        table,
        change_type,
        old_key,
        columns,
    }))
}

fn qualified_table(scanner: &mut Scanner<'_>) -> CdcResult<TableRef> {
    let schema = scanner.identifier()?;
    scanner.expect('.')?;
    let name = scanner.identifier()?;

    Ok(TableRef::new(schema, name))
}

fn operation(scanner: &mut Scanner<'_>) -> CdcResult<Operation> {
    let keyword = scanner.identifier()?;

    let operation = match keyword.as_str() {
        "INSERT" => Operation::Row(ChangeType::Insert),
        "UPDATE" => Operation::Row(ChangeType::Update),
        "DELETE" => Operation::Row(ChangeType::Delete),
        "TRUNCATE" => Operation::Truncate,
        _ => return Err(scanner.error(format!("Unknown operation `{keyword}`"))),
    };

    Ok(operation)
}

fn column(scanner: &mut Scanner<'_>) -> CdcResult<RawColumn> {
    let name = scanner.identifier()?;
    let type_hint = scanner.type_hint()?;
    scanner.expect(':')?;
    let value = scanner.value()?;

    Ok(RawColumn {
        name,
        type_hint,
        value,
    })
}

/// Reads columns separated by single spaces.
///
/// With `stop_at_new_tuple` the list also ends right before a ` new-tuple: ` marker.
fn space_separated_columns(
    scanner: &mut Scanner<'_>,
    stop_at_new_tuple: bool,
) -> CdcResult<Vec<RawColumn>> {
    let mut columns = vec![column(scanner)?];

    while !scanner.is_at_end() {
        if stop_at_new_tuple
            && scanner
                .rest()
                .strip_prefix(' ')
                .is_some_and(|rest| rest.starts_with(NEW_TUPLE_MARKER))
        {
            break;
        }
        scanner.expect(' ')?;
        columns.push(column(scanner)?);
    }

    Ok(columns)
}

fn convert_columns(
    raw_columns: Vec<RawColumn>,
    metadata: Option<&TableMetadata>,
    unchanged_columns: &mut Vec<String>,
) -> CdcResult<Vec<ColumnValue>> {
    let mut seen = HashSet::with_capacity(raw_columns.len());
    let mut columns = Vec::with_capacity(raw_columns.len());

    for raw in raw_columns {
        if !seen.insert(raw.name.clone()) {
            bail!(
                ErrorKind::ParseError,
                "Duplicate column name",
                format!("Column `{}` appears more than once", raw.name)
            );
        }

        let kind = lookup_type_hint(&raw.type_hint)?;
        let nullable = metadata.is_none_or(|metadata| metadata.is_nullable(&raw.name));

        let value = match raw.value {
            RawValue::Bare(ref text) if text == UNCHANGED_TOAST_DATUM => {
                unchanged_columns.push(raw.name);
                continue;
            }
            RawValue::Null => Cell::Null,
            RawValue::Quoted(text) | RawValue::Bare(text) => parse_cell_from_text(kind, &text)
                .map_err(|err| {
                    cdc_error!(
                        ErrorKind::ParseError,
                        "Column value does not match its type hint",
                        format!("Column `{}` has the invalid {kind} value `{text}`", raw.name),
                        source: err
                    )
                })?,
        };

        if value.is_null() && !nullable {
            bail!(
                ErrorKind::ParseError,
                "Null value in non-nullable column",
                format!("Column `{}` does not admit null values", raw.name)
            );
        }

        let logical_type = if nullable {
            LogicalType::optional(kind)
        } else {
            LogicalType::required(kind)
        };
        columns.push(ColumnValue::new(raw.name, logical_type, value));
    }

    Ok(columns)
}

/// Copies the metadata key columns out of the value columns, in metadata key order.
fn derive_key_columns(
    columns: &[ColumnValue],
    metadata: Option<&TableMetadata>,
) -> Vec<ColumnValue> {
    let Some(metadata) = metadata else {
        return Vec::new();
    };

    metadata
        .key_columns()
        .iter()
        .filter_map(|key| {
            columns
                .iter()
                .find(|column| column.column_name() == key)
                .cloned()
        })
        .collect()
}

/// Picks the identity of a deleted row from the columns the decoder printed for it.
///
/// Decoders print only the replica identity for deletes, unless the table uses a full replica
/// identity. In that case the metadata key narrows the columns back to the key.
fn deleted_row_key(
    columns: Vec<ColumnValue>,
    metadata: Option<&TableMetadata>,
) -> Vec<ColumnValue> {
    let key_columns = derive_key_columns(&columns, metadata);
    if key_columns.is_empty() {
        return columns;
    }

    key_columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::numeric::PgNumeric;
    use crate::decoding::metadata::{NoTableMetadata, StaticTableMetadata};
    use crate::types::LogicalTypeKind;

    fn compact() -> LogicalDecodingParser<NoTableMetadata> {
        LogicalDecodingParser::new(DecodingDialect::Compact, NoTableMetadata)
    }

    fn test_decoding() -> LogicalDecodingParser<NoTableMetadata> {
        LogicalDecodingParser::new(DecodingDialect::TestDecoding, NoTableMetadata)
    }

    fn accounts_metadata() -> StaticTableMetadata {
        StaticTableMetadata::new().with_table(
            TableRef::new("public", "accounts"),
            TableMetadata::with_key_columns(["id"]).non_nullable(["balance"]),
        )
    }

    fn row(record: DecodedRecord) -> ChangeDraft {
        match record {
            DecodedRecord::Row(draft) => draft,
            other => panic!("expected a row, got {other:?}"),
        }
    }

    #[test]
    fn compact_insert() {
        let draft = row(compact()
            .parse("public.accounts INSERT id[int4]:5, balance[numeric]:100.00")
            .unwrap());

        assert_eq!(draft.schema_name, "public");
        assert_eq!(draft.table_name, "accounts");
        assert_eq!(draft.change_type, ChangeType::Insert);
        assert!(draft.key_columns.is_empty());
        assert_eq!(
            draft.value_columns,
            vec![
                ColumnValue::new(
                    "id",
                    LogicalType::optional(LogicalTypeKind::Int32),
                    Cell::I32(5)
                ),
                ColumnValue::new(
                    "balance",
                    LogicalType::optional(LogicalTypeKind::Decimal),
                    Cell::Numeric("100.00".parse::<PgNumeric>().unwrap())
                ),
            ]
        );
    }

    #[test]
    fn compact_insert_with_metadata_derives_keys() {
        let parser = LogicalDecodingParser::new(DecodingDialect::Compact, accounts_metadata());
        let draft = row(parser
            .parse("public.accounts INSERT id[int4]:5, balance[numeric]:100.00")
            .unwrap());

        assert_eq!(
            draft.key_columns,
            vec![ColumnValue::new(
                "id",
                LogicalType::required(LogicalTypeKind::Int32),
                Cell::I32(5)
            )]
        );
        assert!(!draft.value_columns[0].logical_type().nullable);
        assert!(!draft.value_columns[1].logical_type().nullable);
    }

    #[test]
    fn compact_delete_uses_listed_columns_as_key() {
        let draft = row(compact().parse("public.accounts DELETE id[int4]:5").unwrap());

        assert_eq!(draft.change_type, ChangeType::Delete);
        assert!(draft.value_columns.is_empty());
        assert_eq!(draft.key_columns.len(), 1);
        assert!(!draft.key_columns[0].logical_type().nullable);
    }

    #[test]
    fn compact_quoted_names_and_values() {
        let draft = row(compact()
            .parse(r#""My Schema"."odd.table" UPDATE "a ""b"""[text]:'it''s, fine', n[text]:null"#)
            .unwrap());

        assert_eq!(draft.schema_name, "My Schema");
        assert_eq!(draft.table_name, "odd.table");
        assert_eq!(draft.value_columns[0].column_name(), r#"a "b""#);
        assert_eq!(
            draft.value_columns[0].value(),
            &Cell::String("it's, fine".to_owned())
        );
        assert_eq!(draft.value_columns[1].value(), &Cell::Null);
    }

    #[test]
    fn control_markers_are_recognized() {
        assert_eq!(
            parse_control_marker("BEGIN 1234"),
            Some(ControlMarker::Begin { xid: Some(1234) })
        );
        assert_eq!(
            parse_control_marker("COMMIT 1234 (at 2024-01-01 00:00:00+00)"),
            Some(ControlMarker::Commit { xid: Some(1234) })
        );
        assert_eq!(
            parse_control_marker("COMMIT"),
            Some(ControlMarker::Commit { xid: None })
        );
        assert_eq!(parse_control_marker("BEGINNING.t INSERT a[int4]:1"), None);

        assert_eq!(
            compact().parse("BEGIN").unwrap(),
            DecodedRecord::Control(ControlMarker::Begin { xid: None })
        );
        assert_eq!(test_decoding().parse_change("COMMIT 77").unwrap(), None);
    }

    #[test]
    fn test_decoding_insert() {
        let line = "table public.data: INSERT: id[integer]:1 data[text]:'hello world' \
                    ok[boolean]:true";
        let draft = row(test_decoding().parse(line).unwrap());

        assert_eq!(draft.change_type, ChangeType::Insert);
        assert_eq!(draft.value_columns.len(), 3);
        assert_eq!(
            draft.value_columns[1].value(),
            &Cell::String("hello world".to_owned())
        );
        assert_eq!(draft.value_columns[2].value(), &Cell::Bool(true));
    }

    #[test]
    fn test_decoding_update_with_old_key() {
        let line = "table public.data: UPDATE: old-key: id[integer]:1 new-tuple: id[integer]:2 \
                    data[text]:'x'";
        let draft = row(test_decoding().parse(line).unwrap());

        assert_eq!(draft.change_type, ChangeType::Update);
        assert_eq!(
            draft.key_columns,
            vec![ColumnValue::new(
                "id",
                LogicalType::required(LogicalTypeKind::Int32),
                Cell::I32(1)
            )]
        );
        assert_eq!(draft.value_columns.len(), 2);
        assert_eq!(draft.value_columns[0].value(), &Cell::I32(2));
    }

    #[test]
    fn test_decoding_delete_without_tuple_data() {
        let draft = row(test_decoding()
            .parse("table public.data: DELETE: (no-tuple-data)")
            .unwrap());

        assert_eq!(draft.change_type, ChangeType::Delete);
        assert!(draft.key_columns.is_empty());
        assert!(draft.value_columns.is_empty());
    }

    #[test]
    fn test_decoding_delete_narrows_full_identity_to_metadata_key() {
        let parser = LogicalDecodingParser::new(DecodingDialect::TestDecoding, accounts_metadata());
        let draft = row(parser
            .parse("table public.accounts: DELETE: id[integer]:7 balance[numeric]:1.5")
            .unwrap());

        assert_eq!(draft.key_columns.len(), 1);
        assert_eq!(draft.key_columns[0].column_name(), "id");
        assert!(draft.value_columns.is_empty());
    }

    #[test]
    fn unchanged_toast_columns_are_left_out() {
        let draft = row(test_decoding()
            .parse("table public.docs: UPDATE: id[integer]:1 body[text]:unchanged-toast-datum")
            .unwrap());

        assert_eq!(draft.value_columns.len(), 1);
        assert_eq!(draft.unchanged_columns, vec!["body".to_owned()]);
    }

    #[test]
    fn truncate_names_every_table() {
        let record = test_decoding()
            .parse("table public.a, public.b: TRUNCATE: cascade")
            .unwrap();

        assert_eq!(
            record,
            DecodedRecord::Truncate(vec![
                TableRef::new("public", "a"),
                TableRef::new("public", "b")
            ])
        );
    }

    #[test]
    fn insert_without_columns_is_rejected() {
        for (parser, record) in [
            (compact(), "public.accounts INSERT"),
            (test_decoding(), "table public.accounts: INSERT: (no-tuple-data)"),
            (test_decoding(), "table public.accounts: UPDATE:"),
        ] {
            let err = parser.parse(record).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ParseError, "record `{record}`");
        }
    }

    #[test]
    fn malformed_records_are_rejected() {
        for record in [
            "",
            "accounts INSERT id[int4]:1",
            "public.accounts UPSERT id[int4]:1",
            "public.accounts INSERT id[int4]:1 balance[numeric]:2",
            "public.accounts INSERT id[int4]:'unterminated",
            "public.accounts INSERT id[geometry]:1",
            "public.accounts INSERT id[int4]:abc",
            "public.accounts INSERT id[int4]:1, id[int4]:2",
            "public.accounts INSERT id[int4]:1,",
        ] {
            let err = compact().parse(record).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ParseError, "record `{record}`");
        }
    }

    #[test]
    fn null_in_non_nullable_column_is_rejected() {
        let parser = LogicalDecodingParser::new(DecodingDialect::Compact, accounts_metadata());
        let err = parser
            .parse("public.accounts INSERT id[int4]:1, balance[numeric]:null")
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ParseError);
        assert_eq!(err.description(), Some("Null value in non-nullable column"));
    }

    #[test]
    fn parsing_is_repeatable() {
        let parser = test_decoding();
        let record = "table public.data: UPDATE: id[integer]:1 data[text]:'a'";

        assert_eq!(parser.parse(record).unwrap(), parser.parse(record).unwrap());
    }
}
