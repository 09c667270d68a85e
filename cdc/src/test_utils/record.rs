use tokio_postgres::types::PgLsn;

use crate::types::LogicalDecodingRecord;

/// Builds one record per `data` line with increasing locations starting at `first_location`.
///
/// Every record belongs to transaction `xid`.
pub fn records_from_lines<'a>(
    first_location: u64,
    xid: u32,
    lines: impl IntoIterator<Item = &'a str>,
) -> Vec<LogicalDecodingRecord> {
    lines
        .into_iter()
        .enumerate()
        .map(|(index, data)| {
            LogicalDecodingRecord::new(PgLsn::from(first_location + index as u64 * 8), xid, data)
        })
        .collect()
}

/// Wraps `lines` in `BEGIN`/`COMMIT` markers of transaction `xid`.
pub fn transaction_lines(xid: u32, lines: &[&str]) -> Vec<String> {
    let mut transaction = Vec::with_capacity(lines.len() + 2);
    transaction.push(format!("BEGIN {xid}"));
    transaction.extend(lines.iter().map(|line| (*line).to_owned()));
    transaction.push(format!("COMMIT {xid}"));
    transaction
}
