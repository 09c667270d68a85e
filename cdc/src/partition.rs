//! Assignment of tracked tables to parallel capture workers.

use std::collections::BTreeMap;
use std::fmt;

use cdc_config::shared::SourceConfig;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Settings key holding the comma-joined tables assigned to one worker.
pub const CHANGE_TRACKING_TABLES_KEY: &str = "change_tracking_tables";

/// Splits `tables` into at most `worker_count` contiguous chunks.
///
/// Chunks keep the input order and their sizes differ by at most one, the larger chunks coming
/// first. No chunk is empty, so `min(worker_count, tables.len())` chunks are returned.
pub fn partition_tables<T>(tables: &[T], worker_count: usize) -> CdcResult<Vec<&[T]>> {
    if worker_count == 0 {
        bail!(
            ErrorKind::InvalidConfiguration,
            "Invalid worker count",
            "The worker count must be greater than zero"
        );
    }

    if tables.is_empty() {
        bail!(
            ErrorKind::InvalidConfiguration,
            "No tables to partition",
            "At least one table must be tracked"
        );
    }

    let chunk_count = worker_count.min(tables.len());
    let base_size = tables.len() / chunk_count;
    let larger_chunks = tables.len() % chunk_count;

    let mut chunks = Vec::with_capacity(chunk_count);
    let mut start = 0;
    for index in 0..chunk_count {
        let size = if index < larger_chunks {
            base_size + 1
        } else {
            base_size
        };
        chunks.push(&tables[start..start + size]);
        start += size;
    }

    Ok(chunks)
}

/// Produces one settings map per worker.
///
/// Every map is a copy of `base_settings` with [`CHANGE_TRACKING_TABLES_KEY`] set to the
/// worker's tables.
pub fn partition_settings<T>(
    base_settings: &BTreeMap<String, String>,
    tables: &[T],
    worker_count: usize,
) -> CdcResult<Vec<BTreeMap<String, String>>>
where
    T: fmt::Display,
{
    let chunks = partition_tables(tables, worker_count)?;

    let settings = chunks
        .into_iter()
        .map(|chunk| {
            let mut settings = base_settings.clone();
            settings.insert(CHANGE_TRACKING_TABLES_KEY.to_owned(), join_tables(chunk));
            settings
        })
        .collect();

    Ok(settings)
}

/// Produces one [`SourceConfig`] per worker from `config.tables` and `config.worker_count`.
///
/// Each worker reads its own replication slot. When more than one worker is needed the slot
/// names get the worker index as a suffix, e.g. `shop_slot_0`, `shop_slot_1`.
pub fn partition_source_config(config: &SourceConfig) -> CdcResult<Vec<SourceConfig>> {
    let chunks = partition_tables(&config.tables, usize::from(config.worker_count))?;
    let single_worker = chunks.len() == 1;

    let configs = chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let mut worker_config = config.clone();
            worker_config.tables = chunk.to_vec();
            worker_config.worker_count = 1;
            if !single_worker {
                worker_config.slot_name = format!("{}_{index}", config.slot_name);
            }
            worker_config
        })
        .collect();

    Ok(configs)
}

fn join_tables<T: fmt::Display>(tables: &[T]) -> String {
    tables
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
