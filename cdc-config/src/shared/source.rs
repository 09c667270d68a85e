use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{PgConnectionConfig, PgConnectionConfigWithoutSecrets, ValidationError};

/// Text format of the records read from the replication slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecodingDialect {
    /// Output of the `test_decoding` plugin: `table public.t: INSERT: id[integer]:1`.
    #[default]
    TestDecoding,
    /// Single-line form: `public.t INSERT id[int4]:1, name[text]:'a'`.
    Compact,
}

/// Configuration of one capture source and of the workers reading from it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceConfig {
    /// Name stamped on every captured change.
    pub database_name: String,
    /// Replication slot to read from. With several workers each one reads its own slot derived
    /// from this name.
    pub slot_name: String,
    #[serde(default)]
    pub dialect: DecodingDialect,
    /// Tracked tables as `schema.table`, in the order they are assigned to workers.
    pub tables: Vec<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: u16,
    /// Delay between two polls of a drained slot.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of records fetched per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    pub connection: PgConnectionConfig,
}

impl SourceConfig {
    pub const DEFAULT_WORKER_COUNT: u16 = 1;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
    pub const DEFAULT_BATCH_SIZE: u32 = 1000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.database_name.is_empty() {
            return Err(ValidationError::DatabaseNameEmpty);
        }

        if self.slot_name.is_empty() {
            return Err(ValidationError::SlotNameEmpty);
        }

        if self.worker_count == 0 {
            return Err(ValidationError::WorkerCountZero);
        }

        if self.batch_size == 0 {
            return Err(ValidationError::BatchSizeZero);
        }

        if self.tables.is_empty() {
            return Err(ValidationError::NoTables);
        }

        if let Some(table) = self.tables.iter().find(|table| !is_qualified_table(table)) {
            return Err(ValidationError::InvalidTableName(table.clone()));
        }

        Ok(())
    }
}

impl Config for SourceConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["tables"];
}

fn is_qualified_table(table: &str) -> bool {
    table
        .split_once('.')
        .is_some_and(|(schema, name)| !schema.is_empty() && !name.is_empty())
}

const fn default_worker_count() -> u16 {
    SourceConfig::DEFAULT_WORKER_COUNT
}

const fn default_poll_interval_ms() -> u64 {
    SourceConfig::DEFAULT_POLL_INTERVAL_MS
}

const fn default_batch_size() -> u32 {
    SourceConfig::DEFAULT_BATCH_SIZE
}

/// Same as [`SourceConfig`] but without secrets, safe to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfigWithoutSecrets {
    pub database_name: String,
    pub slot_name: String,
    pub dialect: DecodingDialect,
    pub tables: Vec<String>,
    pub worker_count: u16,
    pub poll_interval_ms: u64,
    pub batch_size: u32,
    pub connection: PgConnectionConfigWithoutSecrets,
}

impl From<SourceConfig> for SourceConfigWithoutSecrets {
    fn from(value: SourceConfig) -> Self {
        SourceConfigWithoutSecrets {
            database_name: value.database_name,
            slot_name: value.slot_name,
            dialect: value.dialect,
            tables: value.tables,
            worker_count: value.worker_count,
            poll_interval_ms: value.poll_interval_ms,
            batch_size: value.batch_size,
            connection: value.connection.into(),
        }
    }
}
