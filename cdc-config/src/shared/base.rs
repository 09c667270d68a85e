use thiserror::Error;

/// Errors raised by configuration validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`worker_count` cannot be zero")]
    WorkerCountZero,
    #[error("`batch_size` cannot be zero")]
    BatchSizeZero,
    #[error("`tables` must list at least one table")]
    NoTables,
    #[error("table `{0}` must be written as `schema.table`")]
    InvalidTableName(String),
    #[error("`slot_name` cannot be empty")]
    SlotNameEmpty,
    #[error("`database_name` cannot be empty")]
    DatabaseNameEmpty,
}
