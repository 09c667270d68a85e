//! Common types used throughout change capture.
//!
//! Re-exports the change model: typed cells, column values, changes of every supported source,
//! the raw records they are built from, and table references.

mod cell;
mod change;
mod column;
mod record;
mod table;

pub use cell::*;
pub use change::*;
pub use column::*;
pub use record::*;
pub use table::*;

// Re-exports.
pub use tokio_postgres::types::PgLsn;
