//! Sources of raw records read by capture workers.

mod base;
pub mod memory;

pub use base::RecordSource;
