//! Receivers of captured changes and of committed offsets.

mod base;
pub mod json_lines;
pub mod memory;

pub use base::{ChangeSink, OffsetCommitter};
