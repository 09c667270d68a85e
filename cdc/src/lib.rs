//! Row-level change capture for relational sources.
//!
//! Raw records read from a source, such as logical decoding lines of a Postgres replication slot
//! or change tracking rows, are turned into typed [`types::Change`] values by a
//! [`builder::ChangeBuilder`]. Capture workers pull records, hand the changes to a
//! [`destination::ChangeSink`] and commit their offsets afterwards, so every change is delivered
//! at least once.

pub mod builder;
pub mod concurrency;
pub mod conversions;
pub mod decoding;
pub mod destination;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
mod macros;
pub mod partition;
pub mod replication;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
