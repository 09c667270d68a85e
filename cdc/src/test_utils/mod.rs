//! Helpers for tests of capture pipelines built from this crate.
//!
//! Only compiled for tests or with the `test-utils` feature.

pub mod clock;
pub mod diagnostics;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod record;
pub mod source;
