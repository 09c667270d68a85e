//! Conversion of raw source records into finalised [`Change`]s.
//!
//! Builders hold no mutable state. The capture clock and the sink for diagnostics are explicit
//! parameters so that builders can be exercised deterministically.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::CdcResult;
use crate::types::{Change, SourcePosition};

pub mod mssql;
pub mod postgres;

pub use mssql::MsSqlChangeBuilder;
pub use postgres::PostgresChangeBuilder;

/// Turns one raw record of type `R` into a [`Change`].
///
/// Returns [`None`] when the record carries no row data, e.g. a transaction marker.
pub trait ChangeBuilder<R> {
    fn build(&self, record: &R) -> CdcResult<Option<Change>>;

    /// Stream position of `record`, known before the record is built.
    fn position(&self, record: &R) -> SourcePosition;
}

/// Source of capture timestamps.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the unix epoch.
    fn now_millis(&self) -> i64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

/// Severity of a [`DiagnosticSink`] report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticLevel {
    Debug,
    Warn,
    Error,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Receiver of the observations a builder makes about the records it processes.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, level: DiagnosticLevel, position: SourcePosition, message: &str);
}

/// [`DiagnosticSink`] that forwards every report to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, level: DiagnosticLevel, position: SourcePosition, message: &str) {
        match level {
            DiagnosticLevel::Debug => debug!(%position, "{message}"),
            DiagnosticLevel::Warn => warn!(%position, "{message}"),
            DiagnosticLevel::Error => error!(%position, "{message}"),
        }
    }
}

impl<D> DiagnosticSink for Arc<D>
where
    D: DiagnosticSink + ?Sized,
{
    fn report(&self, level: DiagnosticLevel, position: SourcePosition, message: &str) {
        (**self).report(level, position, message)
    }
}
