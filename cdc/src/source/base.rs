use std::future::Future;

use crate::error::CdcResult;

/// Sequential reader of raw records of type `R`, positioned at the next unread record.
///
/// Implementations must tolerate the returned future being dropped before completion: a record
/// is only consumed once the future resolves with it.
pub trait RecordSource<R> {
    /// Returns the next record, or [`None`] once the source is exhausted for good.
    fn next_record(&mut self) -> impl Future<Output = CdcResult<Option<R>>> + Send;
}
