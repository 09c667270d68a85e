use std::future::Future;
use std::sync::Arc;

use crate::error::CdcResult;
use crate::types::{Change, SourceOffset, SourcePosition};

/// Downstream receiver of captured changes.
///
/// A change counts as handed off once [`ChangeSink::write_change`] resolved successfully, only
/// then is its offset committed. A crash in between makes the change be delivered again, so
/// implementations must tolerate duplicates.
pub trait ChangeSink {
    fn write_change(&self, change: Change) -> impl Future<Output = CdcResult<()>> + Send;
}

/// Durable record of how far a worker got in its stream.
///
/// Within one source partition, workers call [`OffsetCommitter::commit`] with positions that
/// each follow the previous one, see [`SourcePosition::follows`].
pub trait OffsetCommitter {
    fn commit(
        &self,
        position: SourcePosition,
        offset: &SourceOffset,
    ) -> impl Future<Output = CdcResult<()>> + Send;
}

impl<S> ChangeSink for Arc<S>
where
    S: ChangeSink + Send + Sync,
{
    fn write_change(&self, change: Change) -> impl Future<Output = CdcResult<()>> + Send {
        (**self).write_change(change)
    }
}

impl<C> OffsetCommitter for Arc<C>
where
    C: OffsetCommitter + Send + Sync,
{
    fn commit(
        &self,
        position: SourcePosition,
        offset: &SourceOffset,
    ) -> impl Future<Output = CdcResult<()>> + Send {
        (**self).commit(position, offset)
    }
}
