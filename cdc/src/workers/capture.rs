use std::marker::PhantomData;
use tracing::{debug, info, warn};

use crate::bail;
use crate::builder::ChangeBuilder;
use crate::concurrency::shutdown::ShutdownRx;
use crate::destination::{ChangeSink, OffsetCommitter};
use crate::error::{CdcResult, ErrorKind};
#[cfg(feature = "failpoints")]
use crate::failpoints::{CAPTURE_AFTER_WRITE_BEFORE_COMMIT, cdc_fail_point};
use crate::source::RecordSource;
use crate::types::{ChangeEvent, SourcePartition, SourcePosition};
use crate::workers::base::{CaptureStats, WorkerId};

/// Why [`CaptureWorker::run`] returned successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureExit {
    /// The source returned [`None`].
    SourceExhausted,
    /// A shutdown was signalled.
    Shutdown,
}

/// Pull loop of one capture worker.
///
/// Each iteration reads one record, builds it, hands the change to the sink and commits its
/// offset. Offsets are only committed after the sink accepted the change, and within one source
/// partition every position must follow the previously committed one (see
/// [`SourcePosition::follows`]). A shutdown is only observed between records, so a record that
/// was read is always processed to the end.
#[derive(Debug)]
pub struct CaptureWorker<R, S, B, K, C> {
    worker_id: WorkerId,
    source: S,
    builder: B,
    sink: K,
    committer: C,
    shutdown_rx: ShutdownRx,
    resumed_after: Option<SourcePosition>,
    committed: Vec<(SourcePartition, SourcePosition)>,
    last_committed: Option<SourcePosition>,
    phantom: PhantomData<fn() -> R>,
}

impl<R, S, B, K, C> CaptureWorker<R, S, B, K, C>
where
    R: Send + Sync,
    S: RecordSource<R> + Send,
    B: ChangeBuilder<R> + Send + Sync,
    K: ChangeSink + Send + Sync,
    C: OffsetCommitter + Send + Sync,
{
    pub fn new(
        worker_id: WorkerId,
        source: S,
        builder: B,
        sink: K,
        committer: C,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            worker_id,
            source,
            builder,
            sink,
            committer,
            shutdown_rx,
            resumed_after: None,
            committed: Vec::new(),
            last_committed: None,
            phantom: PhantomData,
        }
    }

    /// Resumes after `position`: the first commit of every partition must follow it.
    pub fn with_last_committed(mut self, position: SourcePosition) -> Self {
        self.resumed_after = Some(position);
        self.last_committed = Some(position);
        self
    }

    fn last_committed_in(&self, partition: &SourcePartition) -> Option<SourcePosition> {
        self.committed
            .iter()
            .find(|(committed_partition, _)| committed_partition == partition)
            .map(|(_, position)| *position)
            .or(self.resumed_after)
    }

    fn record_commit(&mut self, partition: SourcePartition, position: SourcePosition) {
        match self
            .committed
            .iter_mut()
            .find(|(committed_partition, _)| *committed_partition == partition)
        {
            Some((_, last)) => *last = position,
            None => self.committed.push((partition, position)),
        }
        self.last_committed = Some(position);
    }

    /// Runs the loop until the source is exhausted, a shutdown is signalled or an error occurs.
    ///
    /// Every error is fatal for the worker. Nothing is retried here.
    pub async fn run(mut self) -> CdcResult<(CaptureExit, CaptureStats)> {
        let worker_id = self.worker_id;
        let mut stats = CaptureStats::default();

        info!(worker_id, "starting capture worker");

        let exit = loop {
            let record = tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    info!(worker_id, "shutting down capture worker");
                    break CaptureExit::Shutdown;
                }
                record = self.source.next_record() => record?,
            };

            let Some(record) = record else {
                info!(worker_id, "source exhausted, stopping capture worker");
                break CaptureExit::SourceExhausted;
            };
            stats.records_read += 1;

            self.process(&record, &mut stats).await?;
        };

        stats.last_committed = self.last_committed;
        info!(
            worker_id,
            records_read = stats.records_read,
            changes_written = stats.changes_written,
            records_skipped = stats.records_skipped,
            "capture worker stopped"
        );

        Ok((exit, stats))
    }

    async fn process(&mut self, record: &R, stats: &mut CaptureStats) -> CdcResult<()> {
        let Some(change) = self.builder.build(record)? else {
            stats.records_skipped += 1;
            return Ok(());
        };

        let position = change.position();
        if let Some(last_committed) = self.last_committed_in(change.source_partition())
            && !position.follows(&last_committed)
        {
            warn!(
                worker_id = self.worker_id,
                %position,
                %last_committed,
                "change position does not advance past the last commit"
            );
            bail!(
                ErrorKind::OffsetOrderViolation,
                "Offsets must be committed in increasing order",
                format!(
                    "Position {position} of {change} does not follow the last committed position \
                     {last_committed}"
                )
            );
        }

        let partition = change.source_partition().clone();
        let offset = change.source_offset().clone();
        debug!(worker_id = self.worker_id, %change, "writing change");
        self.sink.write_change(change).await?;
        stats.changes_written += 1;

        #[cfg(feature = "failpoints")]
        cdc_fail_point(CAPTURE_AFTER_WRITE_BEFORE_COMMIT)?;

        self.committer.commit(position, &offset).await?;
        self.record_commit(partition, position);

        Ok(())
    }
}
