use std::collections::VecDeque;
use std::time::Duration;

use cdc_config::shared::SourceConfig;
use tokio_postgres::types::PgLsn;
use tracing::{debug, trace};

use crate::bail;
use crate::destination::OffsetCommitter;
use crate::error::{CdcResult, ErrorKind};
use crate::replication::client::{LogicalSlotClient, SlotClient};
use crate::replication::slots::validate_slot_name;
use crate::source::RecordSource;
use crate::types::{LogicalDecodingRecord, SourceOffset, SourcePosition};

/// Reads logical decoding records of one replication slot by polling it.
///
/// Records are handed out in LSN order and each one at most once per source. Before every poll the
/// slot is advanced past the records handed out so far: the capture loop only asks for a record
/// once the previous one was fully processed, so those records no longer need to be redelivered.
#[derive(Debug)]
pub struct LogicalSlotSource<C = LogicalSlotClient> {
    client: C,
    slot_name: String,
    batch_size: u32,
    poll_interval: Duration,
    buffer: VecDeque<LogicalDecodingRecord>,
    last_read: Option<PgLsn>,
    advanced_to: Option<PgLsn>,
}

impl<C> LogicalSlotSource<C>
where
    C: SlotClient,
{
    pub fn new(
        client: C,
        slot_name: impl Into<String>,
        batch_size: u32,
        poll_interval: Duration,
    ) -> CdcResult<Self> {
        let slot_name = slot_name.into();
        validate_slot_name(&slot_name)?;

        Ok(Self {
            client,
            slot_name,
            batch_size,
            poll_interval,
            buffer: VecDeque::new(),
            last_read: None,
            advanced_to: None,
        })
    }

    /// Creates a source for the slot, batch size and poll interval of `config`.
    pub fn from_config(client: C, config: &SourceConfig) -> CdcResult<Self> {
        Self::new(
            client,
            config.slot_name.clone(),
            config.batch_size,
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    /// Skips every record at or before `location`.
    pub fn with_start_after(mut self, location: PgLsn) -> Self {
        self.last_read = Some(location);
        self.advanced_to = Some(location);
        self
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    async fn release_handed_out(&mut self) -> CdcResult<()> {
        let Some(last_read) = self.last_read else {
            return Ok(());
        };

        if self.advanced_to.is_some_and(|advanced_to| advanced_to >= last_read) {
            return Ok(());
        }

        self.client.advance_slot(&self.slot_name, last_read).await?;
        self.advanced_to = Some(last_read);

        Ok(())
    }

    async fn poll(&mut self) -> CdcResult<()> {
        self.release_handed_out().await?;

        let records = self
            .client
            .peek_changes(&self.slot_name, self.batch_size)
            .await?;

        let last_read = self.last_read;
        let fresh = records
            .into_iter()
            .filter(|record| last_read.is_none_or(|last_read| record.location > last_read));
        self.buffer.extend(fresh);

        trace!(
            slot_name = %self.slot_name,
            buffered = self.buffer.len(),
            "polled replication slot"
        );

        Ok(())
    }
}

impl<C> RecordSource<LogicalDecodingRecord> for LogicalSlotSource<C>
where
    C: SlotClient + Send + Sync,
{
    async fn next_record(&mut self) -> CdcResult<Option<LogicalDecodingRecord>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.last_read = Some(record.location);
                return Ok(Some(record));
            }

            self.poll().await?;

            if self.buffer.is_empty() {
                debug!(
                    slot_name = %self.slot_name,
                    "replication slot drained, waiting for changes"
                );
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }
}

/// Commits offsets by advancing a replication slot.
#[derive(Debug, Clone)]
pub struct SlotAdvancer<C = LogicalSlotClient> {
    client: C,
    slot_name: String,
}

impl<C> SlotAdvancer<C> {
    pub fn new(client: C, slot_name: impl Into<String>) -> CdcResult<Self> {
        let slot_name = slot_name.into();
        validate_slot_name(&slot_name)?;

        Ok(Self { client, slot_name })
    }
}

impl<C> OffsetCommitter for SlotAdvancer<C>
where
    C: SlotClient + Send + Sync,
{
    async fn commit(
        &self,
        position: SourcePosition,
        _source_offset: &SourceOffset,
    ) -> CdcResult<()> {
        let SourcePosition::Lsn(location) = position else {
            bail!(
                ErrorKind::InvalidConfiguration,
                "Unsupported source position",
                format!("A replication slot can only be advanced to an LSN, got {position}")
            );
        };

        let confirmed = self.client.advance_slot(&self.slot_name, location).await?;
        debug!(slot_name = %self.slot_name, %location, %confirmed, "advanced replication slot");

        Ok(())
    }
}
