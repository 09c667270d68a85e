use std::collections::VecDeque;

use crate::error::CdcResult;
use crate::source::RecordSource;

/// [`RecordSource`] replaying a fixed list of records, used in tests and replays.
#[derive(Debug, Clone)]
pub struct MemoryRecordSource<R> {
    records: VecDeque<R>,
}

impl<R> MemoryRecordSource<R> {
    pub fn new(records: impl IntoIterator<Item = R>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    /// Number of records not read yet.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl<R> RecordSource<R> for MemoryRecordSource<R>
where
    R: Send,
{
    async fn next_record(&mut self) -> CdcResult<Option<R>> {
        Ok(self.records.pop_front())
    }
}
