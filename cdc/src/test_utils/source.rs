use tokio::sync::mpsc;

use crate::error::CdcResult;
use crate::source::RecordSource;

/// [`RecordSource`] fed by a channel, exhausted once every sender is dropped.
///
/// Waiting on an empty channel never resolves, which lets tests keep a worker idle.
#[derive(Debug)]
pub struct ChannelRecordSource<R> {
    rx: mpsc::UnboundedReceiver<R>,
}

impl<R> ChannelRecordSource<R> {
    pub fn new() -> (mpsc::UnboundedSender<R>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

impl<R> RecordSource<R> for ChannelRecordSource<R>
where
    R: Send,
{
    async fn next_record(&mut self) -> CdcResult<Option<R>> {
        Ok(self.rx.recv().await)
    }
}
