use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::destination::ChangeSink;
use crate::error::CdcResult;
use crate::types::Change;

/// [`ChangeSink`] writing every change as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> ChangeSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_change(&self, change: Change) -> CdcResult<()> {
        let mut line = serde_json::to_vec(&change)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        // The line must reach the writer before the offset is committed.
        writer.flush().await?;

        Ok(())
    }
}
