use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::destination::{ChangeSink, OffsetCommitter};
use crate::error::CdcResult;
use crate::types::{Change, SourceOffset, SourcePosition};

#[derive(Debug, Default)]
struct Inner {
    changes: Vec<Change>,
    commits: Vec<(SourcePosition, SourceOffset)>,
}

/// In-memory sink and committer for tests and development.
///
/// Clones share the same storage, so one clone can be handed to a worker while another one is
/// used to inspect what was captured.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every change written so far, in write order.
    pub async fn changes(&self) -> Vec<Change> {
        let inner = self.inner.lock().await;
        inner.changes.clone()
    }

    /// Returns a copy of every commit so far, in commit order.
    pub async fn commits(&self) -> Vec<(SourcePosition, SourceOffset)> {
        let inner = self.inner.lock().await;
        inner.commits.clone()
    }

    /// Position of the most recent commit.
    pub async fn last_committed(&self) -> Option<SourcePosition> {
        let inner = self.inner.lock().await;
        inner.commits.last().map(|(position, _)| *position)
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.changes.clear();
        inner.commits.clear();
    }
}

impl ChangeSink for MemoryDestination {
    async fn write_change(&self, change: Change) -> CdcResult<()> {
        let mut inner = self.inner.lock().await;

        debug!(%change, "writing change to memory");
        inner.changes.push(change);

        Ok(())
    }
}

impl OffsetCommitter for MemoryDestination {
    async fn commit(&self, position: SourcePosition, offset: &SourceOffset) -> CdcResult<()> {
        let mut inner = self.inner.lock().await;

        debug!(%position, "committing offset to memory");
        inner.commits.push((position, offset.clone()));

        Ok(())
    }
}
