use std::collections::BTreeMap;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::cdc_error;
use crate::error::{CdcResult, ErrorKind};
use crate::workers::base::{CaptureStats, WorkerId};
use crate::workers::capture::CaptureExit;

type WorkerOutput = (WorkerId, CdcResult<(CaptureExit, CaptureStats)>);

/// Set of capture workers running as independent tokio tasks.
#[derive(Debug, Default)]
pub struct CaptureWorkerPool {
    join_set: JoinSet<WorkerOutput>,
}

impl CaptureWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the future of one worker, typically [`crate::workers::capture::CaptureWorker::run`].
    pub fn spawn<F>(&mut self, worker_id: WorkerId, future: F)
    where
        F: Future<Output = CdcResult<(CaptureExit, CaptureStats)>> + Send + 'static,
    {
        self.join_set.spawn(async move { (worker_id, future.await) });
        debug!(worker_id, "spawned capture worker in pool");
    }

    pub fn len(&self) -> usize {
        self.join_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.join_set.is_empty()
    }

    /// Waits for every worker and returns their stats keyed by worker id.
    ///
    /// A failing worker does not stop the others. All failures, including panics, are returned
    /// together once every worker finished.
    pub async fn wait_all(mut self) -> CdcResult<BTreeMap<WorkerId, CaptureStats>> {
        let mut stats = BTreeMap::new();
        let mut errors = Vec::new();

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok((worker_id, Ok((exit, worker_stats)))) => {
                    debug!(worker_id, ?exit, "capture worker completed");
                    stats.insert(worker_id, worker_stats);
                }
                Ok((worker_id, Err(err))) => {
                    error!(worker_id, error = %err, "capture worker completed with error");
                    errors.push(err);
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        debug!("capture worker task was cancelled");
                    } else {
                        errors.push(cdc_error!(
                            ErrorKind::CaptureWorkerPanic,
                            "Capture worker panicked",
                            join_err
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(stats)
        } else {
            Err(errors.into())
        }
    }
}
